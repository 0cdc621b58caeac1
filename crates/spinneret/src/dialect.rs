//! SQL dialect abstraction for spinneret
//!
//! Each store family is an injected [`SqlDialect`] strategy value selected
//! at pipeline construction, never a subclass: identifier quoting, native
//! DDL column types, schema/table creation, the named-parameter insert and
//! update statements, and connection opening.
//!
//! All generated DML follows one parameter convention: the field name
//! prefixed with the dialect's marker (`@title`), so text and bound set
//! line up by name.

use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::StoreConnection;
use crate::error::{Error, Result};
use crate::metadata::Field;
use crate::plan::WritePlan;

/// SQL dialect for vendor-specific SQL generation and connections
#[async_trait]
pub trait SqlDialect: Send + Sync + std::fmt::Debug {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// The parameter marker prefixed to field names (`@` unless a store
    /// needs otherwise)
    fn parameter_marker(&self) -> &'static str {
        "@"
    }

    /// Marker-prefixed parameter name for a field
    fn parameter_name(&self, field: &str) -> String {
        format!("{}{}", self.parameter_marker(), field)
    }

    /// Quote an identifier (table, column name)
    fn quote_identifier(&self, name: &str) -> String;

    /// Table reference qualified with the database, when the plan has one
    fn qualified_table(&self, plan: &WritePlan) -> String {
        match &plan.database {
            Some(db) => format!(
                "{}.{}",
                self.quote_identifier(db),
                self.quote_identifier(&plan.table)
            ),
            None => self.quote_identifier(&plan.table),
        }
    }

    /// Native DDL column type for a declared field.
    ///
    /// `STRING,<n>` lengths must be numeric here; the looser bind-time
    /// mapping only inspects the prefix.
    fn native_type(&self, column: &Field) -> Result<String>;

    /// DDL creating the database/schema the table lives in, or `None` when
    /// the plan names no database
    fn create_schema_sql(&self, plan: &WritePlan) -> Option<String>;

    /// DDL creating the table with columns, primary key, index and unique
    /// groups and the auto-increment column
    fn create_table_sql(&self, plan: &WritePlan) -> Result<String>;

    /// Parameterized insert over all plan columns
    fn insert_sql(&self, plan: &WritePlan) -> String {
        let columns: Vec<String> = plan
            .columns
            .iter()
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        let params: Vec<String> = plan
            .columns
            .iter()
            .map(|c| self.parameter_name(&c.name))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_table(plan),
            columns.join(", "),
            params.join(", ")
        )
    }

    /// Parameterized update: update-set columns in SET, primary key in WHERE
    fn update_sql(&self, plan: &WritePlan) -> String {
        let assignments: Vec<String> = plan
            .update_columns
            .iter()
            .map(|c| {
                format!(
                    "{} = {}",
                    self.quote_identifier(&c.name),
                    self.parameter_name(&c.name)
                )
            })
            .collect();
        let conditions: Vec<String> = plan
            .primary
            .iter()
            .map(|c| {
                format!(
                    "{} = {}",
                    self.quote_identifier(&c.name),
                    self.parameter_name(&c.name)
                )
            })
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.qualified_table(plan),
            assignments.join(", "),
            conditions.join(" AND ")
        )
    }

    /// Open a connection for one batch attempt
    async fn open_connection(&self, connect_string: &str) -> Result<Box<dyn StoreConnection>>;
}

/// Escape a string for embedding in a single-quoted SQL literal
fn escape_string_literal(value: &str) -> String {
    value.replace('\'', "''")
}

// ===========================================================================
// MySQL
// ===========================================================================

/// MySQL dialect
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

#[async_trait]
impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn native_type(&self, column: &Field) -> Result<String> {
        if let Some(len) = column.logical_type.strip_prefix("STRING,") {
            let len: u32 = len.parse().map_err(|_| {
                Error::config(format!(
                    "invalid STRING length '{}' for column '{}'",
                    len, column.name
                ))
            })?;
            return Ok(format!("VARCHAR({len})"));
        }
        match column.logical_type.as_str() {
            "TEXT" => Ok("TEXT".to_string()),
            "BOOL" => Ok("TINYINT(1)".to_string()),
            "DATE" => Ok("DATE".to_string()),
            "TIME" => Ok("TIME".to_string()),
            other => Err(Error::unsupported_type(other)),
        }
    }

    fn create_schema_sql(&self, plan: &WritePlan) -> Option<String> {
        plan.database.as_ref().map(|db| {
            format!(
                "CREATE SCHEMA IF NOT EXISTS {} DEFAULT CHARACTER SET utf8mb4",
                self.quote_identifier(db)
            )
        })
    }

    fn create_table_sql(&self, plan: &WritePlan) -> Result<String> {
        let mut parts: Vec<String> = Vec::with_capacity(plan.columns.len() + 3);
        for column in &plan.columns {
            let is_auto = plan.auto_increment.as_deref() == Some(column.name.as_str());
            let is_primary = plan.primary.iter().any(|p| p.name == column.name);
            // auto-assigned keys are stored as BIGINT whatever the field declares
            let native = if is_auto {
                "BIGINT AUTO_INCREMENT".to_string()
            } else {
                self.native_type(column)?
            };
            let not_null = if is_primary { " NOT NULL" } else { "" };
            parts.push(format!(
                "{} {}{}",
                self.quote_identifier(&column.name),
                native,
                not_null
            ));
        }
        if !plan.primary.is_empty() {
            let keys: Vec<String> = plan
                .primary
                .iter()
                .map(|c| self.quote_identifier(&c.name))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        for group in &plan.indexes {
            let cols: Vec<String> = group.iter().map(|c| self.quote_identifier(c)).collect();
            parts.push(format!(
                "KEY {} ({})",
                self.quote_identifier(&format!("index_{}", group.join("_"))),
                cols.join(", ")
            ));
        }
        for group in &plan.uniques {
            let cols: Vec<String> = group.iter().map(|c| self.quote_identifier(c)).collect();
            parts.push(format!(
                "UNIQUE KEY {} ({})",
                self.quote_identifier(&format!("unique_{}", group.join("_"))),
                cols.join(", ")
            ));
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.qualified_table(plan),
            parts.join(", ")
        ))
    }

    async fn open_connection(&self, connect_string: &str) -> Result<Box<dyn StoreConnection>> {
        #[cfg(feature = "mysql")]
        {
            let conn = crate::mysql::MySqlConnection::connect(connect_string).await?;
            Ok(Box::new(conn))
        }
        #[cfg(not(feature = "mysql"))]
        {
            let _ = connect_string;
            Err(Error::connection(
                "MySQL driver not compiled in; enable the `mysql` feature",
            ))
        }
    }
}

// ===========================================================================
// SQL Server
// ===========================================================================

/// SQL Server dialect
#[derive(Debug, Clone, Default)]
pub struct SqlServerDialect;

#[async_trait]
impl SqlDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn native_type(&self, column: &Field) -> Result<String> {
        if let Some(len) = column.logical_type.strip_prefix("STRING,") {
            let len: u32 = len.parse().map_err(|_| {
                Error::config(format!(
                    "invalid STRING length '{}' for column '{}'",
                    len, column.name
                ))
            })?;
            return Ok(if len <= 4000 {
                format!("NVARCHAR({len})")
            } else {
                "NVARCHAR(MAX)".to_string()
            });
        }
        match column.logical_type.as_str() {
            "TEXT" => Ok("NVARCHAR(MAX)".to_string()),
            "BOOL" => Ok("BIT".to_string()),
            "DATE" => Ok("DATE".to_string()),
            "TIME" => Ok("TIME".to_string()),
            other => Err(Error::unsupported_type(other)),
        }
    }

    fn create_schema_sql(&self, plan: &WritePlan) -> Option<String> {
        plan.database.as_ref().map(|db| {
            format!(
                "IF DB_ID(N'{}') IS NULL CREATE DATABASE {}",
                escape_string_literal(db),
                self.quote_identifier(db)
            )
        })
    }

    fn create_table_sql(&self, plan: &WritePlan) -> Result<String> {
        let table = self.qualified_table(plan);
        let mut parts: Vec<String> = Vec::with_capacity(plan.columns.len() + 2);
        for column in &plan.columns {
            let is_auto = plan.auto_increment.as_deref() == Some(column.name.as_str());
            let is_primary = plan.primary.iter().any(|p| p.name == column.name);
            let native = if is_auto {
                "BIGINT IDENTITY(1,1)".to_string()
            } else {
                self.native_type(column)?
            };
            let not_null = if is_primary { " NOT NULL" } else { "" };
            parts.push(format!(
                "{} {}{}",
                self.quote_identifier(&column.name),
                native,
                not_null
            ));
        }
        if !plan.primary.is_empty() {
            let keys: Vec<String> = plan
                .primary
                .iter()
                .map(|c| self.quote_identifier(&c.name))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        for group in &plan.uniques {
            let cols: Vec<String> = group.iter().map(|c| self.quote_identifier(c)).collect();
            parts.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(&format!("unique_{}", group.join("_"))),
                cols.join(", ")
            ));
        }

        // secondary indexes go in the same guarded batch, after the table
        let mut statements = vec![format!("CREATE TABLE {} ({})", table, parts.join(", "))];
        for group in &plan.indexes {
            let cols: Vec<String> = group.iter().map(|c| self.quote_identifier(c)).collect();
            statements.push(format!(
                "CREATE INDEX {} ON {} ({})",
                self.quote_identifier(&format!("index_{}", group.join("_"))),
                table,
                cols.join(", ")
            ));
        }

        Ok(format!(
            "IF OBJECT_ID(N'{}', N'U') IS NULL BEGIN {} END",
            escape_string_literal(&table),
            statements.join("; ")
        ))
    }

    /// IDENTITY columns cannot take bound values, so the insert skips the
    /// auto-increment column. The writer still binds it; binding is by name
    /// and unreferenced parameters are ignored.
    fn insert_sql(&self, plan: &WritePlan) -> String {
        let insertable: Vec<&Field> = plan
            .columns
            .iter()
            .filter(|c| plan.auto_increment.as_deref() != Some(c.name.as_str()))
            .collect();
        let columns: Vec<String> = insertable
            .iter()
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        let params: Vec<String> = insertable
            .iter()
            .map(|c| self.parameter_name(&c.name))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_table(plan),
            columns.join(", "),
            params.join(", ")
        )
    }

    async fn open_connection(&self, connect_string: &str) -> Result<Box<dyn StoreConnection>> {
        let _ = connect_string;
        Err(Error::connection(
            "no SQL Server driver is compiled into this build",
        ))
    }
}

/// Get a dialect instance by store type name
pub fn dialect_for(name: &str) -> Result<Arc<dyn SqlDialect>> {
    match name.to_lowercase().as_str() {
        "mysql" | "mariadb" => Ok(Arc::new(MySqlDialect)),
        "sqlserver" | "mssql" => Ok(Arc::new(SqlServerDialect)),
        other => Err(Error::config(format!("unknown dialect '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, EntitySchema, WriteMode};

    fn plan() -> WritePlan {
        let metadata = EntityMetadata::new("repo", EntitySchema::new("repos").with_database("spider"))
            .with_field("id", "STRING,32")
            .with_field("title", "TEXT")
            .with_field("starred", "BOOL")
            .with_primary(["id"]);
        WritePlan::resolve(&metadata, WriteMode::Update).unwrap()
    }

    #[test]
    fn test_mysql_quoting_and_marker() {
        let dialect = MySqlDialect;
        assert_eq!(dialect.quote_identifier("repos"), "`repos`");
        assert_eq!(dialect.quote_identifier("a`b"), "`a``b`");
        assert_eq!(dialect.parameter_name("title"), "@title");
    }

    #[test]
    fn test_sqlserver_quoting() {
        let dialect = SqlServerDialect;
        assert_eq!(dialect.quote_identifier("repos"), "[repos]");
        assert_eq!(dialect.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_mysql_native_types() {
        let dialect = MySqlDialect;
        assert_eq!(
            dialect.native_type(&Field::new("id", "STRING,32")).unwrap(),
            "VARCHAR(32)"
        );
        assert_eq!(dialect.native_type(&Field::new("t", "TEXT")).unwrap(), "TEXT");
        assert_eq!(
            dialect.native_type(&Field::new("b", "BOOL")).unwrap(),
            "TINYINT(1)"
        );
        assert!(dialect.native_type(&Field::new("f", "FLOAT")).is_err());
        assert!(dialect.native_type(&Field::new("s", "STRING,x")).is_err());
    }

    #[test]
    fn test_sqlserver_native_types() {
        let dialect = SqlServerDialect;
        assert_eq!(
            dialect.native_type(&Field::new("id", "STRING,32")).unwrap(),
            "NVARCHAR(32)"
        );
        assert_eq!(
            dialect.native_type(&Field::new("id", "STRING,8000")).unwrap(),
            "NVARCHAR(MAX)"
        );
        assert_eq!(
            dialect.native_type(&Field::new("t", "TEXT")).unwrap(),
            "NVARCHAR(MAX)"
        );
        assert_eq!(dialect.native_type(&Field::new("b", "BOOL")).unwrap(), "BIT");
    }

    #[test]
    fn test_mysql_insert_sql() {
        let sql = MySqlDialect.insert_sql(&plan());
        assert_eq!(
            sql,
            "INSERT INTO `spider`.`repos` (`id`, `title`, `starred`) \
             VALUES (@id, @title, @starred)"
        );
    }

    #[test]
    fn test_mysql_update_sql() {
        let sql = MySqlDialect.update_sql(&plan());
        assert_eq!(
            sql,
            "UPDATE `spider`.`repos` SET `title` = @title, `starred` = @starred WHERE `id` = @id"
        );
    }

    #[test]
    fn test_mysql_create_table_sql() {
        let sql = MySqlDialect.create_table_sql(&plan()).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `spider`.`repos`"));
        assert!(sql.contains("`id` VARCHAR(32) NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (`id`)"));
        assert!(sql.ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));
    }

    #[test]
    fn test_mysql_create_schema_sql() {
        let sql = MySqlDialect.create_schema_sql(&plan()).unwrap();
        assert_eq!(
            sql,
            "CREATE SCHEMA IF NOT EXISTS `spider` DEFAULT CHARACTER SET utf8mb4"
        );
    }

    #[test]
    fn test_sqlserver_insert_skips_identity_column() {
        let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
            .with_field("seq", "STRING,20")
            .with_field("title", "TEXT")
            .with_auto_increment("seq");
        let plan = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap();

        let sql = SqlServerDialect.insert_sql(&plan);
        assert_eq!(sql, "INSERT INTO [repos] ([title]) VALUES (@title)");

        // MySQL keeps every column; NULL into AUTO_INCREMENT auto-assigns
        let sql = MySqlDialect.insert_sql(&plan);
        assert_eq!(sql, "INSERT INTO `repos` (`seq`, `title`) VALUES (@seq, @title)");
    }

    #[test]
    fn test_sqlserver_create_table_guarded() {
        let sql = SqlServerDialect.create_table_sql(&plan()).unwrap();
        assert!(sql.starts_with("IF OBJECT_ID(N'[spider].[repos]', N'U') IS NULL BEGIN"));
        assert!(sql.contains("CREATE TABLE [spider].[repos]"));
        assert!(sql.contains("[id] NVARCHAR(32) NOT NULL"));
        assert!(sql.ends_with("END"));
    }

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for("mysql").unwrap().name(), "MySQL");
        assert_eq!(dialect_for("MariaDB").unwrap().name(), "MySQL");
        assert_eq!(dialect_for("sqlserver").unwrap().name(), "SQL Server");
        assert!(dialect_for("oracle").is_err());
    }
}

//! Entity metadata describing the shape of scraped records
//!
//! Metadata arrives from an upstream resolution step (attribute or config
//! driven, outside this crate) and is the input to plan resolution: declared
//! fields, the primary key, an optional explicit update-set, index and
//! unique groups, an optional auto-increment column and the table-naming
//! policy.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Table-name suffix policy, applied once when metadata is resolved.
///
/// Non-`None` policies append `_` plus a date formatted `%Y_%m_%d`, so a
/// base name `orders` under the monthly policy on 2024-03-15 resolves to
/// `orders_2024_03_01`. The resolved name is frozen for the pipeline's
/// life; rollover re-resolution is a host concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSuffix {
    /// No suffix; the base name is used as-is
    #[default]
    None,
    /// Suffix with the current date (a table per day)
    Today,
    /// Suffix with the Monday of the current week (a table per week)
    Monday,
    /// Suffix with the first day of the current month (a table per month)
    FirstDayOfMonth,
}

impl TableSuffix {
    /// Render `base` with this policy applied for `date`.
    pub fn apply_on(self, base: &str, date: NaiveDate) -> String {
        let anchor = match self {
            Self::None => return base.to_string(),
            Self::Today => date,
            Self::Monday => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            Self::FirstDayOfMonth => date.with_day(1).unwrap_or(date),
        };
        format!("{}_{}", base, anchor.format("%Y_%m_%d"))
    }
}

/// One declared field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name; doubles as the column name in the store
    pub name: String,
    /// Logical type (`STRING,<n>`, `TEXT`, `BOOL`, `DATE`, `TIME`).
    /// An empty logical type marks the field as not persisted.
    #[serde(default)]
    pub logical_type: String,
}

impl Field {
    /// Create a new field
    pub fn new(name: impl Into<String>, logical_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logical_type: logical_type.into(),
        }
    }

    /// Whether the field is persisted to a store column
    pub fn is_persisted(&self) -> bool {
        !self.logical_type.is_empty()
    }
}

/// Where an entity's rows are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Database (schema) holding the table, when the store uses one
    #[serde(default)]
    pub database: Option<String>,
    /// Base table name, before any suffix policy
    pub table: String,
    /// Suffix policy applied at resolution time
    #[serde(default)]
    pub suffix: TableSuffix,
}

impl EntitySchema {
    /// Create a schema with a base table name and no suffix policy
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            database: None,
            table: table.into(),
            suffix: TableSuffix::None,
        }
    }

    /// Set the database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the suffix policy
    pub fn with_suffix(mut self, suffix: TableSuffix) -> Self {
        self.suffix = suffix;
        self
    }
}

/// How batches are written to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Insert every record
    #[default]
    Insert,
    /// Update the update-set columns of rows matched by primary key
    Update,
}

/// Resolved description of one entity, as produced upstream.
///
/// A metadata value with no [`EntitySchema`] disables the pipeline built
/// from it: there is nowhere to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name, used in logs and operation names
    pub name: String,
    /// Target schema; `None` disables the pipeline
    #[serde(default)]
    pub schema: Option<EntitySchema>,
    /// Declared fields, in declaration order
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Primary key field names, in order
    #[serde(default)]
    pub primary: Vec<String>,
    /// Explicit update-set field names. `None` defaults the update-set to
    /// all columns minus the primary key at resolution time.
    #[serde(default)]
    pub updates: Option<Vec<String>>,
    /// Secondary index groups
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
    /// Unique constraint groups
    #[serde(default)]
    pub uniques: Vec<Vec<String>>,
    /// Auto-increment column name, if any
    #[serde(default)]
    pub auto_increment: Option<String>,
}

impl EntityMetadata {
    /// Create metadata for an entity written to `schema`
    pub fn new(name: impl Into<String>, schema: EntitySchema) -> Self {
        Self {
            name: name.into(),
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Create metadata with no target schema (disables the pipeline)
    pub fn without_schema(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a declared field
    pub fn with_field(mut self, name: impl Into<String>, logical_type: impl Into<String>) -> Self {
        self.fields.push(Field::new(name, logical_type));
        self
    }

    /// Set the primary key field names
    pub fn with_primary<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set an explicit update-set
    pub fn with_updates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updates = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Append a secondary index group
    pub fn with_index<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Append a unique constraint group
    pub fn with_unique<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uniques
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Set the auto-increment column
    pub fn with_auto_increment(mut self, name: impl Into<String>) -> Self {
        self.auto_increment = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_suffix_none_is_identity() {
        assert_eq!(
            TableSuffix::None.apply_on("orders", date(2024, 3, 15)),
            "orders"
        );
    }

    #[test]
    fn test_suffix_today_uses_current_date() {
        assert_eq!(
            TableSuffix::Today.apply_on("orders", date(2024, 3, 15)),
            "orders_2024_03_15"
        );
    }

    #[test]
    fn test_suffix_monday_aligns_to_week_start() {
        // 2024-03-13 is a Wednesday; that week's Monday is 2024-03-11
        assert_eq!(
            TableSuffix::Monday.apply_on("orders", date(2024, 3, 13)),
            "orders_2024_03_11"
        );
        // a Monday maps to itself
        assert_eq!(
            TableSuffix::Monday.apply_on("orders", date(2024, 3, 11)),
            "orders_2024_03_11"
        );
        // week spanning a month boundary
        assert_eq!(
            TableSuffix::Monday.apply_on("orders", date(2024, 3, 2)),
            "orders_2024_02_26"
        );
    }

    #[test]
    fn test_suffix_month_aligns_to_first_day() {
        assert_eq!(
            TableSuffix::FirstDayOfMonth.apply_on("orders", date(2024, 3, 15)),
            "orders_2024_03_01"
        );
    }

    #[test]
    fn test_field_persistence() {
        assert!(Field::new("title", "STRING,100").is_persisted());
        assert!(!Field::new("raw", "").is_persisted());
    }

    #[test]
    fn test_metadata_builders() {
        let metadata = EntityMetadata::new("repo", EntitySchema::new("repos").with_database("spider"))
            .with_field("id", "STRING,32")
            .with_field("title", "TEXT")
            .with_primary(["id"])
            .with_index(["title"])
            .with_auto_increment("seq");

        assert_eq!(metadata.fields.len(), 2);
        assert_eq!(metadata.primary, vec!["id"]);
        assert_eq!(metadata.updates, None);
        assert_eq!(metadata.indexes, vec![vec!["title".to_string()]]);
        assert_eq!(metadata.auto_increment.as_deref(), Some("seq"));

        let disabled = EntityMetadata::without_schema("repo");
        assert!(disabled.schema.is_none());
    }

    #[test]
    fn test_suffix_serde_names() {
        let suffix: TableSuffix = serde_json::from_str("\"first_day_of_month\"").unwrap();
        assert_eq!(suffix, TableSuffix::FirstDayOfMonth);
        let mode: WriteMode = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(mode, WriteMode::Update);
    }
}

//! Write-plan resolution
//!
//! [`WritePlan::resolve`] validates entity metadata and freezes it into the
//! immutable plan every later step works from: persisted columns in
//! declaration order, the primary key and update-set resolved against those
//! columns, validated index/unique groups and the suffix-resolved table
//! name. Resolution happens once per pipeline; the plan is then shared
//! read-only (an `Arc` in practice) and never mutated, so concurrent batch
//! writes need no locking.

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::{EntityMetadata, Field, WriteMode};

/// Immutable, validated form of entity metadata.
///
/// Built exactly once per pipeline instance. All column sequences preserve
/// the declaration order of the underlying fields.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    /// Entity name, carried for logs and operation names
    pub entity: String,
    /// Database (schema) holding the table, when the store uses one
    pub database: Option<String>,
    /// Table name with the suffix policy already applied
    pub table: String,
    /// Persisted columns, in declaration order
    pub columns: Vec<Field>,
    /// Primary key columns, an ordered subset of `columns`
    pub primary: Vec<Field>,
    /// Update-set columns, disjoint from `primary`; empty in insert mode
    pub update_columns: Vec<Field>,
    /// Secondary index groups over column names
    pub indexes: Vec<Vec<String>>,
    /// Unique constraint groups over column names
    pub uniques: Vec<Vec<String>>,
    /// Auto-increment column name, if any
    pub auto_increment: Option<String>,
}

impl WritePlan {
    /// Resolve metadata into a plan using today's date for the table
    /// suffix policy.
    pub fn resolve(metadata: &EntityMetadata, mode: WriteMode) -> Result<Self> {
        Self::resolve_on(metadata, mode, Local::now().date_naive())
    }

    /// Resolve metadata into a plan, applying the suffix policy for an
    /// explicit date. The resolved table name is frozen for the plan's
    /// life; day rollover never renames it.
    pub fn resolve_on(metadata: &EntityMetadata, mode: WriteMode, date: NaiveDate) -> Result<Self> {
        let schema = metadata.schema.as_ref().ok_or_else(|| {
            Error::config(format!("entity '{}' has no schema to write to", metadata.name))
        })?;

        let columns: Vec<Field> = metadata
            .fields
            .iter()
            .filter(|f| f.is_persisted())
            .cloned()
            .collect();
        if columns.is_empty() {
            return Err(Error::config(format!(
                "entity '{}' declares no persisted columns",
                metadata.name
            )));
        }

        let primary = resolve_group(&columns, &metadata.primary, || {
            "primary key references undeclared column".to_string()
        })?;

        let update_columns = match mode {
            WriteMode::Insert => Vec::new(),
            WriteMode::Update => {
                if primary.is_empty() {
                    return Err(Error::config("update mode requires a primary key"));
                }
                let mut update_columns = match &metadata.updates {
                    Some(names) => resolve_group(&columns, names, || {
                        "update set references undeclared column".to_string()
                    })?,
                    None => columns.clone(),
                };
                update_columns.retain(|c| !primary.iter().any(|p| p.name == c.name));
                if update_columns.is_empty() {
                    return Err(Error::config("cannot update only the primary key"));
                }
                update_columns
            }
        };

        let indexes = resolve_name_groups(&columns, &metadata.indexes, "index")?;
        let uniques = resolve_name_groups(&columns, &metadata.uniques, "unique constraint")?;

        let auto_increment = match metadata.auto_increment.as_deref().filter(|s| !s.is_empty()) {
            Some(name) => {
                if !columns.iter().any(|c| c.name == name) {
                    return Err(Error::config(format!(
                        "auto-increment references undeclared column '{name}'"
                    )));
                }
                Some(name.to_string())
            }
            None => None,
        };

        let table = schema.suffix.apply_on(&schema.table, date);
        debug!(
            entity = %metadata.name,
            table = %table,
            columns = columns.len(),
            primary = primary.len(),
            "resolved write plan"
        );

        Ok(Self {
            entity: metadata.name.clone(),
            database: schema.database.clone(),
            table,
            columns,
            primary,
            update_columns,
            indexes,
            uniques,
            auto_increment,
        })
    }

    /// Table name qualified with the database, when one is set
    pub fn qualified_table(&self) -> String {
        match &self.database {
            Some(db) => format!("{}.{}", db, self.table),
            None => self.table.clone(),
        }
    }
}

/// Resolve `names` against the persisted columns, preserving order.
fn resolve_group(
    columns: &[Field],
    names: &[String],
    context: impl Fn() -> String,
) -> Result<Vec<Field>> {
    names
        .iter()
        .map(|name| {
            columns
                .iter()
                .find(|c| &c.name == name)
                .cloned()
                .ok_or_else(|| Error::config(format!("{} '{}'", context(), name)))
        })
        .collect()
}

/// Validate index/unique groups, dropping empty groups.
fn resolve_name_groups(
    columns: &[Field],
    groups: &[Vec<String>],
    kind: &str,
) -> Result<Vec<Vec<String>>> {
    let mut resolved = Vec::with_capacity(groups.len());
    for group in groups {
        if group.is_empty() {
            continue;
        }
        for name in group {
            if !columns.iter().any(|c| &c.name == name) {
                return Err(Error::config(format!(
                    "{kind} references undeclared column '{name}'"
                )));
            }
        }
        resolved.push(group.clone());
    }
    Ok(resolved)
}

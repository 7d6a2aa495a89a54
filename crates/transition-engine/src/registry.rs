//! Registry of tables that carry temporal fields.
//!
//! The registry tells the record-loading collaborator which tables to scan
//! and which columns to read. It is assembled with a [`TableRegistryBuilder`]
//! and frozen into a [`TableRegistry`]; after that it is read-only and can be
//! shared freely across threads.
//!
//! The two default tables (`pages` and `tt_content`) are always present and
//! cannot be replaced or removed. Custom tables must declare at least the
//! identity column and both temporal bound columns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::record::{SourceKind, TemporalRecord, CONTENT_TABLE, PAGES_TABLE};

pub const UID_FIELD: &str = "uid";
pub const START_FIELD: &str = "starttime";
pub const END_FIELD: &str = "endtime";

/// Fields every registered table must provide.
pub const REQUIRED_FIELDS: [&str; 3] = [UID_FIELD, START_FIELD, END_FIELD];

const PAGE_FIELDS: [&str; 8] = [
    "uid",
    "title",
    "pid",
    "starttime",
    "endtime",
    "sys_language_uid",
    "hidden",
    "deleted",
];

const CONTENT_FIELDS: [&str; 8] = [
    "uid",
    "header",
    "pid",
    "starttime",
    "endtime",
    "sys_language_uid",
    "hidden",
    "deleted",
];

/// Fields assumed for a custom table registered without an explicit list.
pub const DEFAULT_CUSTOM_FIELDS: [&str; 6] =
    ["uid", "pid", "starttime", "endtime", "hidden", "deleted"];

fn to_owned_fields(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn default_tables() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (PAGES_TABLE.to_string(), to_owned_fields(&PAGE_FIELDS)),
        (CONTENT_TABLE.to_string(), to_owned_fields(&CONTENT_FIELDS)),
    ])
}

fn is_default_table(name: &str) -> bool {
    name == PAGES_TABLE || name == CONTENT_TABLE
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Mutable staging area for custom table registrations.
///
/// A rejected registration leaves previously registered tables in place.
#[derive(Debug, Clone, Default)]
pub struct TableRegistryBuilder {
    custom: BTreeMap<String, Vec<String>>,
}

impl TableRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom table.
    ///
    /// `fields = None` uses [`DEFAULT_CUSTOM_FIELDS`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRegistration`] if `name` is empty, names
    /// a default table, is already registered, or if `fields` lacks one of
    /// [`REQUIRED_FIELDS`]. The builder is unchanged in that case.
    pub fn register_table(&mut self, name: &str, fields: Option<&[&str]>) -> Result<&mut Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(reject("table name must not be empty".to_string()));
        }
        if is_default_table(name) {
            return Err(reject(format!("'{name}' is a default table")));
        }
        if self.custom.contains_key(name) {
            return Err(reject(format!("'{name}' is already registered")));
        }

        let fields = fields.unwrap_or(&DEFAULT_CUSTOM_FIELDS[..]);
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|req| !fields.contains(*req)) {
            return Err(reject(format!(
                "table '{name}' is missing required field '{missing}'"
            )));
        }

        debug!(table = name, fields = fields.len(), "registered temporal table");
        self.custom.insert(name.to_string(), to_owned_fields(fields));
        Ok(self)
    }

    /// Drop a custom table. Default and unknown names are ignored.
    pub fn unregister_table(&mut self, name: &str) -> &mut Self {
        self.custom.remove(name);
        self
    }

    pub fn clear_custom_tables(&mut self) -> &mut Self {
        self.custom.clear();
        self
    }

    /// Freeze the current registrations. The builder stays usable.
    pub fn build(&self) -> TableRegistry {
        TableRegistry {
            defaults: default_tables(),
            custom: self.custom.clone(),
        }
    }
}

fn reject(reason: String) -> EngineError {
    warn!(%reason, "rejected table registration");
    EngineError::InvalidRegistration(reason)
}

// ── Registry ────────────────────────────────────────────────────────────────

/// Frozen table → field-list lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRegistry {
    defaults: BTreeMap<String, Vec<String>>,
    custom: BTreeMap<String, Vec<String>>,
}

impl Default for TableRegistry {
    /// A registry holding only the default tables.
    fn default() -> Self {
        TableRegistryBuilder::new().build()
    }
}

impl TableRegistry {
    pub fn builder() -> TableRegistryBuilder {
        TableRegistryBuilder::new()
    }

    pub fn is_registered(&self, table: &str) -> bool {
        self.defaults.contains_key(table) || self.custom.contains_key(table)
    }

    /// Field list of `table`, or `None` when it is not registered.
    pub fn table_fields(&self, table: &str) -> Option<&[String]> {
        self.defaults
            .get(table)
            .or_else(|| self.custom.get(table))
            .map(Vec::as_slice)
    }

    /// Default and custom tables together, ordered by name.
    pub fn all_tables(&self) -> BTreeMap<&str, &[String]> {
        self.defaults
            .iter()
            .chain(self.custom.iter())
            .map(|(name, fields)| (name.as_str(), fields.as_slice()))
            .collect()
    }

    pub fn custom_tables(&self) -> BTreeMap<&str, &[String]> {
        self.custom
            .iter()
            .map(|(name, fields)| (name.as_str(), fields.as_slice()))
            .collect()
    }

    pub fn total_table_count(&self) -> usize {
        self.defaults.len() + self.custom.len()
    }

    pub fn custom_table_count(&self) -> usize {
        self.custom.len()
    }

    /// Build a [`TemporalRecord`] from a raw storage row of `table`.
    ///
    /// Bound columns holding `0`, `null` or nothing mean "no bound". The label
    /// is taken from `title`, then `header`, else left empty. Flags accept
    /// booleans or `0`/`1`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRecord`] if `table` is not registered,
    /// the `uid` column is missing or not a positive integer, or a bound is
    /// not an integer epoch.
    pub fn record_from_row(&self, table: &str, row: &Map<String, Value>) -> Result<TemporalRecord> {
        if !self.is_registered(table) {
            return Err(EngineError::InvalidRecord(format!(
                "table '{table}' is not registered"
            )));
        }

        let id = row
            .get(UID_FIELD)
            .and_then(Value::as_u64)
            .filter(|uid| *uid > 0)
            .ok_or_else(|| {
                EngineError::InvalidRecord(format!("{table}: missing or invalid '{UID_FIELD}'"))
            })?;

        let label = ["title", "header"]
            .iter()
            .find_map(|key| row.get(*key).and_then(Value::as_str))
            .unwrap_or_default();

        let record = TemporalRecord::new(id, SourceKind::from(table), label)
            .with_bounds(
                epoch_field(table, row, START_FIELD)?,
                epoch_field(table, row, END_FIELD)?,
            )
            .with_container(row.get("pid").and_then(Value::as_u64).unwrap_or(0))
            .with_locale(
                int_field(row, "sys_language_uid"),
                int_field(row, "t3ver_wsid"),
            )
            .with_flags(flag_field(row, "hidden"), flag_field(row, "deleted"));
        Ok(record)
    }
}

fn epoch_field(
    table: &str,
    row: &Map<String, Value>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let secs = value.as_i64().ok_or_else(|| {
                EngineError::InvalidRecord(format!("{table}: '{field}' is not an integer epoch"))
            })?;
            if secs == 0 {
                return Ok(None);
            }
            DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or(EngineError::OutOfRange(secs))
        }
    }
}

fn int_field(row: &Map<String, Value>, field: &str) -> i64 {
    row.get(field).and_then(Value::as_i64).unwrap_or(0)
}

fn flag_field(row: &Map<String, Value>, field: &str) -> bool {
    match row.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(value) => value.as_i64().is_some_and(|v| v != 0),
        None => false,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

//! Per-call routing hints, set by an administrative command before the
//! statement runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_common::datum::Datum;

/// Forced shard values for one logic table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableHint {
    pub database_values: Vec<Datum>,
    pub table_values: Vec<Datum>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintContext {
    /// Keyed by lower-cased logic table name.
    tables: BTreeMap<String, TableHint>,
    /// Send the statement unchanged to this data source.
    database_only: Option<String>,
}

impl HintContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_only(data_source: impl Into<String>) -> Self {
        Self {
            tables: BTreeMap::new(),
            database_only: Some(data_source.into()),
        }
    }

    pub fn add_database_value(&mut self, logic_table: &str, value: impl Into<Datum>) -> &mut Self {
        self.entry(logic_table).database_values.push(value.into());
        self
    }

    pub fn add_table_value(&mut self, logic_table: &str, value: impl Into<Datum>) -> &mut Self {
        self.entry(logic_table).table_values.push(value.into());
        self
    }

    fn entry(&mut self, logic_table: &str) -> &mut TableHint {
        self.tables
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
    }

    pub fn table(&self, logic_table: &str) -> Option<&TableHint> {
        self.tables.get(&logic_table.to_ascii_lowercase())
    }

    pub fn has_table(&self, logic_table: &str) -> bool {
        self.table(logic_table).is_some()
    }

    pub fn database_only_target(&self) -> Option<&str> {
        self.database_only.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.database_only.is_none()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.database_only = None;
    }
}

//! Per-schema metadata cache.
//!
//! Entries are keyed by `(schema, data_source)` and hold the logic-named
//! tables loaded from that data source. The cache belongs to whoever owns
//! the schema lifecycle; dropping a schema or reloading its rule should
//! invalidate it explicitly.

use std::sync::Arc;

use dashmap::DashMap;
use tessera_common::error::TesseraResult;

use crate::model::TableMetadata;

type Key = (String, String);

#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<Key, Arc<Vec<TableMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, schema: &str, data_source: &str) -> Option<Arc<Vec<TableMetadata>>> {
        self.entries
            .get(&(schema.to_string(), data_source.to_string()))
            .map(|e| Arc::clone(e.value()))
    }

    pub fn insert(
        &self,
        schema: &str,
        data_source: &str,
        tables: Vec<TableMetadata>,
    ) -> Arc<Vec<TableMetadata>> {
        let tables = Arc::new(tables);
        self.entries.insert(
            (schema.to_string(), data_source.to_string()),
            Arc::clone(&tables),
        );
        tables
    }

    /// Cached entry, or the result of `load` stored under the key. A failed
    /// load caches nothing.
    pub fn get_or_load<F>(
        &self,
        schema: &str,
        data_source: &str,
        load: F,
    ) -> TesseraResult<Arc<Vec<TableMetadata>>>
    where
        F: FnOnce() -> TesseraResult<Vec<TableMetadata>>,
    {
        if let Some(hit) = self.get(schema, data_source) {
            return Ok(hit);
        }
        let tables = load()?;
        Ok(self.insert(schema, data_source, tables))
    }

    /// Drop every entry of `schema`. Returns the number removed.
    pub fn invalidate_schema(&self, schema: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(s, _), _| s != schema);
        let removed = before.saturating_sub(self.entries.len());
        tracing::debug!(schema, removed, "metadata cache invalidated");
        removed
    }

    pub fn invalidate_data_source(&self, schema: &str, data_source: &str) -> bool {
        self.entries
            .remove(&(schema.to_string(), data_source.to_string()))
            .is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

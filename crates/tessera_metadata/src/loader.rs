//! Parallel schema metadata loading.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tessera_common::config::MetadataConfig;
use tessera_common::error::{ConfigError, MetadataError, TesseraError, TesseraResult};
use tessera_rule::ShardingRule;

use crate::cache::MetadataCache;
use crate::model::{SchemaMetadata, TableMetadata};
use crate::pool::{CancelToken, WorkerPool};
use crate::source::MetadataSource;

/// One representative actual table to read for a logic table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Probe {
    logic: String,
    actual: String,
}

pub struct MetadataLoader<'p> {
    pool: &'p WorkerPool,
    timeout: Option<Duration>,
    cache: Option<Arc<MetadataCache>>,
}

impl<'p> MetadataLoader<'p> {
    pub fn new(pool: &'p WorkerPool) -> Self {
        Self {
            pool,
            timeout: None,
            cache: None,
        }
    }

    /// Loader using `config.load_timeout_ms` (0 disables the timeout).
    pub fn from_config(pool: &'p WorkerPool, config: &MetadataConfig) -> Self {
        let loader = Self::new(pool);
        match config.load_timeout_ms {
            0 => loader,
            ms => loader.with_timeout(Duration::from_millis(ms)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Load every sharding and broadcast table of `rule` into one
    /// logic-named schema. Each data source is read by one task; the first
    /// failing task aborts the rest.
    pub fn load(
        &self,
        schema: &str,
        rule: &ShardingRule,
        sources: &[Arc<dyn MetadataSource>],
    ) -> TesseraResult<SchemaMetadata> {
        let start = Instant::now();
        let result = self.do_load(schema, rule, sources);
        let elapsed = start.elapsed().as_micros() as u64;
        match &result {
            Ok(metadata) => {
                tessera_observability::record_metadata_load("ok", metadata.len(), elapsed);
                tracing::info!(
                    schema,
                    tables = metadata.len(),
                    data_sources = sources.len(),
                    duration_us = elapsed,
                    "schema metadata loaded"
                );
            }
            Err(e) => {
                e.log_if_fatal();
                let outcome = match e {
                    TesseraError::Metadata(MetadataError::Cancelled) => "cancelled",
                    TesseraError::Metadata(MetadataError::Timeout(_)) => "timeout",
                    _ => "failed",
                };
                tessera_observability::record_metadata_load(outcome, 0, elapsed);
                tracing::warn!(schema, error = %e, "schema metadata load failed");
            }
        }
        result
    }

    fn do_load(
        &self,
        schema: &str,
        rule: &ShardingRule,
        sources: &[Arc<dyn MetadataSource>],
    ) -> TesseraResult<SchemaMetadata> {
        let plan = probe_plan(rule);
        let mut fragments: IndexMap<String, Arc<Vec<TableMetadata>>> = IndexMap::new();
        let mut pending = Vec::new();

        for (data_source, probes) in &plan {
            if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(schema, data_source)) {
                fragments.insert(data_source.clone(), hit);
                continue;
            }
            let source = sources
                .iter()
                .find(|s| s.data_source() == data_source.as_str())
                .ok_or_else(|| ConfigError::UnknownDataSource {
                    data_source: data_source.clone(),
                    table: probes.first().map(|p| p.logic.clone()).unwrap_or_default(),
                })?;
            pending.push((data_source.clone(), Arc::clone(source), probes.as_slice()));
        }

        let tasks: Vec<_> = pending
            .into_iter()
            .map(|(data_source, source, probes)| {
                move |cancel: &CancelToken<'_>| -> TesseraResult<(String, Vec<TableMetadata>)> {
                    let tables = load_data_source(source.as_ref(), probes, cancel)?;
                    Ok((data_source, tables))
                }
            })
            .collect();
        for (data_source, tables) in self.pool.run(tasks, self.timeout)? {
            let tables = match &self.cache {
                Some(cache) => cache.insert(schema, &data_source, tables),
                None => Arc::new(tables),
            };
            fragments.insert(data_source, tables);
        }

        let logic_tables = rule
            .table_rules()
            .map(|r| r.logic_table())
            .chain(rule.broadcast_tables().filter(|t| !rule.is_sharding_table(t)));
        let mut metadata = SchemaMetadata::new(schema);
        for logic in logic_tables {
            let table = fragments
                .values()
                .flat_map(|f| f.iter())
                .find(|t| t.name.eq_ignore_ascii_case(logic));
            if let Some(table) = table {
                metadata.insert(table.clone());
            }
        }
        Ok(metadata)
    }
}

/// Representative tables grouped by the data source that holds them, in
/// rule order. Sharding tables use their first data node; broadcast tables
/// are read from the first data source.
fn probe_plan(rule: &ShardingRule) -> IndexMap<String, Vec<Probe>> {
    let mut plan: IndexMap<String, Vec<Probe>> = IndexMap::new();
    for table_rule in rule.table_rules() {
        if let Some(node) = table_rule.actual_data_nodes().first() {
            plan.entry(node.data_source.clone()).or_default().push(Probe {
                logic: table_rule.logic_table().to_string(),
                actual: node.table.clone(),
            });
        }
    }
    if let Some(first) = rule.data_source_names().first() {
        for table in rule.broadcast_tables() {
            if rule.is_sharding_table(table) {
                continue;
            }
            plan.entry(first.clone()).or_default().push(Probe {
                logic: table.to_string(),
                actual: table.to_string(),
            });
        }
    }
    plan
}

fn load_data_source(
    source: &dyn MetadataSource,
    probes: &[Probe],
    cancel: &CancelToken<'_>,
) -> TesseraResult<Vec<TableMetadata>> {
    let mut tables = Vec::with_capacity(probes.len());
    for probe in probes {
        cancel.check()?;
        let table = source
            .load_table(&probe.actual, cancel)?
            .ok_or_else(|| MetadataError::TableMissing {
                data_source: source.data_source().to_string(),
                table: probe.actual.clone(),
            })?;
        tracing::trace!(
            data_source = source.data_source(),
            logic = %probe.logic,
            actual = %probe.actual,
            columns = table.columns.len(),
            "table metadata fetched"
        );
        tables.push(table.into_logic(&probe.logic));
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_rule::ShardingRuleConfig;

    #[test]
    fn test_probe_plan_groups_by_data_source() {
        let rule = ShardingRuleConfig::from_toml_str(
            r#"
data_sources = ["ds_0", "ds_1"]
broadcast_tables = ["t_config"]

[[tables]]
logic_table = "t_order"
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"

[[tables]]
logic_table = "t_audit"
actual_data_nodes = "ds_1.t_audit_${0..1}"
"#,
        )
        .unwrap()
        .build()
        .unwrap();
        let plan = probe_plan(&rule);
        let names = |ds: &str| -> Vec<(String, String)> {
            plan[ds]
                .iter()
                .map(|p| (p.logic.clone(), p.actual.clone()))
                .collect()
        };
        assert_eq!(
            names("ds_0"),
            vec![
                ("t_order".to_string(), "t_order_0".to_string()),
                ("t_config".to_string(), "t_config".to_string()),
            ]
        );
        assert_eq!(names("ds_1"), vec![("t_audit".to_string(), "t_audit_0".to_string())]);
    }
}

use std::sync::Arc;

use indexmap::IndexMap;

use crate::data_node::DataNode;
use crate::key_gen::KeyGenerator;
use crate::strategy::ShardingStrategy;

/// Generated key column and the generator that fills it.
#[derive(Debug, Clone)]
pub struct KeyGenerateSpec {
    pub column: String,
    pub generator: Arc<dyn KeyGenerator>,
}

/// Physical layout and sharding strategies of one logic table.
///
/// `database_strategy` / `table_strategy` are `None` when the table inherits
/// the rule's defaults; use `ShardingRule::database_strategy` to resolve.
#[derive(Debug, Clone)]
pub struct TableRule {
    logic_table: String,
    actual_data_nodes: Vec<DataNode>,
    /// data source -> actual tables, both in declaration order.
    tables_by_data_source: IndexMap<String, Vec<String>>,
    database_strategy: Option<ShardingStrategy>,
    table_strategy: Option<ShardingStrategy>,
    key_generate: Option<KeyGenerateSpec>,
}

impl TableRule {
    pub fn new(logic_table: impl Into<String>, actual_data_nodes: Vec<DataNode>) -> Self {
        let mut tables_by_data_source: IndexMap<String, Vec<String>> = IndexMap::new();
        for node in &actual_data_nodes {
            tables_by_data_source
                .entry(node.data_source.clone())
                .or_default()
                .push(node.table.clone());
        }
        Self {
            logic_table: logic_table.into(),
            actual_data_nodes,
            tables_by_data_source,
            database_strategy: None,
            table_strategy: None,
            key_generate: None,
        }
    }

    pub fn with_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.database_strategy = Some(strategy);
        self
    }

    pub fn with_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.table_strategy = Some(strategy);
        self
    }

    pub fn with_key_generate(mut self, spec: KeyGenerateSpec) -> Self {
        self.key_generate = Some(spec);
        self
    }

    pub fn logic_table(&self) -> &str {
        &self.logic_table
    }

    pub fn actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    pub fn own_database_strategy(&self) -> Option<&ShardingStrategy> {
        self.database_strategy.as_ref()
    }

    pub fn own_table_strategy(&self) -> Option<&ShardingStrategy> {
        self.table_strategy.as_ref()
    }

    pub fn key_generate(&self) -> Option<&KeyGenerateSpec> {
        self.key_generate.as_ref()
    }

    pub fn generate_key_column(&self) -> Option<&str> {
        self.key_generate.as_ref().map(|k| k.column.as_str())
    }

    /// Data sources hosting this table, in declaration order.
    pub fn actual_data_source_names(&self) -> Vec<String> {
        self.tables_by_data_source.keys().cloned().collect()
    }

    /// Actual tables on `data_source`, in declaration order.
    pub fn actual_table_names(&self, data_source: &str) -> Vec<String> {
        self.tables_by_data_source
            .get(data_source)
            .cloned()
            .unwrap_or_default()
    }

    /// Ordinal of `actual_table` within the tables on `data_source`.
    pub fn find_actual_table_index(&self, data_source: &str, actual_table: &str) -> Option<usize> {
        self.tables_by_data_source
            .get(data_source)?
            .iter()
            .position(|t| t.eq_ignore_ascii_case(actual_table))
    }

    /// Actual table at `index` on `data_source`.
    pub fn actual_table_at(&self, data_source: &str, index: usize) -> Option<&str> {
        self.tables_by_data_source
            .get(data_source)?
            .get(index)
            .map(String::as_str)
    }

    pub fn is_existed(&self, actual_table: &str) -> bool {
        self.actual_data_nodes
            .iter()
            .any(|n| n.table.eq_ignore_ascii_case(actual_table))
    }

    pub fn contains_data_node(&self, data_source: &str, actual_table: &str) -> bool {
        self.find_actual_table_index(data_source, actual_table).is_some()
    }

    /// Per-node suffix used for binding validation: the actual name with the
    /// logic name stripped, falling back to the trailing digits.
    pub fn actual_table_suffix(&self, actual_table: &str) -> String {
        let lower = actual_table.to_ascii_lowercase();
        let logic = self.logic_table.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix(&logic) {
            return rest.to_string();
        }
        let digits = lower
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_digit())
            .count();
        lower[lower.len() - digits..].to_string()
    }
}

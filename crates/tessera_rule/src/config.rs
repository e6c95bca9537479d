//! The declarative rule document and its translation into a [`ShardingRule`].

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tessera_common::error::{ConfigError, ErrorContext, TesseraResult};

use crate::algorithm::{create_algorithm, AlgorithmConfig, ShardingAlgorithm};
use crate::data_node::DataNode;
use crate::inline;
use crate::key_gen::{create_key_generator, KeyGenerator};
use crate::rule::ShardingRule;
use crate::strategy::ShardingStrategy;
use crate::table_rule::{KeyGenerateSpec, TableRule};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingRuleConfig {
    pub data_sources: Vec<String>,
    pub tables: Vec<TableRuleConfig>,
    pub binding_tables: Vec<Vec<String>>,
    pub broadcast_tables: Vec<String>,
    pub default_database_strategy: Option<StrategyConfig>,
    pub default_table_strategy: Option<StrategyConfig>,
    pub algorithms: IndexMap<String, AlgorithmConfig>,
    pub key_generators: IndexMap<String, AlgorithmConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRuleConfig {
    pub logic_table: String,
    /// Inline expression, e.g. `ds_${0..1}.t_order_${0..1}`. When absent the
    /// table is `<ds>.<logic_table>` on every data source.
    #[serde(default)]
    pub actual_data_nodes: Option<String>,
    #[serde(default)]
    pub database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub table_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub key_generate: Option<KeyGenerateConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StrategyConfig {
    Standard { column: String, algorithm: String },
    Complex { columns: Vec<String>, algorithm: String },
    Hint { algorithm: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGenerateConfig {
    pub column: String,
    pub generator: String,
}

impl ShardingRuleConfig {
    pub fn from_toml_str(text: &str) -> TesseraResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    pub fn load(path: &Path) -> TesseraResult<Self> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&text).ctx_with(|| path.display().to_string())
    }

    pub fn to_toml_string(&self) -> TesseraResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Instantiate algorithms and key generators, expand data nodes, and
    /// validate the whole rule.
    pub fn build(&self) -> TesseraResult<ShardingRule> {
        let mut algorithms: IndexMap<&str, ShardingAlgorithm> = IndexMap::new();
        for (name, cfg) in &self.algorithms {
            algorithms.insert(name.as_str(), create_algorithm(name, cfg)?);
        }
        let mut generators: IndexMap<&str, Arc<dyn KeyGenerator>> = IndexMap::new();
        for (name, cfg) in &self.key_generators {
            generators.insert(name.as_str(), create_key_generator(name, cfg)?);
        }
        let strategies = StrategyFactory { algorithms: &algorithms };

        let mut builder = ShardingRule::builder(self.data_sources.iter().cloned());
        if let Some(cfg) = &self.default_database_strategy {
            builder = builder
                .default_database_strategy(strategies.build(cfg, "default_database_strategy")?);
        }
        if let Some(cfg) = &self.default_table_strategy {
            builder =
                builder.default_table_strategy(strategies.build(cfg, "default_table_strategy")?);
        }

        for table in &self.tables {
            let nodes = match &table.actual_data_nodes {
                Some(expr) => inline::expand(expr)?
                    .iter()
                    .map(|n| DataNode::parse(n))
                    .collect::<TesseraResult<Vec<_>>>()?,
                None => self
                    .data_sources
                    .iter()
                    .map(|ds| DataNode::new(ds.clone(), table.logic_table.clone()))
                    .collect(),
            };
            let mut rule = TableRule::new(table.logic_table.clone(), nodes);
            if let Some(cfg) = &table.database_strategy {
                let owner = format!("table {} database_strategy", table.logic_table);
                rule = rule.with_database_strategy(strategies.build(cfg, &owner)?);
            }
            if let Some(cfg) = &table.table_strategy {
                let owner = format!("table {} table_strategy", table.logic_table);
                rule = rule.with_table_strategy(strategies.build(cfg, &owner)?);
            }
            if let Some(kg) = &table.key_generate {
                let generator = generators.get(kg.generator.as_str()).ok_or_else(|| {
                    ConfigError::UndefinedKeyGenerator {
                        name: kg.generator.clone(),
                        referenced_by: format!("table {}", table.logic_table),
                    }
                })?;
                rule = rule.with_key_generate(KeyGenerateSpec {
                    column: kg.column.clone(),
                    generator: generator.clone(),
                });
            }
            builder = builder.table(rule);
        }
        for group in &self.binding_tables {
            builder = builder.binding_group(group.iter().cloned());
        }
        for table in &self.broadcast_tables {
            builder = builder.broadcast_table(table.clone());
        }

        let rule = builder.build()?;
        tracing::info!(
            data_sources = rule.data_source_names().len(),
            tables = self.tables.len(),
            binding_groups = rule.binding_groups().len(),
            broadcast_tables = self.broadcast_tables.len(),
            "sharding rule built"
        );
        Ok(rule)
    }
}

struct StrategyFactory<'a> {
    algorithms: &'a IndexMap<&'a str, ShardingAlgorithm>,
}

impl StrategyFactory<'_> {
    fn algorithm(&self, name: &str, owner: &str) -> TesseraResult<&ShardingAlgorithm> {
        self.algorithms.get(name).ok_or_else(|| {
            ConfigError::UndefinedAlgorithm {
                name: name.to_string(),
                referenced_by: owner.to_string(),
            }
            .into()
        })
    }

    fn build(&self, cfg: &StrategyConfig, owner: &str) -> TesseraResult<ShardingStrategy> {
        let wrong_family = |algorithm: &ShardingAlgorithm, expected: &str| {
            ConfigError::InvalidStrategy {
                table: owner.to_string(),
                reason: format!(
                    "{expected} strategy cannot use {} algorithm {}",
                    algorithm.family(),
                    algorithm.type_name()
                ),
            }
        };
        let strategy = match cfg {
            StrategyConfig::Standard { column, algorithm } => {
                match self.algorithm(algorithm, owner)? {
                    ShardingAlgorithm::Standard(a) => ShardingStrategy::Standard {
                        column: column.clone(),
                        algorithm: a.clone(),
                    },
                    other => return Err(wrong_family(other, "standard").into()),
                }
            }
            StrategyConfig::Complex { columns, algorithm } => {
                if columns.is_empty() {
                    return Err(ConfigError::InvalidStrategy {
                        table: owner.to_string(),
                        reason: "complex strategy needs at least one column".into(),
                    }
                    .into());
                }
                match self.algorithm(algorithm, owner)? {
                    ShardingAlgorithm::Complex(a) => ShardingStrategy::Complex {
                        columns: columns.clone(),
                        algorithm: a.clone(),
                    },
                    other => return Err(wrong_family(other, "complex").into()),
                }
            }
            StrategyConfig::Hint { algorithm } => match self.algorithm(algorithm, owner)? {
                ShardingAlgorithm::Hint(a) => ShardingStrategy::Hint {
                    algorithm: a.clone(),
                },
                other => return Err(wrong_family(other, "hint").into()),
            },
            StrategyConfig::None => ShardingStrategy::None,
        };
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
data_sources = ["ds_0", "ds_1"]
binding_tables = [["t_order", "t_order_item"]]
broadcast_tables = ["t_config"]

[default_database_strategy]
type = "standard"
column = "user_id"
algorithm = "db_mod"

[[tables]]
logic_table = "t_order"
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
table_strategy = { type = "standard", column = "order_id", algorithm = "table_mod" }
key_generate = { column = "order_id", generator = "snowflake" }

[[tables]]
logic_table = "t_order_item"
actual_data_nodes = "ds_${0..1}.t_order_item_${0..1}"
table_strategy = { type = "standard", column = "order_id", algorithm = "table_mod" }

[[tables]]
logic_table = "t_user"

[algorithms.db_mod]
type = "MOD"
props = { sharding-count = "2" }

[algorithms.table_mod]
type = "INLINE"
props = { algorithm-expression = "t_order_${order_id % 2}" }

[key_generators.snowflake]
type = "SNOWFLAKE"
props = { worker-id = "1" }
"#;

    #[test]
    fn test_build_full_document() {
        let rule = ShardingRuleConfig::from_toml_str(DOC).unwrap().build().unwrap();
        let order = rule.find_table_rule("t_order").unwrap();
        assert_eq!(order.actual_data_nodes().len(), 4);
        assert_eq!(order.generate_key_column(), Some("order_id"));
        assert_eq!(rule.database_strategy(order).kind(), "standard");
        let user = rule.find_table_rule("t_user").unwrap();
        let nodes: Vec<String> = user.actual_data_nodes().iter().map(|n| n.to_string()).collect();
        assert_eq!(nodes, vec!["ds_0.t_user", "ds_1.t_user"]);
        assert!(rule.table_strategy(user).is_none());
        assert!(rule.is_all_binding_tables(&["t_order_item", "t_order"]));
    }

    #[test]
    fn test_undefined_references() {
        let doc = DOC.replace("algorithm = \"db_mod\"", "algorithm = \"nope\"");
        let e = ShardingRuleConfig::from_toml_str(&doc).unwrap().build().unwrap_err();
        assert!(e.to_string().contains("Undefined sharding algorithm 'nope'"));

        let doc = DOC.replace("generator = \"snowflake\"", "generator = \"uuid\"");
        let e = ShardingRuleConfig::from_toml_str(&doc).unwrap().build().unwrap_err();
        assert!(e.to_string().contains("Undefined key generator 'uuid'"));
    }

    #[test]
    fn test_wrong_algorithm_family() {
        let doc = DOC.replace(
            "[algorithms.db_mod]\ntype = \"MOD\"\nprops = { sharding-count = \"2\" }",
            "[algorithms.db_mod]\ntype = \"HINT_INLINE\"\nprops = { algorithm-expression = \"ds_${value}\" }",
        );
        let e = ShardingRuleConfig::from_toml_str(&doc).unwrap().build().unwrap_err();
        assert!(e.is_configuration());
        assert!(e.to_string().contains("standard strategy cannot use hint algorithm"));
    }

    #[test]
    fn test_binding_mismatch_rejected_at_load() {
        let doc = DOC.replace("t_order_item_${0..1}", "t_order_item_${0..2}");
        let e = ShardingRuleConfig::from_toml_str(&doc).unwrap().build().unwrap_err();
        assert!(e.to_string().contains("Binding group"));
    }

    #[test]
    fn test_strategy_tags_round_trip() {
        let cfg = ShardingRuleConfig::from_toml_str(DOC).unwrap();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(ShardingRuleConfig::from_toml_str(&text).unwrap(), cfg);
        let e = ShardingRuleConfig::from_toml_str("data_sources = 3").unwrap_err();
        assert!(e.is_configuration());
    }
}

//! Sharding rule model: logic tables and their data nodes, strategies and
//! algorithms, binding and broadcast tables, and the swappable rule
//! snapshot shared by routing.

pub mod algorithm;
pub mod binding;
pub mod config;
pub mod data_node;
pub mod inline;
pub mod key_gen;
pub mod registry;
pub mod rule;
pub mod strategy;
pub mod table_rule;
pub mod value;

pub use config::{KeyGenerateConfig, ShardingRuleConfig, StrategyConfig, TableRuleConfig};
pub use data_node::DataNode;
pub use registry::{RuleRegistry, RuleSnapshot};
pub use rule::{ShardingRule, ShardingRuleBuilder};
pub use strategy::ShardingStrategy;
pub use table_rule::{KeyGenerateSpec, TableRule};
pub use value::{ColumnShardingValue, ShardingValue, ValueRange};

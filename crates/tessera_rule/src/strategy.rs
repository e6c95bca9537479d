use std::sync::Arc;

use tessera_common::datum::Datum;
use tessera_common::error::{RouteError, TesseraResult};

use crate::algorithm::{
    ComplexShardingAlgorithm, HintShardingAlgorithm, StandardShardingAlgorithm,
};
use crate::value::{ColumnShardingValue, ShardingValue};

/// How one dimension (database or table) of a logic table is sharded.
#[derive(Debug, Clone)]
pub enum ShardingStrategy {
    Standard {
        column: String,
        algorithm: Arc<dyn StandardShardingAlgorithm>,
    },
    Complex {
        columns: Vec<String>,
        algorithm: Arc<dyn ComplexShardingAlgorithm>,
    },
    Hint {
        algorithm: Arc<dyn HintShardingAlgorithm>,
    },
    None,
}

impl ShardingStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            ShardingStrategy::Standard { .. } => "standard",
            ShardingStrategy::Complex { .. } => "complex",
            ShardingStrategy::Hint { .. } => "hint",
            ShardingStrategy::None => "none",
        }
    }

    pub fn sharding_columns(&self) -> Vec<&str> {
        match self {
            ShardingStrategy::Standard { column, .. } => vec![column.as_str()],
            ShardingStrategy::Complex { columns, .. } => columns.iter().map(String::as_str).collect(),
            ShardingStrategy::Hint { .. } | ShardingStrategy::None => Vec::new(),
        }
    }

    pub fn uses_column(&self, column: &str) -> bool {
        self.sharding_columns()
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn is_hint(&self) -> bool {
        matches!(self, ShardingStrategy::Hint { .. })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ShardingStrategy::None)
    }

    /// Route by condition values. `values` may hold columns this strategy
    /// does not use; they are ignored. Without a usable value every target
    /// is returned. The result preserves the order of `targets`.
    pub fn do_sharding(
        &self,
        targets: &[String],
        logic_table: &str,
        values: &[ColumnShardingValue<'_>],
    ) -> TesseraResult<Vec<String>> {
        let picked = match self {
            ShardingStrategy::Standard { column, algorithm } => {
                let Some(v) = values
                    .iter()
                    .find(|v| v.column.eq_ignore_ascii_case(column))
                else {
                    return Ok(targets.to_vec());
                };
                match v.value {
                    ShardingValue::List(list) => {
                        let mut picked = Vec::with_capacity(list.len());
                        for datum in list {
                            match algorithm.shard_precise(targets, logic_table, column, datum)? {
                                Some(t) => picked.push(t),
                                None => {
                                    return Err(RouteError::NoDataNode {
                                        table: logic_table.to_string(),
                                        value: datum.to_string(),
                                    }
                                    .into())
                                }
                            }
                        }
                        picked
                    }
                    ShardingValue::Range(range) => {
                        algorithm.shard_range(targets, logic_table, column, range)?
                    }
                }
            }
            ShardingStrategy::Complex { columns, algorithm } => {
                let used: Vec<ColumnShardingValue<'_>> = values
                    .iter()
                    .filter(|v| columns.iter().any(|c| c.eq_ignore_ascii_case(v.column)))
                    .copied()
                    .collect();
                if used.is_empty() {
                    return Ok(targets.to_vec());
                }
                let picked = algorithm.shard(targets, &used)?;
                if picked.is_empty() {
                    let shown: Vec<String> = used
                        .iter()
                        .map(|v| format!("{}={}", v.column, v.value))
                        .collect();
                    return Err(RouteError::NoDataNode {
                        table: logic_table.to_string(),
                        value: shown.join(", "),
                    }
                    .into());
                }
                picked
            }
            ShardingStrategy::Hint { .. } | ShardingStrategy::None => return Ok(targets.to_vec()),
        };
        Ok(in_target_order(targets, &picked))
    }

    /// Route by hint values. Non-hint strategies ignore hints and return
    /// every target.
    pub fn do_hint_sharding(
        &self,
        targets: &[String],
        logic_table: &str,
        values: &[Datum],
    ) -> TesseraResult<Vec<String>> {
        match self {
            ShardingStrategy::Hint { algorithm } => {
                if values.is_empty() {
                    return Ok(targets.to_vec());
                }
                let picked = algorithm.shard(targets, logic_table, values)?;
                if picked.is_empty() {
                    let shown: Vec<String> = values.iter().map(|d| d.to_string()).collect();
                    return Err(RouteError::NoDataNode {
                        table: logic_table.to_string(),
                        value: shown.join(", "),
                    }
                    .into());
                }
                Ok(in_target_order(targets, &picked))
            }
            _ => Ok(targets.to_vec()),
        }
    }
}

/// Deduplicate `picked` and order it like `targets`; names outside
/// `targets` are dropped.
fn in_target_order(targets: &[String], picked: &[String]) -> Vec<String> {
    targets
        .iter()
        .filter(|t| picked.iter().any(|p| p.eq_ignore_ascii_case(t)))
        .cloned()
        .collect()
}

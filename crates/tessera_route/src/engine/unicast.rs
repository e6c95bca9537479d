use indexmap::IndexSet;
use tessera_common::error::{RouteError, TesseraError, TesseraResult};
use tessera_rule::ShardingRule;

use super::{RouteEngine, RouteEngineKind};
use crate::context::{RouteContext, RouteMapper, RouteUnit};

/// Routes to exactly one data source: the first candidate in
/// configuration order.
pub struct UnicastEngine {
    logic_tables: Vec<String>,
}

impl UnicastEngine {
    pub fn new(logic_tables: &[String]) -> Self {
        Self {
            logic_tables: logic_tables.to_vec(),
        }
    }
}

impl RouteEngine for UnicastEngine {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::Unicast
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        let sharding = rule.sharding_logic_table_names(&self.logic_tables);
        let unit = match sharding.as_slice() {
            [] => {
                let ds = rule.data_source_names().first().ok_or_else(|| {
                    TesseraError::internal_bug(
                        "E-ROUTE-003",
                        "unicast routing with no data source",
                        format!("tables={:?}", self.logic_tables),
                    )
                })?;
                RouteUnit::database(ds)
            }
            [table] => {
                let node = rule
                    .find_table_rule(table)
                    .and_then(|t| t.actual_data_nodes().first())
                    .ok_or_else(|| RouteError::NoDataNode {
                        table: table.clone(),
                        value: String::new(),
                    })?;
                RouteUnit::new(
                    RouteMapper::identity(node.data_source.clone()),
                    vec![RouteMapper::new(table.clone(), node.table.clone())],
                )
            }
            tables => co_located_unit(rule, tables)?,
        };
        Ok([unit].into_iter().collect())
    }
}

/// First data source hosting every one of `tables`, each table mapped to
/// its first actual table there.
fn co_located_unit(rule: &ShardingRule, tables: &[String]) -> TesseraResult<RouteUnit> {
    let mut common: Option<IndexSet<String>> = None;
    for table in tables {
        let hosted: IndexSet<String> = rule
            .find_table_rule(table)
            .map(|t| t.actual_data_source_names().into_iter().collect())
            .unwrap_or_default();
        common = Some(match common {
            None => hosted,
            Some(acc) => acc.intersection(&hosted).cloned().collect(),
        });
    }
    let common = common.unwrap_or_default();
    let ds = rule
        .data_source_names()
        .iter()
        .find(|ds| common.contains(*ds))
        .ok_or_else(|| {
            RouteError::UnsupportedStatement(format!(
                "tables {} share no data source for single-shard routing",
                tables.join(", ")
            ))
        })?;

    let mut mappers = Vec::with_capacity(tables.len());
    for table in tables {
        let actual = rule
            .find_table_rule(table)
            .and_then(|t| t.actual_table_names(ds).into_iter().next())
            .ok_or_else(|| {
                TesseraError::internal_bug(
                    "E-ROUTE-004",
                    format!("table {table} has no actual table on {ds}"),
                    format!("tables={tables:?}"),
                )
            })?;
        mappers.push(RouteMapper::new(table.clone(), actual));
    }
    Ok(RouteUnit::new(RouteMapper::identity(ds.clone()), mappers))
}

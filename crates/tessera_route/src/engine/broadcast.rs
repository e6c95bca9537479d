use tessera_common::error::TesseraResult;
use tessera_rule::ShardingRule;

use super::standard::route_with_binding;
use super::{RouteEngine, RouteEngineKind};
use crate::condition::ShardingConditions;
use crate::context::{RouteContext, RouteMapper, RouteUnit};

/// One unit per configured data source, without table mappers.
#[derive(Debug, Default)]
pub struct DatabaseBroadcastEngine;

impl RouteEngine for DatabaseBroadcastEngine {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::DatabaseBroadcast
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        Ok(rule
            .data_source_names()
            .iter()
            .map(|ds| RouteUnit::database(ds))
            .collect())
    }
}

/// Every data node of the statement's configured tables.
pub struct TableBroadcastEngine {
    logic_tables: Vec<String>,
}

impl TableBroadcastEngine {
    pub fn new(logic_tables: &[String]) -> Self {
        Self {
            logic_tables: logic_tables.to_vec(),
        }
    }
}

impl RouteEngine for TableBroadcastEngine {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::TableBroadcast
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        let sharding = rule.sharding_logic_table_names(&self.logic_tables);
        let mut ctx = RouteContext::new();
        if sharding.is_empty() {
            for table in self.logic_tables.iter().filter(|t| rule.is_broadcast_table(t)) {
                for ds in rule.data_source_names() {
                    ctx.add_unit(RouteUnit::new(
                        RouteMapper::identity(ds.clone()),
                        vec![RouteMapper::identity(table.clone())],
                    ));
                }
            }
            return Ok(ctx);
        }
        let none = ShardingConditions::empty();
        if sharding.len() > 1 && rule.is_all_binding_tables(&sharding) {
            let (units, _) = route_with_binding(rule, &sharding[0], &sharding[1..], &none, None)?;
            ctx.extend(units);
            return Ok(ctx);
        }
        for table in &sharding {
            let (units, _) = route_with_binding(rule, table, &[], &none, None)?;
            ctx.extend(units);
        }
        Ok(ctx)
    }
}

//! Engine selection.
//!
//! [`classify`] is a pure function of the statement shape, the rule shape,
//! the extracted conditions and the hint; [`build_engine`] turns the chosen
//! kind into a concrete engine over the same inputs.

use tessera_common::config::CartesianPolicy;
use tessera_common::error::{TesseraError, TesseraResult};
use tessera_rule::ShardingRule;
use tessera_sql::{DalKind, StatementKind};

use crate::condition::ShardingConditions;
use crate::engine::{
    ComplexEngine, DatabaseBroadcastEngine, DatabaseHintEngine, HintEngine, IgnoreEngine,
    RouteEngine, RouteEngineKind, StandardEngine, TableBroadcastEngine, UnicastEngine,
};
use crate::hint::HintContext;
use crate::statement_context::StatementContext;

pub fn classify(
    rule: &ShardingRule,
    ctx: &StatementContext,
    conditions: &ShardingConditions,
    hint: Option<&HintContext>,
) -> RouteEngineKind {
    let tables = ctx.table_names();
    let configured = |t: &String| rule.is_sharding_table(t) || rule.is_broadcast_table(t);
    match ctx.statement().kind {
        StatementKind::Tcl => RouteEngineKind::DatabaseBroadcast,
        StatementKind::Ddl(_) => {
            if tables.is_empty() {
                RouteEngineKind::DatabaseBroadcast
            } else if !tables.iter().any(configured) {
                RouteEngineKind::Ignore
            } else {
                RouteEngineKind::TableBroadcast
            }
        }
        StatementKind::Dal(DalKind::Use) => RouteEngineKind::Ignore,
        StatementKind::Dal(DalKind::Set | DalKind::ShowDatabases) => {
            RouteEngineKind::DatabaseBroadcast
        }
        StatementKind::Dal(_) => RouteEngineKind::Unicast,
        StatementKind::Dcl => {
            if tables.len() == 1 && configured(&tables[0]) {
                RouteEngineKind::TableBroadcast
            } else {
                RouteEngineKind::DatabaseBroadcast
            }
        }
        kind @ (StatementKind::Select
        | StatementKind::Insert
        | StatementKind::Update
        | StatementKind::Delete) => classify_dml(rule, tables, kind, conditions, hint),
    }
}

fn classify_dml(
    rule: &ShardingRule,
    tables: &[String],
    kind: StatementKind,
    conditions: &ShardingConditions,
    hint: Option<&HintContext>,
) -> RouteEngineKind {
    let sharding = rule.sharding_logic_table_names(tables);
    if let Some(hint) = hint {
        if hint.database_only_target().is_some() {
            return RouteEngineKind::DatabaseHint;
        }
        if sharding.iter().any(|t| hint.has_table(t)) {
            return RouteEngineKind::Hint;
        }
    }
    if !tables.is_empty() && rule.is_all_broadcast_tables(tables) {
        return if kind.is_query() {
            RouteEngineKind::Unicast
        } else {
            RouteEngineKind::DatabaseBroadcast
        };
    }
    if tables.is_empty() || (kind.is_dml() && conditions.is_always_false()) {
        return RouteEngineKind::Unicast;
    }
    if sharding.is_empty() {
        return RouteEngineKind::Unicast;
    }
    if sharding.len() == 1 || rule.is_all_binding_tables(&sharding) {
        RouteEngineKind::Standard
    } else {
        RouteEngineKind::Complex
    }
}

/// Concrete engine for `kind`. Condition-driven engines see only the
/// statement's sharding tables; the others see every statement table.
pub fn build_engine<'a>(
    kind: RouteEngineKind,
    rule: &ShardingRule,
    ctx: &StatementContext,
    conditions: &'a ShardingConditions,
    hint: Option<&'a HintContext>,
    policy: CartesianPolicy,
) -> TesseraResult<Box<dyn RouteEngine + 'a>> {
    let tables = ctx.table_names();
    let sharding = rule.sharding_logic_table_names(tables);
    let engine: Box<dyn RouteEngine + 'a> = match kind {
        RouteEngineKind::Standard => Box::new(StandardEngine::new(&sharding, conditions, hint)),
        RouteEngineKind::Complex => {
            Box::new(ComplexEngine::new(&sharding, conditions, hint, policy))
        }
        RouteEngineKind::Hint => {
            let hint = hint.ok_or_else(|| missing_hint(kind, tables))?;
            Box::new(HintEngine::new(&sharding, conditions, hint, policy))
        }
        RouteEngineKind::DatabaseHint => {
            let target = hint
                .and_then(HintContext::database_only_target)
                .ok_or_else(|| missing_hint(kind, tables))?;
            Box::new(DatabaseHintEngine::new(target))
        }
        RouteEngineKind::DatabaseBroadcast => Box::new(DatabaseBroadcastEngine),
        RouteEngineKind::TableBroadcast => Box::new(TableBroadcastEngine::new(tables)),
        RouteEngineKind::Unicast => Box::new(UnicastEngine::new(tables)),
        RouteEngineKind::Ignore => Box::new(IgnoreEngine),
    };
    Ok(engine)
}

fn missing_hint(kind: RouteEngineKind, tables: &[String]) -> TesseraError {
    TesseraError::internal_bug(
        "E-ROUTE-005",
        format!("{kind} engine selected without a hint context"),
        format!("tables={tables:?}"),
    )
}

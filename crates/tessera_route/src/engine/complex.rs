use tessera_common::config::CartesianPolicy;
use tessera_common::error::{RouteError, TesseraResult};
use tessera_rule::ShardingRule;

use super::standard::route_with_binding;
use super::{RouteEngine, RouteEngineKind};
use crate::condition::ShardingConditions;
use crate::context::{RouteContext, RouteMapper, RouteUnit};
use crate::hint::HintContext;

/// Routes each independently sharded table (with its bound tables) on its
/// own, then combines the per-table units that share a data source.
pub struct ComplexEngine<'a> {
    logic_tables: Vec<String>,
    conditions: &'a ShardingConditions,
    hint: Option<&'a HintContext>,
    policy: CartesianPolicy,
}

impl<'a> ComplexEngine<'a> {
    pub fn new(
        logic_tables: &[String],
        conditions: &'a ShardingConditions,
        hint: Option<&'a HintContext>,
        policy: CartesianPolicy,
    ) -> Self {
        Self {
            logic_tables: logic_tables.to_vec(),
            conditions,
            hint,
            policy,
        }
    }
}

impl RouteEngine for ComplexEngine<'_> {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::Complex
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        let mut routed: Vec<Vec<RouteUnit>> = Vec::new();
        let mut covered: Vec<&str> = Vec::new();
        for table in &self.logic_tables {
            if covered.iter().any(|c| c.eq_ignore_ascii_case(table)) {
                continue;
            }
            let bound: Vec<String> = match rule.find_binding_group(table) {
                Some(group) => self
                    .logic_tables
                    .iter()
                    .filter(|t| !t.eq_ignore_ascii_case(table) && group.contains(t))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            covered.push(table);
            covered.extend(
                self.logic_tables
                    .iter()
                    .filter(|t| bound.contains(t))
                    .map(String::as_str),
            );
            let (units, _) = route_with_binding(rule, table, &bound, self.conditions, self.hint)?;
            routed.push(units);
        }

        if routed.len() == 1 {
            return Ok(routed.remove(0).into_iter().collect());
        }
        cartesian(rule, &routed, self.policy, &self.logic_tables)
    }
}

/// Combine one unit from every group when all of them sit on the same data
/// source. Combinations across data sources are dropped (`Narrow`) or
/// rejected (`Reject`).
fn cartesian(
    rule: &ShardingRule,
    groups: &[Vec<RouteUnit>],
    policy: CartesianPolicy,
    logic_tables: &[String],
) -> TesseraResult<RouteContext> {
    let total: usize = groups
        .iter()
        .map(Vec::len)
        .fold(1usize, |acc, n| acc.saturating_mul(n));
    let mut ctx = RouteContext::new();
    let mut kept = 0usize;

    for ds in rule.data_source_names() {
        let per_group: Vec<Vec<&RouteUnit>> = groups
            .iter()
            .map(|units| units.iter().filter(|u| u.data_source() == ds).collect())
            .collect();
        if per_group.iter().any(Vec::is_empty) {
            continue;
        }
        let mut combos: Vec<Vec<RouteMapper>> = vec![Vec::new()];
        for units in &per_group {
            let mut next = Vec::with_capacity(combos.len() * units.len());
            for prefix in &combos {
                for unit in units {
                    let mut mappers = prefix.clone();
                    mappers.extend(unit.table_mappers.iter().cloned());
                    next.push(mappers);
                }
            }
            combos = next;
        }
        kept += combos.len();
        for mappers in combos {
            ctx.add_unit(RouteUnit::new(RouteMapper::identity(ds.clone()), mappers));
        }
    }

    let discarded = total.saturating_sub(kept);
    if kept == 0 {
        return Err(RouteError::CrossDataSourceJoin {
            detail: format!("no data source hosts all of {}", logic_tables.join(", ")),
        }
        .into());
    }
    if discarded > 0 {
        match policy {
            CartesianPolicy::Reject => {
                return Err(RouteError::CrossDataSourceJoin {
                    detail: format!(
                        "{discarded} of {total} combinations of {} span data sources",
                        logic_tables.join(", ")
                    ),
                }
                .into());
            }
            CartesianPolicy::Narrow => {
                tracing::warn!(
                    tables = %logic_tables.join(","),
                    discarded,
                    total,
                    "cartesian route narrowed to co-located combinations"
                );
                tessera_observability::record_cartesian_discarded(discarded);
            }
        }
    }
    ctx.set_discarded_combinations(discarded);
    Ok(ctx)
}

use indexmap::IndexSet;
use tessera_common::datum::Datum;
use tessera_common::error::{RouteError, TesseraError, TesseraResult};
use tessera_rule::{
    ColumnShardingValue, DataNode, ShardingRule, ShardingStrategy, ShardingValue, TableRule,
};

use super::{RouteEngine, RouteEngineKind};
use crate::condition::{ShardingCondition, ShardingConditions};
use crate::context::{RouteContext, RouteMapper, RouteUnit};
use crate::hint::{HintContext, TableHint};

/// Routes one sharding table; tables bound with it follow by ordinal.
pub struct StandardEngine<'a> {
    primary: String,
    bound: Vec<String>,
    conditions: &'a ShardingConditions,
    hint: Option<&'a HintContext>,
}

impl<'a> StandardEngine<'a> {
    /// `logic_tables` are the statement's sharding tables: either exactly
    /// one, or all members of one binding group. The first is the primary.
    pub fn new(
        logic_tables: &[String],
        conditions: &'a ShardingConditions,
        hint: Option<&'a HintContext>,
    ) -> Self {
        let (primary, bound) = match logic_tables.split_first() {
            Some((p, rest)) => (p.clone(), rest.to_vec()),
            None => (String::new(), Vec::new()),
        };
        Self {
            primary,
            bound,
            conditions,
            hint,
        }
    }
}

impl RouteEngine for StandardEngine<'_> {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::Standard
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        let (units, per_condition) =
            route_with_binding(rule, &self.primary, &self.bound, self.conditions, self.hint)?;
        let mut ctx: RouteContext = units.into_iter().collect();
        ctx.set_original_data_nodes(per_condition);
        Ok(ctx)
    }
}

/// Route `primary` and derive the actual tables of `bound` for every data
/// node. Returns the units and the data nodes consulted per condition.
pub(crate) fn route_with_binding(
    rule: &ShardingRule,
    primary: &str,
    bound: &[String],
    conditions: &ShardingConditions,
    hint: Option<&HintContext>,
) -> TesseraResult<(Vec<RouteUnit>, Vec<Vec<DataNode>>)> {
    let table_rule = rule.find_table_rule(primary).ok_or_else(|| {
        TesseraError::internal_bug(
            "E-ROUTE-002",
            format!("standard routing of unconfigured table {primary}"),
            format!("bound={bound:?}"),
        )
    })?;
    let table_hint = hint.and_then(|h| h.table(primary));

    let mut per_condition = Vec::with_capacity(conditions.len());
    let mut nodes: IndexSet<DataNode> = IndexSet::new();
    if conditions.is_empty() {
        nodes.extend(route_condition(rule, table_rule, None, table_hint)?);
    } else {
        for condition in conditions.conditions() {
            let routed = route_condition(rule, table_rule, Some(condition), table_hint)?;
            nodes.extend(routed.iter().cloned());
            per_condition.push(routed);
        }
    }

    let mut units = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mut mappers = vec![RouteMapper::new(table_rule.logic_table(), node.table.clone())];
        if !bound.is_empty() {
            let derived = rule.logic_and_actual_tables_from_binding_table(
                &node.data_source,
                table_rule.logic_table(),
                &node.table,
                bound,
            )?;
            mappers.extend(derived.into_iter().map(|(l, a)| RouteMapper::new(l, a)));
        }
        units.push(RouteUnit::new(
            RouteMapper::identity(node.data_source.clone()),
            mappers,
        ));
    }
    Ok((units, per_condition))
}

/// Data nodes of one table for one condition (or no condition).
pub(crate) fn route_condition(
    rule: &ShardingRule,
    table_rule: &TableRule,
    condition: Option<&ShardingCondition>,
    hint: Option<&TableHint>,
) -> TesseraResult<Vec<DataNode>> {
    let logic_table = table_rule.logic_table();
    let values: Vec<ColumnShardingValue<'_>> = condition
        .map(|c| c.column_values(rule, logic_table))
        .unwrap_or_default();

    let data_sources = route_dimension(
        rule.database_strategy(table_rule),
        &table_rule.actual_data_source_names(),
        logic_table,
        &values,
        hint.map(|h| h.database_values.as_slice()),
    )?;
    let mut nodes = Vec::new();
    for ds in &data_sources {
        let tables = route_dimension(
            rule.table_strategy(table_rule),
            &table_rule.actual_table_names(ds),
            logic_table,
            &values,
            hint.map(|h| h.table_values.as_slice()),
        )?;
        nodes.extend(tables.into_iter().map(|t| DataNode::new(ds.clone(), t)));
    }
    if nodes.is_empty() {
        let shown: Vec<String> = values
            .iter()
            .map(|v| format!("{}={}", v.column, v.value))
            .collect();
        return Err(RouteError::NoDataNode {
            table: logic_table.to_string(),
            value: shown.join(", "),
        }
        .into());
    }
    Ok(nodes)
}

/// Targets of one dimension (data sources or tables). Hint values win
/// over condition values; for a non-hint strategy they are treated as
/// precise values of its sharding columns.
fn route_dimension(
    strategy: &ShardingStrategy,
    targets: &[String],
    logic_table: &str,
    values: &[ColumnShardingValue<'_>],
    hint_values: Option<&[Datum]>,
) -> TesseraResult<Vec<String>> {
    match hint_values.filter(|v| !v.is_empty()) {
        Some(forced) if strategy.is_hint() => {
            strategy.do_hint_sharding(targets, logic_table, forced)
        }
        Some(forced) => {
            let value = ShardingValue::List(forced.to_vec());
            let columns = strategy.sharding_columns();
            let forced_values: Vec<ColumnShardingValue<'_>> = columns
                .iter()
                .map(|column| ColumnShardingValue {
                    logic_table,
                    column: *column,
                    value: &value,
                })
                .collect();
            strategy.do_sharding(targets, logic_table, &forced_values)
        }
        None if strategy.is_hint() => strategy.do_hint_sharding(targets, logic_table, &[]),
        None => strategy.do_sharding(targets, logic_table, values),
    }
}

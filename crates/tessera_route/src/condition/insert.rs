use tessera_common::datum::Datum;
use tessera_rule::{ShardingRule, ShardingValue};
use tessera_sql::BoundExpr;

use super::{ShardingCondition, ShardingConditionValue, ShardingConditions};
use crate::statement_context::StatementContext;

/// One condition per VALUES row, in row order, even when a row supplies
/// no sharding value.
pub(super) fn extract(rule: &ShardingRule, ctx: &StatementContext) -> ShardingConditions {
    let Some(insert) = ctx.statement().insert.as_ref() else {
        return ShardingConditions::empty();
    };
    let Some(table_rule) = rule.find_table_rule(&insert.table) else {
        return ShardingConditions::empty();
    };
    let mut columns: Vec<&str> = rule.database_strategy(table_rule).sharding_columns();
    for c in rule.table_strategy(table_rule).sharding_columns() {
        if !columns.iter().any(|x| x.eq_ignore_ascii_case(c)) {
            columns.push(c);
        }
    }
    let generated = ctx
        .generated_keys()
        .filter(|k| k.logic_table.eq_ignore_ascii_case(&insert.table));

    let mut conditions = Vec::with_capacity(insert.rows.len());
    for (row_index, row) in insert.rows.iter().enumerate() {
        let mut condition = ShardingCondition::default();
        for column in &columns {
            let resolved = match insert.column_index(column) {
                Some(i) => row.get(i).and_then(|expr| resolve(ctx, expr)),
                None => generated
                    .filter(|k| k.column.eq_ignore_ascii_case(column))
                    .and_then(|k| k.values.get(row_index))
                    .map(|d| (d.clone(), Vec::new())),
            };
            let Some((datum, params)) = resolved else {
                continue;
            };
            condition.values.push(ShardingConditionValue {
                logic_table: table_rule.logic_table().to_string(),
                column: column.to_string(),
                value: ShardingValue::List(vec![datum]),
                param_indexes: params,
            });
        }
        conditions.push(condition);
    }
    ShardingConditions::new(conditions)
}

fn resolve(ctx: &StatementContext, expr: &BoundExpr) -> Option<(Datum, Vec<usize>)> {
    let (datum, params) = match expr {
        BoundExpr::Literal(d) => (d.clone(), Vec::new()),
        BoundExpr::Param(i) => (ctx.parameter(*i)?.clone(), vec![*i]),
        _ => return None,
    };
    (!datum.is_null()).then_some((datum, params))
}

use tessera_rule::{ShardingRule, ShardingValue};
use tessera_sql::{BoundExpr, StatementKind};

use super::{ConditionExtractor, ShardingCondition, ShardingConditionValue, ShardingConditions};
use crate::statement_context::StatementContext;

/// What an UPDATE SET clause assigns to sharding columns.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentValues {
    /// No sharding column is assigned.
    NotAssigned,
    /// A sharding column is assigned a value that cannot be resolved (a
    /// parameter past the supplied list, or a computed expression).
    Unknown,
    Assigned(Vec<ShardingConditionValue>),
}

impl AssignmentValues {
    /// Conditions for the post-update row: each WHERE condition with the
    /// assigned columns overridden. Empty when the values are not known.
    pub fn merge_into(&self, where_conditions: &ShardingConditions) -> ShardingConditions {
        let AssignmentValues::Assigned(assigned) = self else {
            return ShardingConditions::empty();
        };
        let base: Vec<ShardingCondition> = if where_conditions.is_empty() {
            vec![ShardingCondition::default()]
        } else {
            where_conditions.conditions().to_vec()
        };
        let merged = base
            .into_iter()
            .map(|mut condition| {
                condition.values.retain(|v| {
                    !assigned.iter().any(|a| {
                        a.logic_table.eq_ignore_ascii_case(&v.logic_table)
                            && a.column.eq_ignore_ascii_case(&v.column)
                    })
                });
                condition.values.extend(assigned.iter().cloned());
                condition
            })
            .collect();
        ShardingConditions::new(merged)
    }
}

pub(super) fn extract(rule: &ShardingRule, ctx: &StatementContext) -> AssignmentValues {
    let statement = ctx.statement();
    if statement.kind != StatementKind::Update {
        return AssignmentValues::NotAssigned;
    }
    let mut values = Vec::new();
    for assignment in &statement.assignments {
        let tables = ConditionExtractor::tables_for_column(
            rule,
            ctx,
            assignment.column.owner.as_deref(),
            &assignment.column.name,
        );
        if tables.is_empty() {
            continue;
        }
        let (datum, params) = match &assignment.value {
            BoundExpr::Literal(d) => (d.clone(), Vec::new()),
            BoundExpr::Param(i) => match ctx.parameter(*i) {
                Some(d) => (d.clone(), vec![*i]),
                None => {
                    tracing::debug!(
                        column = %assignment.column.name,
                        index = i,
                        supplied = ctx.parameters().len(),
                        "SET parameter out of range; sharding key update cannot be checked"
                    );
                    return AssignmentValues::Unknown;
                }
            },
            _ => return AssignmentValues::Unknown,
        };
        if datum.is_null() {
            return AssignmentValues::Unknown;
        }
        for table in tables {
            values.push(ShardingConditionValue {
                logic_table: table,
                column: assignment.column.name.clone(),
                value: ShardingValue::List(vec![datum.clone()]),
                param_indexes: params.clone(),
            });
        }
    }
    if values.is_empty() {
        AssignmentValues::NotAssigned
    } else {
        AssignmentValues::Assigned(values)
    }
}

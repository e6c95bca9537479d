//! Sharding conditions: the sharding column values a statement supplies.
//!
//! A statement yields one [`ShardingCondition`] per VALUES row (INSERT) or
//! per disjunct of its WHERE clause (SELECT / UPDATE / DELETE). Each
//! condition is routed on its own and the results are unioned, so a
//! condition without values for a column simply leaves that column
//! unconstrained.

mod assignment;
mod insert;
mod predicate;

use serde::Serialize;
use tessera_rule::{ColumnShardingValue, ShardingRule, ShardingValue};
use tessera_sql::StatementKind;

use crate::statement_context::StatementContext;

pub use assignment::AssignmentValues;

/// Values supplied for one sharding column of one logic table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardingConditionValue {
    pub logic_table: String,
    pub column: String,
    pub value: ShardingValue,
    /// Parameter ordinals the values were bound from.
    pub param_indexes: Vec<usize>,
}

/// Conjunction of column values for one row or one predicate branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShardingCondition {
    pub values: Vec<ShardingConditionValue>,
}

impl ShardingCondition {
    /// Values usable when routing `logic_table`: its own values plus those
    /// of tables bound with it.
    pub fn column_values<'a>(
        &'a self,
        rule: &ShardingRule,
        logic_table: &str,
    ) -> Vec<ColumnShardingValue<'a>> {
        let group = rule.find_binding_group(logic_table);
        self.values
            .iter()
            .filter(|v| {
                v.logic_table.eq_ignore_ascii_case(logic_table)
                    || group.is_some_and(|g| g.contains(&v.logic_table))
            })
            .map(|v| ColumnShardingValue {
                logic_table: &v.logic_table,
                column: &v.column,
                value: &v.value,
            })
            .collect()
    }

    pub fn find(&self, logic_table: &str, column: &str) -> Option<&ShardingConditionValue> {
        self.values.iter().find(|v| {
            v.logic_table.eq_ignore_ascii_case(logic_table) && v.column.eq_ignore_ascii_case(column)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShardingConditions {
    conditions: Vec<ShardingCondition>,
    always_false: bool,
}

impl ShardingConditions {
    pub fn new(conditions: Vec<ShardingCondition>) -> Self {
        Self {
            conditions,
            always_false: false,
        }
    }

    /// No condition: every table routes to all of its data nodes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The predicate can never hold.
    pub fn always_false() -> Self {
        Self {
            conditions: Vec::new(),
            always_false: true,
        }
    }

    /// One unconstrained condition per original condition. INSERT rows
    /// keep their slots, so routing them still records per-row nodes.
    pub fn without_values(&self) -> Self {
        Self::new(vec![ShardingCondition::default(); self.conditions.len()])
    }

    pub fn is_always_false(&self) -> bool {
        self.always_false
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[ShardingCondition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

/// Extracts sharding conditions from a prepared statement.
pub struct ConditionExtractor<'a> {
    rule: &'a ShardingRule,
    ctx: &'a StatementContext,
    max_branches: usize,
}

impl<'a> ConditionExtractor<'a> {
    pub fn new(rule: &'a ShardingRule, ctx: &'a StatementContext, max_branches: usize) -> Self {
        Self {
            rule,
            ctx,
            max_branches,
        }
    }

    pub fn extract(&self) -> ShardingConditions {
        let statement = self.ctx.statement();
        match statement.kind {
            StatementKind::Insert => insert::extract(self.rule, self.ctx),
            StatementKind::Select | StatementKind::Update | StatementKind::Delete => {
                match &statement.where_clause {
                    Some(predicate) => {
                        predicate::extract(self.rule, self.ctx, predicate, self.max_branches)
                    }
                    None => ShardingConditions::empty(),
                }
            }
            _ => ShardingConditions::empty(),
        }
    }

    /// Sharding column values assigned by an UPDATE SET clause.
    pub fn extract_assignments(&self) -> AssignmentValues {
        assignment::extract(self.rule, self.ctx)
    }

    /// Sharding tables of the statement whose strategies use `column`;
    /// an `owner` (alias or table name) narrows to that table.
    pub(crate) fn tables_for_column(
        rule: &ShardingRule,
        ctx: &StatementContext,
        owner: Option<&str>,
        column: &str,
    ) -> Vec<String> {
        match owner {
            Some(owner) => ctx
                .statement()
                .resolve_owner(owner)
                .filter(|t| rule.is_sharding_column(column, t))
                .map(|t| vec![t.to_string()])
                .unwrap_or_default(),
            None => ctx
                .table_names()
                .iter()
                .filter(|t| rule.is_sharding_column(column, t))
                .cloned()
                .collect(),
        }
    }
}

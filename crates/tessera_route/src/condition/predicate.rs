//! WHERE clause extraction.
//!
//! The predicate is expanded into disjunctive normal form over the
//! comparisons that constrain a sharding column. Anything else (NOT, `!=`,
//! `NOT IN`, column-to-column comparisons, unresolvable parameters) counts
//! as "no constraint", which widens routing but never narrows it wrongly.

use indexmap::IndexMap;
use tessera_common::datum::Datum;
use tessera_rule::{ShardingRule, ShardingValue, ValueRange};
use tessera_sql::{BoundExpr, ColumnRef, CompareOp};

use super::{ConditionExtractor, ShardingCondition, ShardingConditionValue, ShardingConditions};
use crate::statement_context::StatementContext;

#[derive(Debug, Clone)]
struct Atom {
    table: String,
    column: String,
    value: ShardingValue,
    params: Vec<usize>,
}

/// A conjunction of atoms; empty means unconstrained.
type Branch = Vec<Atom>;

struct Walker<'a> {
    rule: &'a ShardingRule,
    ctx: &'a StatementContext,
    max_branches: usize,
}

pub(super) fn extract(
    rule: &ShardingRule,
    ctx: &StatementContext,
    predicate: &BoundExpr,
    max_branches: usize,
) -> ShardingConditions {
    let walker = Walker {
        rule,
        ctx,
        max_branches,
    };
    let Some(branches) = walker.dnf(predicate) else {
        tracing::debug!(
            max_branches,
            "predicate expands beyond the branch cap; routing without conditions"
        );
        return ShardingConditions::empty();
    };

    let mut conditions: Vec<ShardingCondition> = Vec::with_capacity(branches.len());
    let mut unconstrained = false;
    for branch in branches {
        let Some(condition) = conjoin(branch) else {
            continue;
        };
        if condition.values.is_empty() {
            unconstrained = true;
        } else if !conditions.contains(&condition) {
            conditions.push(condition);
        }
    }
    if unconstrained {
        ShardingConditions::empty()
    } else if conditions.is_empty() {
        ShardingConditions::always_false()
    } else {
        ShardingConditions::new(conditions)
    }
}

/// Intersect atoms on the same column. `None` when the conjunction can
/// never hold.
fn conjoin(branch: Branch) -> Option<ShardingCondition> {
    let mut by_column: IndexMap<(String, String), ShardingConditionValue> = IndexMap::new();
    for atom in branch {
        let key = (
            atom.table.to_ascii_lowercase(),
            atom.column.to_ascii_lowercase(),
        );
        match by_column.get_mut(&key) {
            Some(existing) => {
                existing.value = existing.value.intersect(&atom.value)?;
                existing.param_indexes.extend(atom.params);
            }
            None => {
                by_column.insert(
                    key,
                    ShardingConditionValue {
                        logic_table: atom.table,
                        column: atom.column,
                        value: atom.value,
                        param_indexes: atom.params,
                    },
                );
            }
        }
    }
    Some(ShardingCondition {
        values: by_column.into_values().collect(),
    })
}

impl Walker<'_> {
    /// `None` when the expansion exceeds the branch cap.
    fn dnf(&self, expr: &BoundExpr) -> Option<Vec<Branch>> {
        match expr {
            BoundExpr::And(items) => {
                let mut acc: Vec<Branch> = vec![Vec::new()];
                for item in items {
                    let rhs = self.dnf(item)?;
                    if acc.len().saturating_mul(rhs.len()) > self.max_branches {
                        return None;
                    }
                    let mut next = Vec::with_capacity(acc.len() * rhs.len());
                    for left in &acc {
                        for right in &rhs {
                            let mut branch = left.clone();
                            branch.extend(right.iter().cloned());
                            next.push(branch);
                        }
                    }
                    acc = next;
                }
                Some(acc)
            }
            BoundExpr::Or(items) => {
                let mut out: Vec<Branch> = Vec::new();
                for item in items {
                    let branches = self.dnf(item)?;
                    if branches.iter().any(Vec::is_empty) {
                        return Some(vec![Vec::new()]);
                    }
                    out.extend(branches);
                    if out.len() > self.max_branches {
                        return None;
                    }
                }
                if out.is_empty() {
                    out.push(Vec::new());
                }
                Some(out)
            }
            _ => Some(vec![self.atoms(expr)]),
        }
    }

    /// Atoms contributed by a single comparison.
    fn atoms(&self, expr: &BoundExpr) -> Vec<Atom> {
        let Some((column, value, params)) = self.constraint(expr) else {
            return Vec::new();
        };
        ConditionExtractor::tables_for_column(
            self.rule,
            self.ctx,
            column.owner.as_deref(),
            &column.name,
        )
        .into_iter()
        .map(|table| Atom {
            table,
            column: column.name.clone(),
            value: value.clone(),
            params: params.clone(),
        })
        .collect()
    }

    fn constraint(&self, expr: &BoundExpr) -> Option<(ColumnRef, ShardingValue, Vec<usize>)> {
        match expr {
            BoundExpr::Compare { left, op, right } => {
                let (column, op, value) = match (left.as_ref(), right.as_ref()) {
                    (BoundExpr::Column(c), v) if v.is_value() => (c, *op, v),
                    (v, BoundExpr::Column(c)) if v.is_value() => (c, op.flip(), v),
                    _ => return None,
                };
                let (datum, params) = self.resolve(value)?;
                let value = match op {
                    CompareOp::Eq => ShardingValue::List(vec![datum]),
                    CompareOp::Lt => ShardingValue::Range(ValueRange::less_than(datum)),
                    CompareOp::LtEq => ShardingValue::Range(ValueRange::at_most(datum)),
                    CompareOp::Gt => ShardingValue::Range(ValueRange::greater_than(datum)),
                    CompareOp::GtEq => ShardingValue::Range(ValueRange::at_least(datum)),
                    CompareOp::NotEq => return None,
                };
                Some((column.clone(), value, params))
            }
            BoundExpr::InList {
                expr,
                list,
                negated: false,
            } => {
                let BoundExpr::Column(column) = expr.as_ref() else {
                    return None;
                };
                let mut values = Vec::with_capacity(list.len());
                let mut params = Vec::new();
                for item in list {
                    let (datum, p) = self.resolve(item)?;
                    if !values.contains(&datum) {
                        values.push(datum);
                    }
                    params.extend(p);
                }
                Some((column.clone(), ShardingValue::List(values), params))
            }
            BoundExpr::Between {
                expr,
                low,
                high,
                negated: false,
            } => {
                let BoundExpr::Column(column) = expr.as_ref() else {
                    return None;
                };
                let (low, mut params) = self.resolve(low)?;
                let (high, p) = self.resolve(high)?;
                params.extend(p);
                Some((
                    column.clone(),
                    ShardingValue::Range(ValueRange::closed(low, high)),
                    params,
                ))
            }
            _ => None,
        }
    }

    /// Literal or bound parameter value. NULL and out-of-range parameters
    /// resolve to nothing.
    fn resolve(&self, expr: &BoundExpr) -> Option<(Datum, Vec<usize>)> {
        let (datum, params) = match expr {
            BoundExpr::Literal(d) => (d.clone(), Vec::new()),
            BoundExpr::Param(i) => match self.ctx.parameter(*i) {
                Some(d) => (d.clone(), vec![*i]),
                None => {
                    tracing::debug!(
                        index = i,
                        supplied = self.ctx.parameters().len(),
                        "parameter marker out of range; value ignored"
                    );
                    return None;
                }
            },
            _ => return None,
        };
        (!datum.is_null()).then_some((datum, params))
    }
}

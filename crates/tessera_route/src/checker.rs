//! Rejects UPDATEs that would move a row to another shard.

use tessera_common::config::CartesianPolicy;
use tessera_common::error::{RouteError, TesseraResult};
use tessera_rule::ShardingRule;

use crate::condition::{AssignmentValues, ShardingConditions};
use crate::context::RouteContext;
use crate::dispatcher::build_engine;
use crate::engine::RouteEngineKind;
use crate::hint::HintContext;
use crate::statement_context::StatementContext;

/// Compares the route of the rows an UPDATE selects with the route of the
/// rows it would produce.
pub struct ConsistencyChecker<'a> {
    rule: &'a ShardingRule,
    ctx: &'a StatementContext,
    hint: Option<&'a HintContext>,
    policy: CartesianPolicy,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(
        rule: &'a ShardingRule,
        ctx: &'a StatementContext,
        hint: Option<&'a HintContext>,
        policy: CartesianPolicy,
    ) -> Self {
        Self {
            rule,
            ctx,
            hint,
            policy,
        }
    }

    /// `where_route` was produced by an engine of `kind` from
    /// `where_conditions`. Unknown SET values skip the check.
    pub fn check(
        &self,
        kind: RouteEngineKind,
        assignments: &AssignmentValues,
        where_conditions: &ShardingConditions,
        where_route: &RouteContext,
    ) -> TesseraResult<()> {
        let assigned = match assignments {
            AssignmentValues::NotAssigned => return Ok(()),
            AssignmentValues::Unknown => {
                tracing::debug!(
                    sql = %self.ctx.statement().sql,
                    "sharding column assigned an unknown value; skipping consistency check"
                );
                return Ok(());
            }
            AssignmentValues::Assigned(values) => values,
        };
        let set_conditions = assignments.merge_into(where_conditions);
        if set_conditions.is_empty() {
            return Ok(());
        }
        let engine = build_engine(
            kind,
            self.rule,
            self.ctx,
            &set_conditions,
            self.hint,
            self.policy,
        )?;
        let set_route = engine.route(self.rule)?;
        if where_route.same_route(&set_route) {
            return Ok(());
        }
        let (table, column) = assigned
            .first()
            .map(|v| (v.logic_table.clone(), v.column.clone()))
            .unwrap_or_default();
        tracing::debug!(
            table = %table,
            column = %column,
            where_units = where_route.len(),
            set_units = set_route.len(),
            "UPDATE relocates rows across shards"
        );
        Err(RouteError::ShardingKeyUpdate { table, column }.into())
    }
}

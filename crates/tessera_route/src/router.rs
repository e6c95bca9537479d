//! Routing facade: extraction, dispatch, engine, checks, decoration.

use std::time::Instant;

use tessera_common::config::RouterConfig;
use tessera_common::error::{RouteError, TesseraResult};
use tessera_rule::ShardingRule;
use tessera_sql::StatementKind;

use crate::checker::ConsistencyChecker;
use crate::condition::ConditionExtractor;
use crate::context::RouteContext;
use crate::dispatcher::{build_engine, classify};
use crate::engine::RouteEngineKind;
use crate::hint::HintContext;
use crate::statement_context::StatementContext;

#[derive(Debug, Clone, Default)]
pub struct ShardingRouter {
    config: RouterConfig,
}

impl ShardingRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route one prepared statement against one rule snapshot.
    pub fn route(
        &self,
        rule: &ShardingRule,
        ctx: &StatementContext,
        hint: Option<&HintContext>,
    ) -> TesseraResult<RouteContext> {
        let start = Instant::now();
        match self.do_route(rule, ctx, hint) {
            Ok(route) => {
                let engine = route.engine().map(|k| k.name()).unwrap_or("none");
                let elapsed = start.elapsed().as_micros() as u64;
                tessera_observability::record_route(engine, route.len(), elapsed);
                tracing::debug!(
                    engine,
                    units = route.len(),
                    data_sources = ?route.actual_data_source_names(),
                    duration_us = elapsed,
                    "statement routed"
                );
                Ok(route)
            }
            Err(e) => {
                tessera_observability::record_route_rejected(e.kind().as_str());
                e.log_if_fatal();
                tracing::debug!(error = %e, sql = %ctx.statement().sql, "statement rejected by router");
                Err(e)
            }
        }
    }

    fn do_route(
        &self,
        rule: &ShardingRule,
        ctx: &StatementContext,
        hint: Option<&HintContext>,
    ) -> TesseraResult<RouteContext> {
        let extractor = ConditionExtractor::new(rule, ctx, self.config.max_condition_branches);
        let conditions = extractor.extract();
        let kind = classify(rule, ctx, &conditions, hint);
        tracing::debug!(
            engine = kind.name(),
            conditions = conditions.len(),
            always_false = conditions.is_always_false(),
            "route engine selected"
        );

        let engine = build_engine(
            kind,
            rule,
            ctx,
            &conditions,
            hint,
            self.config.cartesian_policy,
        )?;
        let mut route = engine.route(rule)?;

        let statement_kind = ctx.statement().kind;
        if statement_kind == StatementKind::Insert && kind.uses_conditions() {
            check_single_node_rows(&route)?;
        }
        if statement_kind == StatementKind::Update
            && kind.uses_conditions()
            && self.config.check_sharding_key_update
        {
            let assignments = extractor.extract_assignments();
            ConsistencyChecker::new(rule, ctx, hint, self.config.cartesian_policy).check(
                kind,
                &assignments,
                &conditions,
                &route,
            )?;
        }

        // Tables the engine left unmapped keep their logic name.
        if kind != RouteEngineKind::Ignore {
            route.decorate_identity(ctx.table_names());
        }
        route.set_engine(kind);
        Ok(route)
    }
}

/// Every VALUES row of an INSERT must land on exactly one data node.
fn check_single_node_rows(route: &RouteContext) -> TesseraResult<()> {
    for (row, nodes) in route.original_data_nodes().iter().enumerate() {
        if nodes.len() > 1 {
            let shown: Vec<String> = nodes.iter().map(ToString::to_string).collect();
            return Err(RouteError::UnsupportedStatement(format!(
                "INSERT row {row} routes to multiple data nodes: {}",
                shown.join(", ")
            ))
            .into());
        }
    }
    Ok(())
}

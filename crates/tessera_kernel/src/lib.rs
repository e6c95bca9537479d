//! Statement planning facade over the sharding router and the rewriter.
//!
//! A [`ShardingKernel`] takes one bound statement, routes it against the
//! current rule snapshot, rewrites it per route unit, and hands back the
//! physical statements to execute. It never executes anything itself.

use std::sync::Arc;

use serde::Serialize;
use tessera_common::config::TesseraConfig;
use tessera_common::datum::Datum;
use tessera_common::error::{TesseraError, TesseraResult};
use tessera_rewrite::{SqlRewriteEngine, SqlRewriteResult};
use tessera_route::{
    GeneratedKeys, HintContext, RouteContext, RouteEngineKind, ShardingRouter, StatementContext,
};
use tessera_rule::{RuleRegistry, ShardingRule};
use tessera_sql::BoundStatement;

/// One physical statement bound for one data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionUnit {
    pub data_source: String,
    pub sql: String,
    pub parameters: Vec<Datum>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    /// Version of the rule snapshot the plan was built from.
    pub rule_version: u64,
    pub route_context: RouteContext,
    pub units: Vec<ExecutionUnit>,
    /// Keys generated for an INSERT that omitted its key column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_keys: Option<GeneratedKeys>,
}

impl ExecutionPlan {
    pub fn engine(&self) -> Option<RouteEngineKind> {
        self.route_context.engine()
    }

    pub fn data_sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for unit in &self.units {
            if !names.contains(&unit.data_source.as_str()) {
                names.push(&unit.data_source);
            }
        }
        names
    }
}

pub struct ShardingKernel {
    registry: Arc<RuleRegistry>,
    config: TesseraConfig,
    router: ShardingRouter,
    rewriter: SqlRewriteEngine,
}

impl ShardingKernel {
    pub fn new(registry: Arc<RuleRegistry>, config: TesseraConfig) -> Self {
        let router = ShardingRouter::new(config.router.clone());
        let rewriter = SqlRewriteEngine::new(config.rewrite.clone());
        Self {
            registry,
            config,
            router,
            rewriter,
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TesseraConfig {
        &self.config
    }

    /// Route and rewrite `statement`. The rule snapshot is taken once, so a
    /// concurrent reload never splits one statement across two rules.
    pub fn plan(
        &self,
        statement: BoundStatement,
        parameters: Vec<Datum>,
        hint: Option<&HintContext>,
    ) -> TesseraResult<ExecutionPlan> {
        let current = self.registry.current();
        let rule_version = current.version;
        let rule = current.rule.as_ref();
        let ctx = StatementContext::new(statement, parameters, rule);
        let route_context = self.router.route(rule, &ctx, hint)?;
        let rewritten = self.rewriter.rewrite(&ctx, &route_context)?;
        let units = execution_units(rule, rewritten)?;
        tracing::debug!(
            rule_version,
            engine = route_context.engine().map(|k| k.name()).unwrap_or("none"),
            units = units.len(),
            "statement planned"
        );
        Ok(ExecutionPlan {
            rule_version,
            route_context,
            units,
            generated_keys: ctx.generated_keys().cloned(),
        })
    }
}

/// A generic (unrouted) statement runs once on the first data source.
fn execution_units(
    rule: &ShardingRule,
    rewritten: SqlRewriteResult,
) -> TesseraResult<Vec<ExecutionUnit>> {
    match rewritten {
        SqlRewriteResult::Generic(unit) => {
            let data_source = rule.data_source_names().first().ok_or_else(|| {
                TesseraError::internal_bug(
                    "E-KERNEL-001",
                    "generic statement with no data source to run on",
                    format!("sql={}", unit.sql),
                )
            })?;
            Ok(vec![ExecutionUnit {
                data_source: data_source.clone(),
                sql: unit.sql,
                parameters: unit.parameters,
            }])
        }
        SqlRewriteResult::Routed(units) => Ok(units
            .into_iter()
            .map(|(route_unit, unit)| ExecutionUnit {
                data_source: route_unit.data_source().to_string(),
                sql: unit.sql,
                parameters: unit.parameters,
            })
            .collect()),
    }
}

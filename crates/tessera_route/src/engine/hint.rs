use tessera_common::config::CartesianPolicy;
use tessera_common::error::{RouteError, TesseraResult};
use tessera_rule::ShardingRule;

use super::{ComplexEngine, RouteEngine, RouteEngineKind, StandardEngine};
use crate::condition::ShardingConditions;
use crate::context::{RouteContext, RouteUnit};
use crate::hint::HintContext;

/// Routes with shard values forced by a hint context. Hint values replace
/// condition values for the dimensions they cover; when every table is
/// hinted the SQL values are not consulted at all, but each INSERT row is
/// still routed on its own.
pub struct HintEngine<'a> {
    logic_tables: Vec<String>,
    conditions: &'a ShardingConditions,
    hint: &'a HintContext,
    policy: CartesianPolicy,
}

impl<'a> HintEngine<'a> {
    pub fn new(
        logic_tables: &[String],
        conditions: &'a ShardingConditions,
        hint: &'a HintContext,
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

impl RouteEngine for HintEngine<'_> {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::Hint
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        let unhinted;
        let conditions = if self.logic_tables.iter().all(|t| self.hint.has_table(t)) {
            unhinted = self.conditions.without_values();
            &unhinted
        } else {
            self.conditions
        };
        if self.logic_tables.len() == 1 || rule.is_all_binding_tables(&self.logic_tables) {
            StandardEngine::new(&self.logic_tables, conditions, Some(self.hint)).route(rule)
        } else {
            ComplexEngine::new(&self.logic_tables, conditions, Some(self.hint), self.policy)
                .route(rule)
        }
    }
}

/// Sends the statement unchanged to the hinted data source.
pub struct DatabaseHintEngine {
    data_source: String,
}

impl DatabaseHintEngine {
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
        }
    }
}

impl RouteEngine for DatabaseHintEngine {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::DatabaseHint
    }

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext> {
        let ds = rule
            .data_source_names()
            .iter()
            .find(|ds| ds.eq_ignore_ascii_case(&self.data_source))
            .ok_or_else(|| RouteError::NoDataNode {
                table: "<database hint>".into(),
                value: self.data_source.clone(),
            })?;
        Ok([RouteUnit::database(ds)].into_iter().collect())
    }
}

use tessera_common::error::TesseraResult;
use tessera_rule::ShardingRule;

use super::{RouteEngine, RouteEngineKind};
use crate::context::RouteContext;

/// Leaves the statement unrouted.
#[derive(Debug, Default)]
pub struct IgnoreEngine;

impl RouteEngine for IgnoreEngine {
    fn kind(&self) -> RouteEngineKind {
        RouteEngineKind::Ignore
    }

    fn route(&self, _rule: &ShardingRule) -> TesseraResult<RouteContext> {
        Ok(RouteContext::new())
    }
}

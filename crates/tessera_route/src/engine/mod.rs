//! Routing engines.
//!
//! Each engine turns the statement facts it was built with into a
//! [`RouteContext`] for one rule snapshot. Engines are pure: routing the
//! same inputs twice yields structurally equal contexts.

mod broadcast;
mod complex;
mod hint;
mod ignore;
mod standard;
mod unicast;

use std::fmt;

use serde::Serialize;
use tessera_common::error::TesseraResult;
use tessera_rule::ShardingRule;

use crate::context::RouteContext;

pub use broadcast::{DatabaseBroadcastEngine, TableBroadcastEngine};
pub use complex::ComplexEngine;
pub use hint::{DatabaseHintEngine, HintEngine};
pub use ignore::IgnoreEngine;
pub use standard::StandardEngine;
pub use unicast::UnicastEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteEngineKind {
    /// One sharding table, or several that are all bound together.
    Standard,
    /// Several independently sharded tables: cartesian combination.
    Complex,
    /// Shard values forced by a hint context.
    Hint,
    /// Whole statement forced onto one data source.
    DatabaseHint,
    /// Every configured data source, tables untouched.
    DatabaseBroadcast,
    /// Every data node of the statement's tables.
    TableBroadcast,
    /// One deterministic data source.
    Unicast,
    /// Not routed; the statement runs unchanged.
    Ignore,
}

impl RouteEngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            RouteEngineKind::Standard => "standard",
            RouteEngineKind::Complex => "complex",
            RouteEngineKind::Hint => "hint",
            RouteEngineKind::DatabaseHint => "database_hint",
            RouteEngineKind::DatabaseBroadcast => "database_broadcast",
            RouteEngineKind::TableBroadcast => "table_broadcast",
            RouteEngineKind::Unicast => "unicast",
            RouteEngineKind::Ignore => "ignore",
        }
    }

    /// Engines that route by sharding conditions.
    pub fn uses_conditions(&self) -> bool {
        matches!(
            self,
            RouteEngineKind::Standard | RouteEngineKind::Complex | RouteEngineKind::Hint
        )
    }
}

impl fmt::Display for RouteEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait RouteEngine {
    fn kind(&self) -> RouteEngineKind;

    fn route(&self, rule: &ShardingRule) -> TesseraResult<RouteContext>;
}

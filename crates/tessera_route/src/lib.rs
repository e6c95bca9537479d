//! Statement routing: sharding condition extraction, engine dispatch, the
//! engine family, and the UPDATE consistency check.
//!
//! Entry point is [`ShardingRouter::route`], which turns a
//! [`StatementContext`] and a rule snapshot into a [`RouteContext`].

pub mod checker;
pub mod condition;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod hint;
pub mod router;
pub mod statement_context;

pub use checker::ConsistencyChecker;
pub use condition::{
    AssignmentValues, ConditionExtractor, ShardingCondition, ShardingConditionValue,
    ShardingConditions,
};
pub use context::{RouteContext, RouteMapper, RouteUnit};
pub use dispatcher::{build_engine, classify};
pub use engine::{RouteEngine, RouteEngineKind};
pub use hint::{HintContext, TableHint};
pub use router::ShardingRouter;
pub use statement_context::{GeneratedKeys, StatementContext};

//! SQL rewrite: one physical statement per route unit.
//!
//! Table and index tokens are replaced with the unit's actual names, INSERT
//! rows and their parameters are split across units, pagination is widened
//! for multi-unit reads, and generated keys are spliced into INSERTs that
//! omit their key column.

mod builder;
mod engine;
mod pagination;
mod parameter;
mod result;

pub use engine::SqlRewriteEngine;
pub use result::{SqlRewriteResult, SqlRewriteUnit};

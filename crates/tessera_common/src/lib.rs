//! Shared types for the sharding core: error taxonomy, bound values, props.

pub mod config;
pub mod datum;
pub mod error;

//! Bound statement model consumed by routing and rewriting.
//!
//! Parsing and binding happen upstream; this crate only fixes the shape of
//! what the binder hands over: referenced tables, predicate tree, SET
//! assignments, INSERT rows, pagination, and position-indexed tokens into
//! the original SQL text.

pub mod expr;
pub mod statement;
pub mod token;

pub use expr::{BoundExpr, ColumnRef, CompareOp};
pub use statement::{
    Assignment, BoundStatement, DalKind, DdlKind, InsertClause, Pagination, PaginationValue,
    SelectClause, StatementKind, TableRef,
};
pub use token::{Span, SqlToken};

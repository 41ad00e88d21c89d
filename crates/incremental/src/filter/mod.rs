//! Incremental row filtering.
//!
//! A [`Filter`] forwards the inbound rows that pass its [`RowPredicate`]. Only
//! changes to fields the predicate reads cause rows to be tested again; every other
//! change is forwarded for the rows already passing.

mod builder;
mod operator;
mod passing;
mod predicate;

pub use builder::{FilterBuilder, DEFAULT_FILTER_CAPACITY};
pub use operator::Filter;
pub use predicate::{AndPredicate, ConstantPredicate, FieldPredicate, OrPredicate, RowPredicate};

//! Incremental grouping with pluggable aggregation.
//!
//! Rows are assigned to groups by a [`RowInterner`](crate::interner::RowInterner).
//! Every batch updates the group mapping, runs only the aggregation functions whose
//! inputs changed (all of them when rows moved between groups), then fires one set of
//! parent changes and forwards the batch to the child output.

mod aggregation;
mod builder;
mod cache;
mod dependency;
mod mapping;
mod operator;
mod schema;

pub use aggregation::{
    AggregationFunction, EventType, FieldDescriptor, FieldReferences, GroupRecord,
    OutboundFieldResolver, RecordAggregation, SumAggregation, ValueRecord,
};
pub use builder::{GroupByBuilder, DEFAULT_CAPACITY};
pub use cache::{Cache, CacheResolver};
pub use dependency::{DependencyMap, DependencyResolver, GroupFunctionBinding};
pub use mapping::{FirstRowMapper, GroupMapping, GroupRowMods, NO_GROUP};
pub use operator::GroupBy;

//! Weft Incremental - incrementally maintained relational operators.
//!
//! Operators consume row deltas from upstream outputs and publish their own deltas,
//! with a changed-field bitset on every change, instead of recomputing results.
//!
//! # Core Concepts
//!
//! - [`TransformOutput`] / [`TransformInput`]: the two ends of an operator edge
//! - [`StateChangeSet`]: one batch of added, changed and removed rows
//! - [`RowInterner`] / [`JoinInterner`]: rows to dense keys
//!
//! # Operators
//!
//! - [`GroupBy`]: groups rows by key with pluggable [`AggregationFunction`]s
//! - [`Join`]: inner or outer lookup join of a left and a right input
//! - [`Filter`]: forwards the rows that pass a [`RowPredicate`]
//! - [`Projection`]: selects, renames and calculates fields
//! - [`OutputLogger`]: logs and forwards every event
//! - [`CaptureInput`]: records every event, for tests
//!
//! # Example
//!
//! ```ignore
//! use weft_incremental::{GroupByBuilder, SumAggregation};
//! use weft_core::DataType;
//!
//! let group_by = GroupByBuilder::new("totals")
//!     .group_by_fields(["Customer"])
//!     .include_count_field("Count")
//!     .add_aggregation(SumAggregation::new("Qty", "Qty", DataType::Int64))
//!     .build()?;
//! orders.output().attach(group_by.input());
//! ```

#![no_std]

extern crate alloc;

pub mod capture;
pub mod change;
pub mod filter;
pub mod groupby;
pub mod interner;
pub mod join;
pub mod logger;
mod one_to_many;
pub mod projection;

pub use capture::{CaptureInput, CapturedEvent};
pub use change::{
    BitSetRowProvider, DelegatedRowProvider, EmptyRowProvider, InputRef, OutputManager,
    RowProvider, RowSet, SourceSlot, StateChangeSet, TransformInput, TransformOutput,
};
pub use filter::{
    AndPredicate, ConstantPredicate, FieldPredicate, Filter, FilterBuilder, OrPredicate,
    RowPredicate, DEFAULT_FILTER_CAPACITY,
};
pub use groupby::{
    AggregationFunction, EventType, FieldDescriptor, FieldReferences, GroupBy, GroupByBuilder,
    GroupRecord, OutboundFieldResolver, RecordAggregation, SumAggregation, ValueRecord,
    DEFAULT_CAPACITY,
};
pub use interner::{
    ConstantRowInterner, DynamicJoinInterner, DynamicRowInterner, FieldListInterner, InternSet,
    JoinInterner, RowInterner, UNSET_KEY,
};
pub use join::{
    DropConflicts, Join, JoinBuilder, JoinChangeTracker, JoinKeyHandling, JoinListener,
    JoinSchemaBuilder, JoinSide, LookupJoinMapper, NameConflictResolver, SuffixNameResolver,
};
pub use logger::{OutputLogger, OutputLoggerBuilder};
pub use projection::{
    CalculatedFieldDescriptor, CalculationRef, FieldCalculation, FieldSorter, FnCalculation,
    Projection, ProjectionBuilder, ProjectionDependencyMap,
};

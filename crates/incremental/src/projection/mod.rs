//! Field selection, renaming and lazy calculation.
//!
//! A [`Projection`] passes rows through unchanged and reshapes the schema: inbound
//! fields can be included, omitted, aliased and reordered, and
//! [`FieldCalculation`]s add fields computed on read. A [`ProjectionDependencyMap`]
//! turns inbound field changes into the outbound fields they affect.

mod builder;
mod calculation;
mod operator;
mod schema;

pub use builder::ProjectionBuilder;
pub use calculation::{CalculatedFieldDescriptor, CalculationRef, FieldCalculation, FnCalculation};
pub use operator::Projection;
pub use schema::{FieldSorter, ProjectionDependencyMap};

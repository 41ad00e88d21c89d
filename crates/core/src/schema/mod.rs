//! Schema module.
//!
//! A schema is the immutable, ordered list of fields an output publishes. Operators
//! build a new schema on every bind and announce it to downstream inputs; a schema is
//! never mutated once built.

mod definition;
mod field;

pub use definition::{Schema, SchemaBuilder};
pub use field::{Metadata, SchemaField};

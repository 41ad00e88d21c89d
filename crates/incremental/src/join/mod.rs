//! Incremental lookup join.
//!
//! A [`Join`] merges a left and a right input on a key. The [`JoinSchemaBuilder`]
//! lays out the merged schema, the [`LookupJoinMapper`] tracks which rows meet on
//! which key, and the [`JoinChangeTracker`] turns the mapper's transitions into one
//! batch of output changes per inbound event.

mod builder;
mod lookup;
mod operator;
mod schema;
mod tracker;

pub use builder::JoinBuilder;
pub use lookup::LookupJoinMapper;
pub use operator::Join;
pub use schema::{
    DropConflicts, JoinKeyHandling, JoinSchema, JoinSchemaBuilder, JoinSide, JoinSideBinding,
    NameConflictResolver, SuffixNameResolver,
};
pub use tracker::{JoinChangeTracker, JoinListener};

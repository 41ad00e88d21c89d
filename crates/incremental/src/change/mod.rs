//! Schema and change propagation between operators.
//!
//! Every operator publishes its results through a [`TransformOutput`] and consumes
//! upstream results through one or more [`TransformInput`]s. Row deltas are buffered
//! per batch in a [`StateChangeSet`] and fired once.

mod input;
mod output;
mod provider;
mod state;

pub use input::{InputRef, TransformInput};
pub use output::{OutputManager, TransformOutput};
pub use provider::{BitSetRowProvider, DelegatedRowProvider, EmptyRowProvider, RowProvider, SourceSlot};
pub use state::{RowSet, StateChangeSet};

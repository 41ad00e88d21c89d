//! Setup of Filter operators.

use super::operator::{Filter, FilterState};
use super::predicate::RowPredicate;
use alloc::boxed::Box;
use alloc::string::String;

/// Default number of passing rows storage is sized for.
pub const DEFAULT_FILTER_CAPACITY: usize = 64;

/// Builder for [`Filter`].
///
/// ```ignore
/// let filter = FilterBuilder::new("large_orders")
///     .initial_predicate(FieldPredicate::new("Qty", |qty| {
///         matches!(qty, Value::Int64(q) if *q >= 100)
///     }))
///     .build();
/// orders.output().attach(filter.input());
/// ```
pub struct FilterBuilder {
    name: String,
    capacity: usize,
    passes_when_no_predicate: bool,
    predicate: Option<Box<dyn RowPredicate>>,
}

impl FilterBuilder {
    /// Starts a filter that fails every row until a predicate is set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: DEFAULT_FILTER_CAPACITY,
            passes_when_no_predicate: false,
            predicate: None,
        }
    }

    pub fn initial_predicate(mut self, predicate: impl RowPredicate + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Whether rows pass while no predicate is set.
    pub fn passes_when_no_predicate(mut self, passes: bool) -> Self {
        self.passes_when_no_predicate = passes;
        self
    }

    /// Sizes internal storage for `capacity` passing rows.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> Filter {
        Filter::new(FilterState::new(
            self.name,
            self.capacity,
            self.passes_when_no_predicate,
            self.predicate,
        ))
    }
}

//! Row predicates evaluated by a [`Filter`](super::Filter).

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use weft_core::{FieldRef, FieldResolver, Result, RowIndex, Value};

/// Decides whether an inbound row passes a filter.
///
/// Every field requested through the resolver while binding becomes a dependency:
/// changes to those fields cause the affected rows to be tested again.
pub trait RowPredicate {
    /// Resolves the fields the predicate reads.
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()>;

    /// Drops every resolved field.
    fn unbind_schema(&mut self);

    /// Returns true if `row` passes.
    fn test_row(&self, row: RowIndex) -> bool;
}

/// A predicate with a fixed answer and no dependencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantPredicate(bool);

impl ConstantPredicate {
    pub fn passes() -> Self {
        Self(true)
    }

    pub fn fails() -> Self {
        Self(false)
    }
}

impl RowPredicate for ConstantPredicate {
    fn bind_to_schema(&mut self, _resolver: &mut dyn FieldResolver) -> Result<()> {
        Ok(())
    }

    fn unbind_schema(&mut self) {}

    fn test_row(&self, _row: RowIndex) -> bool {
        self.0
    }
}

/// Tests the value of one named field.
///
/// ```ignore
/// let big = FieldPredicate::new("Qty", |qty| matches!(qty, Value::Int64(q) if *q >= 100));
/// ```
pub struct FieldPredicate<F> {
    name: String,
    test: F,
    field: Option<FieldRef>,
}

impl<F> FieldPredicate<F>
where
    F: Fn(&Value) -> bool,
{
    pub fn new(name: impl Into<String>, test: F) -> Self {
        Self {
            name: name.into(),
            test,
            field: None,
        }
    }
}

impl<F> RowPredicate for FieldPredicate<F>
where
    F: Fn(&Value) -> bool,
{
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.field = Some(resolver.get_field(&self.name)?);
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.field = None;
    }

    fn test_row(&self, row: RowIndex) -> bool {
        self.field
            .as_ref()
            .is_some_and(|field| (self.test)(&field.value_at(row)))
    }
}

/// Passes rows that pass every inner predicate. An empty list passes everything.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RowPredicate>>,
}

impl AndPredicate {
    pub fn new(predicates: Vec<Box<dyn RowPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RowPredicate for AndPredicate {
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.predicates
            .iter_mut()
            .try_for_each(|p| p.bind_to_schema(resolver))
    }

    fn unbind_schema(&mut self) {
        self.predicates.iter_mut().for_each(|p| p.unbind_schema());
    }

    fn test_row(&self, row: RowIndex) -> bool {
        self.predicates.iter().all(|p| p.test_row(row))
    }
}

/// Passes rows that pass any inner predicate. An empty list fails everything.
pub struct OrPredicate {
    predicates: Vec<Box<dyn RowPredicate>>,
}

impl OrPredicate {
    pub fn new(predicates: Vec<Box<dyn RowPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RowPredicate for OrPredicate {
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.predicates
            .iter_mut()
            .try_for_each(|p| p.bind_to_schema(resolver))
    }

    fn unbind_schema(&mut self) {
        self.predicates.iter_mut().for_each(|p| p.unbind_schema());
    }

    fn test_row(&self, row: RowIndex) -> bool {
        self.predicates.iter().any(|p| p.test_row(row))
    }
}

//! Lazily calculated projection fields.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{DataType, Field, FieldRef, FieldResolver, Metadata, Result, RowIndex, Value};

/// Computes the value of an outbound field from other fields of the same row.
///
/// Values are computed when read, never stored. Every field requested while
/// binding becomes a dependency: a change to it is reported as a change to the
/// calculated field.
pub trait FieldCalculation {
    /// Returns the type of every value this calculation produces.
    fn data_type(&self) -> DataType;

    /// Resolves the fields the calculation reads.
    ///
    /// Names resolve against the outbound schema first, then the inbound schema.
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()>;

    /// Drops every resolved field.
    fn unbind_schema(&mut self);

    /// Computes the value at `row`.
    fn calculate(&self, row: RowIndex) -> Value;
}

/// A calculation over the values of named fields.
///
/// ```ignore
/// let notional = FnCalculation::new(DataType::Float64, ["Qty", "Price"], |v| {
///     match (&v[0], &v[1]) {
///         (Value::Int64(q), Value::Float64(p)) => Value::Float64(*q as f64 * p),
///         _ => Value::Float64(0.0),
///     }
/// });
/// ```
pub struct FnCalculation<F> {
    data_type: DataType,
    inputs: Vec<String>,
    f: F,
    fields: Vec<FieldRef>,
}

impl<F> FnCalculation<F>
where
    F: Fn(&[Value]) -> Value,
{
    /// `f` receives the values of `inputs`, in order.
    pub fn new<S: Into<String>>(
        data_type: DataType,
        inputs: impl IntoIterator<Item = S>,
        f: F,
    ) -> Self {
        Self {
            data_type,
            inputs: inputs.into_iter().map(Into::into).collect(),
            f,
            fields: Vec::new(),
        }
    }
}

impl<F> FieldCalculation for FnCalculation<F>
where
    F: Fn(&[Value]) -> Value,
{
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.fields = self
            .inputs
            .iter()
            .map(|name| resolver.get_field(name))
            .collect::<Result<_>>()?;
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.fields.clear();
    }

    fn calculate(&self, row: RowIndex) -> Value {
        if self.fields.len() != self.inputs.len() {
            return Value::default_for_type(self.data_type);
        }
        let values: Vec<Value> = self.fields.iter().map(|f| f.value_at(row)).collect();
        (self.f)(&values)
    }
}

/// Shared handle to a calculation, bound by the projection and read by its field.
pub type CalculationRef = Rc<RefCell<dyn FieldCalculation>>;

/// A calculated field declared on a projection.
#[derive(Clone)]
pub struct CalculatedFieldDescriptor {
    name: String,
    calculation: CalculationRef,
    metadata: Metadata,
}

impl CalculatedFieldDescriptor {
    pub fn new(name: impl Into<String>, calculation: CalculationRef, metadata: Metadata) -> Self {
        Self {
            name: name.into(),
            calculation,
            metadata,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn calculation(&self) -> &CalculationRef {
        &self.calculation
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// The outbound field of a calculation.
pub(crate) struct CalculatedField {
    data_type: DataType,
    calculation: CalculationRef,
}

impl CalculatedField {
    pub(crate) fn new(calculation: CalculationRef) -> Self {
        let data_type = calculation.borrow().data_type();
        Self {
            data_type,
            calculation,
        }
    }
}

impl Field for CalculatedField {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn value_at(&self, row: RowIndex) -> Value {
        self.calculation.borrow().calculate(row)
    }
}

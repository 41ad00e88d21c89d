//! Aggregation functions computed per group.
//!
//! An [`AggregationFunction`] declares the inbound fields it reads and the outbound
//! fields it writes, is bound to the current schemas, then receives the rows added
//! to, changed within, and removed from each group of a batch. Functions update
//! their outbound values incrementally: on a change they see both the previous
//! (cached) and current value of each inbound field.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{
    ArrayField, DataType, Error, Field, FieldBitSet, FieldRef, FieldResolver, Metadata, Result,
    RowIndex, Value, WritableField, WritableFieldRef, NO_ROW,
};

/// Name, type and metadata of a field an aggregation function writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    data_type: DataType,
    metadata: Metadata,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// The fields an aggregation function reads and writes.
#[derive(Clone, Debug, Default)]
pub struct FieldReferences {
    inbound: Vec<String>,
    previous: Vec<String>,
    outbound: Vec<FieldDescriptor>,
}

impl FieldReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an inbound field whose current value is read.
    pub fn add_inbound_field(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.inbound.contains(&name) {
            self.inbound.push(name);
        }
    }

    /// Declares an inbound field whose previous value is also read. Implies
    /// [`FieldReferences::add_inbound_field`].
    pub fn add_previous_value_field(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.add_inbound_field(name.clone());
        if !self.previous.contains(&name) {
            self.previous.push(name);
        }
    }

    /// Declares a field the function writes.
    pub fn add_outbound_field(&mut self, descriptor: FieldDescriptor) {
        self.outbound.push(descriptor);
    }

    pub fn inbound_fields(&self) -> &[String] {
        &self.inbound
    }

    pub fn previous_value_fields(&self) -> &[String] {
        &self.previous
    }

    pub fn outbound_fields(&self) -> &[FieldDescriptor] {
        &self.outbound
    }
}

/// Resolves the outbound fields an aggregation function writes.
pub trait OutboundFieldResolver {
    fn get_writable_field(&mut self, name: &str) -> Result<WritableFieldRef>;
}

/// A per-group aggregation strategy.
pub trait AggregationFunction {
    /// Declares the fields the function reads and writes. Called once, when the
    /// GroupBy is built.
    fn collect_field_references(&self, references: &mut FieldReferences);

    /// Resolves fields for a new schema generation.
    ///
    /// `previous` yields cached values as of the last batch, `current` yields live
    /// inbound values, and `outbound` yields the fields declared as outputs.
    fn bind_to_schema(
        &mut self,
        previous: &mut dyn FieldResolver,
        current: &mut dyn FieldResolver,
        outbound: &mut dyn OutboundFieldResolver,
    ) -> Result<()>;

    /// Drops every resolved field.
    fn unbind_schema(&mut self);

    /// `rows` joined `group`.
    fn group_rows_added(&mut self, group: usize, rows: &[RowIndex]);

    /// `rows` of `group` changed values.
    fn group_rows_changed(&mut self, group: usize, rows: &[RowIndex]);

    /// `rows` left `group`.
    fn group_rows_removed(&mut self, group: usize, rows: &[RowIndex]);
}

/// An aggregation output that records every write as a field change.
pub(crate) struct TrackedField {
    store: Rc<ArrayField>,
    field_id: usize,
    changes: Rc<RefCell<FieldBitSet>>,
}

impl TrackedField {
    pub(crate) fn new(store: Rc<ArrayField>, field_id: usize, changes: Rc<RefCell<FieldBitSet>>) -> Self {
        Self {
            store,
            field_id,
            changes,
        }
    }
}

impl Field for TrackedField {
    fn data_type(&self) -> DataType {
        self.store.data_type()
    }

    fn value_at(&self, row: RowIndex) -> Value {
        self.store.value_at(row)
    }
}

impl WritableField for TrackedField {
    fn set_value_at(&self, row: RowIndex, value: Value) {
        self.changes.borrow_mut().set(self.field_id);
        self.store.set_value_at(row, value);
    }
}

/// Converts a numeric value to `data_type`. Non-numeric values become the default.
fn numeric_cast(value: &Value, data_type: DataType) -> Value {
    match (value, data_type) {
        (Value::Int32(v), DataType::Int32) => Value::Int32(*v),
        (Value::Int32(v), DataType::Int64) => Value::Int64(*v as i64),
        (Value::Int32(v), DataType::Float64) => Value::Float64(*v as f64),
        (Value::Int64(v), DataType::Int32) => Value::Int32(*v as i32),
        (Value::Int64(v), DataType::Int64) => Value::Int64(*v),
        (Value::Int64(v), DataType::Float64) => Value::Float64(*v as f64),
        (Value::Float64(v), DataType::Int32) => Value::Int32(*v as i32),
        (Value::Float64(v), DataType::Int64) => Value::Int64(*v as i64),
        (Value::Float64(v), DataType::Float64) => Value::Float64(*v),
        _ => Value::default_for_type(data_type),
    }
}

struct SumBinding {
    previous: FieldRef,
    current: FieldRef,
    total: WritableFieldRef,
}

/// Sums one numeric inbound field into one numeric outbound field.
pub struct SumAggregation {
    input: String,
    output: String,
    data_type: DataType,
    bound: Option<SumBinding>,
}

impl SumAggregation {
    /// Sums `input` into a new field `output` of type `data_type`.
    pub fn new(input: impl Into<String>, output: impl Into<String>, data_type: DataType) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            data_type,
            bound: None,
        }
    }

    fn apply(&self, group: usize, rows: &[RowIndex], add: Option<&FieldRef>, sub: Option<&FieldRef>) {
        let Some(bound) = &self.bound else {
            return;
        };
        let mut total = bound.total.value_at(group);
        for &row in rows {
            if let Some(field) = sub {
                let v = numeric_cast(&field.value_at(row), self.data_type);
                total = total.checked_sub(&v).unwrap_or(total);
            }
            if let Some(field) = add {
                let v = numeric_cast(&field.value_at(row), self.data_type);
                total = total.checked_add(&v).unwrap_or(total);
            }
        }
        bound.total.set_value_at(group, total);
    }
}

impl AggregationFunction for SumAggregation {
    fn collect_field_references(&self, references: &mut FieldReferences) {
        references.add_previous_value_field(self.input.clone());
        references.add_outbound_field(FieldDescriptor::new(self.output.clone(), self.data_type));
    }

    fn bind_to_schema(
        &mut self,
        previous: &mut dyn FieldResolver,
        current: &mut dyn FieldResolver,
        outbound: &mut dyn OutboundFieldResolver,
    ) -> Result<()> {
        if !self.data_type.is_numeric() {
            return Err(Error::invalid_setup(format!(
                "sum output '{}' must be numeric, got {}",
                self.output, self.data_type
            )));
        }
        let current = current.get_field(&self.input)?;
        if !current.data_type().is_numeric() {
            return Err(Error::type_mismatch(
                self.input.as_str(),
                self.data_type,
                current.data_type(),
            ));
        }
        self.bound = Some(SumBinding {
            previous: previous.get_field(&self.input)?,
            current,
            total: outbound.get_writable_field(&self.output)?,
        });
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.bound = None;
    }

    fn group_rows_added(&mut self, group: usize, rows: &[RowIndex]) {
        let current = self.bound.as_ref().map(|b| b.current.clone());
        self.apply(group, rows, current.as_ref(), None);
    }

    fn group_rows_changed(&mut self, group: usize, rows: &[RowIndex]) {
        let fields = self.bound.as_ref().map(|b| (b.current.clone(), b.previous.clone()));
        if let Some((current, previous)) = fields {
            self.apply(group, rows, Some(&current), Some(&previous));
        }
    }

    fn group_rows_removed(&mut self, group: usize, rows: &[RowIndex]) {
        let previous = self.bound.as_ref().map(|b| b.previous.clone());
        self.apply(group, rows, None, previous.as_ref());
    }
}

/// The kind of group membership event a record aggregation is handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Add,
    Change,
    Remove,
}

/// Read-only view of the declared inbound fields at one row.
///
/// On an add the "old" record reads defaults; on a remove the "new" record does.
pub struct ValueRecord<'a> {
    names: &'a [String],
    fields: &'a [FieldRef],
    row: RowIndex,
}

impl ValueRecord<'_> {
    /// Reads a declared field. Undeclared names read `Null`.
    pub fn get(&self, name: &str) -> Value {
        match self.names.iter().position(|n| n == name) {
            Some(index) => self.get_at(index),
            None => Value::Null,
        }
    }

    /// Reads the declared field at `index`.
    pub fn get_at(&self, index: usize) -> Value {
        match self.fields.get(index) {
            Some(field) if self.row == NO_ROW => Value::default_for_type(field.data_type()),
            Some(field) => field.value_at(self.row),
            None => Value::Null,
        }
    }

    /// Returns true if this record reads defaults only.
    pub fn is_default(&self) -> bool {
        self.row == NO_ROW
    }
}

/// Read-write view of a group's outbound fields.
pub struct GroupRecord<'a> {
    names: &'a [String],
    fields: &'a [WritableFieldRef],
    group: usize,
}

impl GroupRecord<'_> {
    /// Returns the group being updated.
    pub fn group(&self) -> usize {
        self.group
    }

    /// Reads an output field. Undeclared names read `Null`.
    pub fn get(&self, name: &str) -> Value {
        match self.names.iter().position(|n| n == name) {
            Some(index) => self.fields[index].value_at(self.group),
            None => Value::Null,
        }
    }

    /// Writes an output field. Returns false if `name` is not a declared output.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.names.iter().position(|n| n == name) {
            Some(index) => {
                self.fields[index].set_value_at(self.group, value);
                true
            }
            None => false,
        }
    }
}

struct RecordBinding {
    previous: Vec<FieldRef>,
    current: Vec<FieldRef>,
    outputs: Vec<WritableFieldRef>,
}

/// Aggregation driven by a closure over record views.
///
/// The closure receives the event type, the group's output record, and the old and
/// new values of the declared inputs for each row.
///
/// ```ignore
/// let max_qty = RecordAggregation::new(
///     ["Qty"],
///     [FieldDescriptor::new("MaxQty", DataType::Int64)],
///     |event, out, _old, new| {
///         if event != EventType::Remove && new.get("Qty") > out.get("MaxQty") {
///             out.set("MaxQty", new.get("Qty"));
///         }
///     },
/// );
/// ```
pub struct RecordAggregation<F> {
    inputs: Vec<String>,
    output_names: Vec<String>,
    outputs: Vec<FieldDescriptor>,
    accumulate: F,
    bound: Option<RecordBinding>,
}

impl<F> RecordAggregation<F>
where
    F: FnMut(EventType, &mut GroupRecord<'_>, &ValueRecord<'_>, &ValueRecord<'_>),
{
    pub fn new<S: Into<String>>(
        inputs: impl IntoIterator<Item = S>,
        outputs: impl IntoIterator<Item = FieldDescriptor>,
        accumulate: F,
    ) -> Self {
        let outputs: Vec<FieldDescriptor> = outputs.into_iter().collect();
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output_names: outputs.iter().map(|d| String::from(d.name())).collect(),
            outputs,
            accumulate,
            bound: None,
        }
    }

    fn dispatch(&mut self, event: EventType, group: usize, rows: &[RowIndex]) {
        let Some(bound) = &self.bound else {
            return;
        };
        let mut out = GroupRecord {
            names: &self.output_names,
            fields: &bound.outputs,
            group,
        };
        for &row in rows {
            let (old_row, new_row) = match event {
                EventType::Add => (NO_ROW, row),
                EventType::Change => (row, row),
                EventType::Remove => (row, NO_ROW),
            };
            let old = ValueRecord {
                names: &self.inputs,
                fields: &bound.previous,
                row: old_row,
            };
            let new = ValueRecord {
                names: &self.inputs,
                fields: &bound.current,
                row: new_row,
            };
            (self.accumulate)(event, &mut out, &old, &new);
        }
    }
}

impl<F> AggregationFunction for RecordAggregation<F>
where
    F: FnMut(EventType, &mut GroupRecord<'_>, &ValueRecord<'_>, &ValueRecord<'_>),
{
    fn collect_field_references(&self, references: &mut FieldReferences) {
        for name in &self.inputs {
            references.add_previous_value_field(name.clone());
        }
        for descriptor in &self.outputs {
            references.add_outbound_field(descriptor.clone());
        }
    }

    fn bind_to_schema(
        &mut self,
        previous: &mut dyn FieldResolver,
        current: &mut dyn FieldResolver,
        outbound: &mut dyn OutboundFieldResolver,
    ) -> Result<()> {
        let mut binding = RecordBinding {
            previous: Vec::with_capacity(self.inputs.len()),
            current: Vec::with_capacity(self.inputs.len()),
            outputs: Vec::with_capacity(self.outputs.len()),
        };
        for name in &self.inputs {
            binding.current.push(current.get_field(name)?);
            binding.previous.push(previous.get_field(name)?);
        }
        for descriptor in &self.outputs {
            binding.outputs.push(outbound.get_writable_field(descriptor.name())?);
        }
        self.bound = Some(binding);
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.bound = None;
    }

    fn group_rows_added(&mut self, group: usize, rows: &[RowIndex]) {
        self.dispatch(EventType::Add, group, rows);
    }

    fn group_rows_changed(&mut self, group: usize, rows: &[RowIndex]) {
        self.dispatch(EventType::Change, group, rows);
    }

    fn group_rows_removed(&mut self, group: usize, rows: &[RowIndex]) {
        self.dispatch(EventType::Remove, group, rows);
    }
}

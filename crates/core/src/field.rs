//! Field accessors.
//!
//! A field is a typed column read by row index. Fields are shared (`Rc`) between
//! the schema that publishes them and the operators that read them; the storage
//! behind a field belongs to whichever component created it.

use crate::types::DataType;
use crate::value::Value;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

/// A dense row index into columnar field storage.
pub type RowIndex = usize;

/// Sentinel for "no row".
pub const NO_ROW: RowIndex = usize::MAX;

/// A typed, read-only column accessor.
pub trait Field {
    /// Returns the type of every value this field produces.
    fn data_type(&self) -> DataType;

    /// Returns the value at the given row.
    fn value_at(&self, row: RowIndex) -> Value;
}

/// Shared handle to a field.
pub type FieldRef = Rc<dyn Field>;

/// A field that can also be written by row.
pub trait WritableField: Field {
    /// Writes the value at the given row.
    fn set_value_at(&self, row: RowIndex, value: Value);
}

/// Shared handle to a writable field.
pub type WritableFieldRef = Rc<dyn WritableField>;

/// Maps an operator's output row to the upstream row that backs it.
pub trait RowMapper {
    /// Returns the source row of `row`, or [`NO_ROW`] if there is none.
    fn source_row_of(&self, row: RowIndex) -> RowIndex;
}

/// A row mapper where every row is its own source.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityRowMapper;

impl RowMapper for IdentityRowMapper {
    #[inline]
    fn source_row_of(&self, row: RowIndex) -> RowIndex {
        row
    }
}

/// Growable, owned column storage.
///
/// Rows never written read as the type's default value.
pub struct ArrayField {
    data_type: DataType,
    default: Value,
    values: RefCell<Vec<Value>>,
}

impl ArrayField {
    /// Creates an empty column of the given type.
    pub fn new(data_type: DataType) -> Self {
        Self::with_capacity(data_type, 0)
    }

    /// Creates an empty column with room for `capacity` rows.
    pub fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        Self {
            data_type,
            default: Value::default_for_type(data_type),
            values: RefCell::new(Vec::with_capacity(capacity)),
        }
    }

    /// Resets a single row to the default value.
    pub fn reset_row(&self, row: RowIndex) {
        if let Some(v) = self.values.borrow_mut().get_mut(row) {
            *v = self.default.clone();
        }
    }

    /// Drops all stored values.
    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }

    /// Returns the number of allocated rows.
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Returns true if no row has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Field for ArrayField {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn value_at(&self, row: RowIndex) -> Value {
        self.values
            .borrow()
            .get(row)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl WritableField for ArrayField {
    fn set_value_at(&self, row: RowIndex, value: Value) {
        debug_assert!(
            value.is_null() || value.data_type() == Some(self.data_type),
            "writing {:?} into a {} field",
            value,
            self.data_type
        );
        let mut values = self.values.borrow_mut();
        if row >= values.len() {
            values.resize(row + 1, self.default.clone());
        }
        values[row] = value;
    }
}

impl fmt::Debug for ArrayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayField")
            .field("data_type", &self.data_type)
            .field("len", &self.len())
            .finish()
    }
}

/// Reads another field through a [`RowMapper`].
///
/// Output rows whose source row is [`NO_ROW`] read the default value, which is how
/// unmatched outer-join rows present the missing side.
pub struct MappedField {
    inner: FieldRef,
    mapper: Rc<dyn RowMapper>,
}

impl MappedField {
    pub fn new(inner: FieldRef, mapper: Rc<dyn RowMapper>) -> Self {
        Self { inner, mapper }
    }
}

impl Field for MappedField {
    fn data_type(&self) -> DataType {
        self.inner.data_type()
    }

    fn value_at(&self, row: RowIndex) -> Value {
        match self.mapper.source_row_of(row) {
            NO_ROW => Value::default_for_type(self.inner.data_type()),
            source => self.inner.value_at(source),
        }
    }
}

/// A field whose value is the row index itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowIdentityField;

impl Field for RowIdentityField {
    fn data_type(&self) -> DataType {
        DataType::Int32
    }

    fn value_at(&self, row: RowIndex) -> Value {
        Value::Int32(row_value(row))
    }
}

/// A field computed by a closure.
pub struct FnField<F> {
    data_type: DataType,
    f: F,
}

impl<F> FnField<F>
where
    F: Fn(RowIndex) -> Value,
{
    pub fn new(data_type: DataType, f: F) -> Self {
        Self { data_type, f }
    }
}

impl<F> Field for FnField<F>
where
    F: Fn(RowIndex) -> Value,
{
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn value_at(&self, row: RowIndex) -> Value {
        (self.f)(row)
    }
}

/// Converts a row index into the `Int32` value used by row-identity fields.
///
/// [`NO_ROW`] becomes `-1`.
pub fn row_value(row: RowIndex) -> i32 {
    if row == NO_ROW {
        -1
    } else {
        row as i32
    }
}

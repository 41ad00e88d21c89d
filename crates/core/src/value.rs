//! Cell values.
//!
//! `Value` is the dynamically typed cell read from a field at a row. Fields are
//! typed, so a value read from a field always matches the field's `DataType`
//! (or is `Null` for a cell that was never written).
//!
//! Values are also used as interning keys, so equality and hashing agree: floats
//! compare by bit pattern, which makes `NaN` equal to itself and `0.0` distinct
//! from `-0.0`.

use crate::types::DataType;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A value read from or written to a field.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the data type of this value, or `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::DateTime(_) => DataType::DateTime,
            Value::Bytes(_) => DataType::Bytes,
        })
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value an unset cell of `data_type` reads as.
    ///
    /// Outer-join fields without a match and aggregation inputs of added or removed
    /// rows read this.
    pub fn default_for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Value::Boolean(false),
            DataType::Int32 => Value::Int32(0),
            DataType::Int64 => Value::Int64(0),
            DataType::Float64 => Value::Float64(0.0),
            DataType::String => Value::String(String::new()),
            DataType::DateTime => Value::DateTime(0),
            DataType::Bytes => Value::Bytes(Vec::new()),
        }
    }

    /// Adds two numeric values of the same type.
    ///
    /// Integer arithmetic wraps. Returns `None` when either side is not numeric or
    /// the types differ.
    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        self.numeric_op(other, i32::wrapping_add, i64::wrapping_add, |a, b| a + b)
    }

    /// Subtracts `other` from this numeric value. Same rules as [`Value::checked_add`].
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        self.numeric_op(other, i32::wrapping_sub, i64::wrapping_sub, |a, b| a - b)
    }

    fn numeric_op(
        &self,
        other: &Value,
        int32: fn(i32, i32) -> i32,
        int64: fn(i64, i64) -> i64,
        float64: fn(f64, f64) -> f64,
    ) -> Option<Value> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => Some(Value::Int32(int32(*a, *b))),
            (Value::Int64(a), Value::Int64(b)) => Some(Value::Int64(int64(*a, *b))),
            (Value::Float64(a), Value::Float64(b)) => Some(Value::Float64(float64(*a, *b))),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) | (Value::DateTime(a), Value::DateTime(b)) => {
                a == b
            }
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) | Value::DateTime(i) => i.hash(state),
            Value::Float64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::DateTime(v) => write!(f, "@{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

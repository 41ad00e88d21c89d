//! Data type definitions for weft fields.
//!
//! Every field in a schema carries one of these types. Operators use the type to
//! allocate output storage and to produce default values for unmapped rows.

/// Supported field data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
}

impl DataType {
    /// Returns the lowercase type name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "bool",
            DataType::Int32 => "int",
            DataType::Int64 => "long",
            DataType::Float64 => "double",
            DataType::String => "string",
            DataType::DateTime => "datetime",
            DataType::Bytes => "bytes",
        }
    }

    /// Returns whether values of this type can be summed.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

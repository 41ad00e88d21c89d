//! Error types for weft.
//!
//! All errors are setup-time failures: a missing field, a name collision, a type
//! mismatch between join keys. Once a schema is bound, per-row processing does not
//! fail.

use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;
use thiserror::Error;

/// Result type alias for weft operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for schema binding and operator setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A field referenced by name is missing from the schema being bound.
    #[error("Field not found: '{field}' requested by {context} in schema '{schema}'")]
    FieldNotFound {
        field: String,
        context: String,
        schema: String,
    },
    /// Two field sources of an operator tried to use the same output name.
    #[error(
        "Name collision setting up {operator}: attempted to use '{name}' for {usage}, but was already used for {existing}"
    )]
    NameCollision {
        operator: String,
        name: String,
        usage: String,
        existing: String,
    },
    /// A schema was built with the same field name twice.
    #[error("Duplicate field '{field}' in schema '{schema}'")]
    DuplicateField { schema: String, field: String },
    /// A field had a different type than the one required.
    #[error("Type mismatch on '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: DataType,
        got: DataType,
    },
    /// Left and right join key lists have different lengths.
    #[error("Left and Right fields names for joins should have the same number: left={left}, right={right}")]
    JoinKeyArity { left: usize, right: usize },
    /// A component was used before a schema was bound to it.
    #[error("Schema not bound: {context}")]
    SchemaNotBound { context: String },
    /// A row key was added twice to a keyed source.
    #[error("Duplicate key {key:?} in table '{table}'")]
    DuplicateKey { table: String, key: Value },
    /// A row key is not present in a keyed source.
    #[error("Key {key:?} not found in table '{table}'")]
    KeyNotFound { table: String, key: Value },
    /// Invalid operator configuration.
    #[error("Invalid setup: {message}")]
    InvalidSetup { message: String },
}

impl Error {
    /// Creates a field not found error.
    pub fn field_not_found(
        field: impl Into<String>,
        context: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Error::FieldNotFound {
            field: field.into(),
            context: context.into(),
            schema: schema.into(),
        }
    }

    /// Creates a name collision error.
    pub fn name_collision(
        operator: impl Into<String>,
        name: impl Into<String>,
        usage: impl Into<String>,
        existing: impl Into<String>,
    ) -> Self {
        Error::NameCollision {
            operator: operator.into(),
            name: name.into(),
            usage: usage.into(),
            existing: existing.into(),
        }
    }

    /// Creates a duplicate field error.
    pub fn duplicate_field(schema: impl Into<String>, field: impl Into<String>) -> Self {
        Error::DuplicateField {
            schema: schema.into(),
            field: field.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(field: impl Into<String>, expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch {
            field: field.into(),
            expected,
            got,
        }
    }

    /// Creates a schema not bound error.
    pub fn schema_not_bound(context: impl Into<String>) -> Self {
        Error::SchemaNotBound {
            context: context.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(table: impl Into<String>, key: Value) -> Self {
        Error::DuplicateKey {
            table: table.into(),
            key,
        }
    }

    /// Creates a key not found error.
    pub fn key_not_found(table: impl Into<String>, key: Value) -> Self {
        Error::KeyNotFound {
            table: table.into(),
            key,
        }
    }

    /// Creates an invalid setup error.
    pub fn invalid_setup(message: impl Into<String>) -> Self {
        Error::InvalidSetup {
            message: message.into(),
        }
    }
}

//! weft core - fields, schemas and change tracking shared by every weft operator.
//!
//! This crate provides the data model the incremental operators are built on:
//!
//! - `DataType` / `Value`: field types and dynamically typed cell values
//! - `Field`: typed column accessors read by row index (`ArrayField`, `MappedField`, ...)
//! - `Schema`: an immutable, named, ordered list of fields
//! - `FieldBitSet`: the set of field ids changed by one notification
//! - `FieldMapping`: inbound to outbound field id translation
//! - `FieldResolver`: by-name field lookup used while binding a schema
//! - `Error`: setup-time error types
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use weft_core::{ArrayField, DataType, SchemaBuilder, Value, WritableField};
//!
//! let qty = Rc::new(ArrayField::new(DataType::Int64));
//! qty.set_value_at(0, Value::Int64(25));
//!
//! let schema = SchemaBuilder::new("orders")
//!     .add_field("Qty", qty.clone())
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(schema.field_id("Qty"), Some(0));
//! assert_eq!(schema.field("Qty").unwrap().value_at(0), Value::Int64(25));
//! ```

#![no_std]

extern crate alloc;

mod bitset;
mod error;
mod field;
mod mapping;
mod resolver;
pub mod schema;
mod types;
mod value;

pub use bitset::{BitSet, FieldBitSet, Ones};
pub use error::{Error, Result};
pub use field::{
    row_value, ArrayField, Field, FieldRef, FnField, IdentityRowMapper, MappedField,
    RowIdentityField, RowIndex, RowMapper, WritableField, WritableFieldRef, NO_ROW,
};
pub use mapping::{FieldMapping, FieldMappingBuilder};
pub use resolver::{FieldResolver, SchemaFieldResolver};
pub use schema::{Metadata, Schema, SchemaBuilder, SchemaField};
pub use types::DataType;
pub use value::Value;

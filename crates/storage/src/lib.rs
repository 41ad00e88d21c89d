//! Weft Storage - key-indexed in-memory source tables.
//!
//! A [`KeyedTable`] stores rows addressed by a unique key value and publishes every
//! batch of adds, changes and removes through a
//! [`TransformOutput`](weft_incremental::TransformOutput), so operators can be
//! attached to it like to any other output.
//!
//! # Example
//!
//! ```rust
//! use weft_core::{DataType, Value};
//! use weft_storage::KeyedTableBuilder;
//!
//! let mut orders = KeyedTableBuilder::new("orders", "OrderId", DataType::Int32)
//!     .add_field("Qty", DataType::Int64)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! orders.add_row(Value::Int32(1), &[("Qty", Value::Int64(10))]).unwrap();
//! orders.fire_changes();
//!
//! assert_eq!(orders.value(&Value::Int32(1), "Qty"), Some(Value::Int64(10)));
//! ```

#![no_std]

extern crate alloc;

pub mod table;

pub use table::{KeyedTable, KeyedTableBuilder};

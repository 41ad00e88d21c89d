//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use weft_core::{DataType, Value};
use weft_incremental::{CaptureInput, CapturedEvent, TransformOutput};
use weft_storage::{KeyedTable, KeyedTableBuilder};

pub fn int(v: i32) -> Value {
    Value::Int32(v)
}

pub fn long(v: i64) -> Value {
    Value::Int64(v)
}

pub fn text(v: &str) -> Value {
    Value::from(v)
}

/// Builds the `values` list of a captured event.
pub fn values(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn added(row: usize, pairs: &[(&str, Value)]) -> CapturedEvent {
    CapturedEvent::Added {
        row,
        values: values(pairs),
    }
}

pub fn changed(row: usize, pairs: &[(&str, Value)]) -> CapturedEvent {
    CapturedEvent::Changed {
        row,
        values: values(pairs),
    }
}

pub fn removed(row: usize) -> CapturedEvent {
    CapturedEvent::Removed { row }
}

pub fn schema(names: &[&str]) -> CapturedEvent {
    CapturedEvent::Schema(Some(names.iter().map(|n| n.to_string()).collect()))
}

/// Builds a table keyed by an Int32 field.
pub fn table(name: &str, key: &str, fields: &[(&str, DataType)]) -> KeyedTable {
    let mut builder = KeyedTableBuilder::new(name, key, DataType::Int32);
    for (field, data_type) in fields {
        builder = builder.add_field(*field, *data_type).unwrap();
    }
    builder.build().unwrap()
}

/// Attaches a fresh capture to `output`.
pub fn capture(output: &TransformOutput) -> Rc<RefCell<CaptureInput>> {
    let capture = CaptureInput::shared();
    output.attach(capture.clone());
    capture
}

/// Returns and clears the events recorded by `capture`.
pub fn take(capture: &Rc<RefCell<CaptureInput>>) -> Vec<CapturedEvent> {
    capture.borrow_mut().take_events()
}

/// Field values by name, per row.
pub type RowValues = BTreeMap<usize, BTreeMap<String, Value>>;

/// A downstream copy of an output, maintained only from the events it emits.
#[derive(Default)]
pub struct Mirror {
    rows: RowValues,
}

impl Mirror {
    pub fn apply(&mut self, events: Vec<CapturedEvent>) {
        for event in events {
            match event {
                CapturedEvent::Schema(_) => self.rows.clear(),
                CapturedEvent::Added { row, values } => {
                    self.rows.insert(row, values.into_iter().collect());
                }
                CapturedEvent::Changed { row, values } => {
                    let entry = self.rows.entry(row).or_default();
                    entry.extend(values);
                }
                CapturedEvent::Removed { row } => {
                    self.rows.remove(&row);
                }
            }
        }
    }

    pub fn rows(&self) -> &RowValues {
        &self.rows
    }
}

/// Reads every row an output currently holds.
pub fn snapshot(output: &TransformOutput) -> RowValues {
    let Some(schema) = output.schema() else {
        return RowValues::new();
    };
    output
        .rows()
        .into_iter()
        .map(|row| {
            let values = schema
                .fields()
                .iter()
                .map(|f| (f.name().to_string(), f.value_at(row)))
                .collect();
            (row, values)
        })
        .collect()
}

pub fn as_i32(value: &Value) -> i32 {
    match value {
        Value::Int32(v) => *v,
        other => panic!("expected an Int32, got {:?}", other),
    }
}

pub fn as_i64(value: &Value) -> i64 {
    match value {
        Value::Int64(v) => *v,
        other => panic!("expected an Int64, got {:?}", other),
    }
}

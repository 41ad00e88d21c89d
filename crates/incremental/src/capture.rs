//! An input that records everything it receives.

use crate::change::{TransformInput, TransformOutput};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{FieldBitSet, RowIndex, Schema, Value};

/// One event seen by a [`CaptureInput`], with the values read at the time.
#[derive(Clone, Debug, PartialEq)]
pub enum CapturedEvent {
    /// The schema's field names, or `None` when the schema was removed.
    Schema(Option<Vec<String>>),
    /// Every field of an added row.
    Added { row: RowIndex, values: Vec<(String, Value)> },
    /// The changed fields of a changed row.
    Changed { row: RowIndex, values: Vec<(String, Value)> },
    Removed { row: RowIndex },
}

/// Records the schema and events of the output it is attached to.
///
/// Values are read when the event arrives, so the record shows what a downstream
/// input would have seen.
#[derive(Default)]
pub struct CaptureInput {
    schema: Option<Rc<Schema>>,
    source: Option<TransformOutput>,
    events: Vec<CapturedEvent>,
}

impl CaptureInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a capture ready to be attached.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Returns the last schema received.
    pub fn schema(&self) -> Option<Rc<Schema>> {
        self.schema.clone()
    }

    /// Returns the output this input is attached to.
    pub fn source(&self) -> Option<TransformOutput> {
        self.source.clone()
    }

    /// Returns the field names of the last schema received.
    pub fn field_names(&self) -> Vec<String> {
        self.schema
            .iter()
            .flat_map(|s| s.fields().iter().map(|f| String::from(f.name())))
            .collect()
    }

    pub fn events(&self) -> &[CapturedEvent] {
        &self.events
    }

    /// Returns and forgets every recorded event.
    pub fn take_events(&mut self) -> Vec<CapturedEvent> {
        core::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Reads a field of `row` from the current schema.
    pub fn value(&self, row: RowIndex, field: &str) -> Option<Value> {
        self.schema
            .as_ref()
            .and_then(|s| s.field(field))
            .map(|f| f.value_at(row))
    }

    /// Reads every field of `row` from the current schema.
    pub fn row_values(&self, row: RowIndex) -> Vec<(String, Value)> {
        self.read(row, |_| true)
    }

    fn read(&self, row: RowIndex, include: impl Fn(usize) -> bool) -> Vec<(String, Value)> {
        self.schema
            .iter()
            .flat_map(|s| s.fields().iter())
            .filter(|f| include(f.field_id()))
            .map(|f| (String::from(f.name()), f.value_at(row)))
            .collect()
    }
}

impl TransformInput for CaptureInput {
    fn set_source(&mut self, source: Option<TransformOutput>) {
        self.source = source;
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        self.schema = schema;
        let names = self.schema.as_ref().map(|_| self.field_names());
        self.events.push(CapturedEvent::Schema(names));
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        for &row in rows {
            let values = self.row_values(row);
            self.events.push(CapturedEvent::Added { row, values });
        }
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed_fields: &FieldBitSet) {
        for &row in rows {
            let values = self.read(row, |id| changed_fields.get(id));
            self.events.push(CapturedEvent::Changed { row, values });
        }
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        for &row in rows {
            self.events.push(CapturedEvent::Removed { row });
        }
    }
}

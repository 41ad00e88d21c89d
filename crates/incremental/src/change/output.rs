//! The upstream side of an operator edge.

use super::input::InputRef;
use super::provider::RowProvider;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use tracing::debug;
use weft_core::{FieldBitSet, RowIndex, Schema};

/// Holds the schema and attached inputs of one operator output.
pub struct OutputManager {
    schema: Option<Rc<Schema>>,
    inputs: Vec<InputRef>,
    rows: Box<dyn RowProvider>,
}

impl OutputManager {
    fn new(rows: Box<dyn RowProvider>) -> Self {
        Self {
            schema: None,
            inputs: Vec::new(),
            rows,
        }
    }
}

/// Clonable handle to an [`OutputManager`].
///
/// Notifications iterate over a snapshot of the attached inputs, so an input may
/// attach or detach inputs from inside a callback.
#[derive(Clone)]
pub struct TransformOutput {
    inner: Rc<RefCell<OutputManager>>,
}

#[inline]
fn same_input(a: &InputRef, b: &InputRef) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

impl TransformOutput {
    /// Creates an output whose current rows come from `rows`.
    pub fn new(rows: impl RowProvider + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(OutputManager::new(Box::new(rows)))),
        }
    }

    /// Returns the current schema.
    pub fn schema(&self) -> Option<Rc<Schema>> {
        self.inner.borrow().schema.clone()
    }

    /// Returns the number of attached inputs.
    pub fn input_count(&self) -> usize {
        self.inner.borrow().inputs.len()
    }

    /// Returns true if both handles refer to the same output.
    pub fn ptr_eq(&self, other: &TransformOutput) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Calls `f` for every row currently held by this output.
    pub fn for_each_row(&self, f: &mut dyn FnMut(RowIndex)) {
        self.inner.borrow().rows.for_each_row(f);
    }

    /// Returns the rows currently held by this output.
    pub fn rows(&self) -> Vec<RowIndex> {
        let mut rows = Vec::new();
        self.for_each_row(&mut |row| rows.push(row));
        rows
    }

    /// Attaches an input and brings it up to date.
    ///
    /// The input receives `set_source`, then, if a schema is present, the schema and
    /// every current row as a single add.
    pub fn attach(&self, input: InputRef) {
        let schema = {
            let mut inner = self.inner.borrow_mut();
            if inner.inputs.iter().any(|i| same_input(i, &input)) {
                return;
            }
            inner.inputs.push(input.clone());
            inner.schema.clone()
        };
        debug!(inputs = self.input_count(), "input attached");
        input.borrow_mut().set_source(Some(self.clone()));
        if let Some(schema) = schema {
            input.borrow_mut().schema_updated(Some(schema));
            let rows = self.rows();
            if !rows.is_empty() {
                input.borrow_mut().rows_added(&rows);
            }
        }
    }

    /// Detaches an input. The input receives a `None` schema and a `None` source.
    pub fn detach(&self, input: &InputRef) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            match inner.inputs.iter().position(|i| same_input(i, input)) {
                Some(pos) => {
                    inner.inputs.remove(pos);
                    true
                }
                None => false,
            }
        };
        if removed {
            debug!(inputs = self.input_count(), "input detached");
            input.borrow_mut().schema_updated(None);
            input.borrow_mut().set_source(None);
        }
    }

    fn inputs(&self) -> Vec<InputRef> {
        self.inner.borrow().inputs.clone()
    }

    /// Replaces the schema and announces it to every input.
    pub fn update_schema(&self, schema: Option<Rc<Schema>>) {
        self.inner.borrow_mut().schema = schema.clone();
        for input in self.inputs() {
            input.borrow_mut().schema_updated(schema.clone());
        }
    }

    /// Sends added rows to every input.
    pub fn notify_adds(&self, rows: &[RowIndex]) {
        if rows.is_empty() {
            return;
        }
        for input in self.inputs() {
            input.borrow_mut().rows_added(rows);
        }
    }

    /// Sends changed rows to every input.
    pub fn notify_changes(&self, rows: &[RowIndex], changed_fields: &FieldBitSet) {
        if rows.is_empty() {
            return;
        }
        for input in self.inputs() {
            input.borrow_mut().rows_changed(rows, changed_fields);
        }
    }

    /// Sends removed rows to every input.
    pub fn notify_removes(&self, rows: &[RowIndex]) {
        if rows.is_empty() {
            return;
        }
        for input in self.inputs() {
            input.borrow_mut().rows_removed(rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{BitSetRowProvider, TransformInput};
    use alloc::string::String;
    use alloc::vec;
    use alloc::format;
    use weft_core::{ArrayField, BitSet, DataType, SchemaBuilder};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        has_source: bool,
    }

    impl TransformInput for Recorder {
        fn set_source(&mut self, source: Option<TransformOutput>) {
            self.has_source = source.is_some();
        }

        fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
            let name = schema.map(|s| String::from(s.name())).unwrap_or_default();
            self.events.push(format!("schema {}", name));
        }

        fn rows_added(&mut self, rows: &[RowIndex]) {
            self.events.push(format!("add {:?}", rows));
        }

        fn rows_changed(&mut self, rows: &[RowIndex], changed_fields: &FieldBitSet) {
            self.events.push(format!("change {:?} {:?}", rows, changed_fields));
        }

        fn rows_removed(&mut self, rows: &[RowIndex]) {
            self.events.push(format!("remove {:?}", rows));
        }
    }

    fn schema(name: &str) -> Rc<Schema> {
        Rc::new(
            SchemaBuilder::new(name)
                .add_field("A", Rc::new(ArrayField::new(DataType::Int32)))
                .unwrap()
                .build(),
        )
    }

    #[test]
    fn test_attach_replays_schema_and_rows() {
        let rows = Rc::new(RefCell::new(BitSet::from_bits([0, 2])));
        let output = TransformOutput::new(BitSetRowProvider::new(rows));
        output.update_schema(Some(schema("s1")));

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        output.attach(recorder.clone());

        assert!(recorder.borrow().has_source);
        assert_eq!(recorder.borrow().events, vec!["schema s1", "add [0, 2]"]);
        assert_eq!(output.input_count(), 1);
    }

    #[test]
    fn test_attach_without_schema_only_sets_source() {
        let output = TransformOutput::new(crate::change::EmptyRowProvider);
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        output.attach(recorder.clone());
        output.attach(recorder.clone());
        assert!(recorder.borrow().has_source);
        assert!(recorder.borrow().events.is_empty());
        assert_eq!(output.input_count(), 1);
    }

    #[test]
    fn test_detach_sends_null_schema() {
        let output = TransformOutput::new(crate::change::EmptyRowProvider);
        output.update_schema(Some(schema("s1")));
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let input: InputRef = recorder.clone();
        output.attach(input.clone());
        output.detach(&input);
        output.detach(&input);

        assert!(!recorder.borrow().has_source);
        assert_eq!(recorder.borrow().events, vec!["schema s1", "schema "]);
        assert_eq!(output.input_count(), 0);
    }

    #[test]
    fn test_notifications_skip_empty_row_lists() {
        let output = TransformOutput::new(crate::change::EmptyRowProvider);
        output.update_schema(Some(schema("s1")));
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        output.attach(recorder.clone());

        output.notify_adds(&[]);
        output.notify_adds(&[1]);
        output.notify_changes(&[1], &FieldBitSet::from_bits([0]));
        output.notify_removes(&[1]);

        assert_eq!(
            recorder.borrow().events,
            vec!["schema s1", "add [1]", "change [1] {0}", "remove [1]"]
        );
    }
}

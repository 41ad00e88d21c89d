//! A pass-through operator that logs every event.

use crate::change::{
    DelegatedRowProvider, InputRef, SourceSlot, TransformInput, TransformOutput,
};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt::Write;
use tracing::Level;
use weft_core::{FieldBitSet, RowIndex, Schema};

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        if $level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if $level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if $level == Level::INFO {
            tracing::info!($($arg)+)
        } else if $level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

struct LoggerState {
    name: String,
    level: Level,
    enabled: Rc<Cell<bool>>,
    forced_fields: Vec<String>,
    schema: Option<Rc<Schema>>,
    source: SourceSlot,
    output: TransformOutput,
    event_id: u64,
}

impl LoggerState {
    fn next_event(&mut self) -> u64 {
        self.event_id += 1;
        self.event_id
    }

    fn describe_row(&self, row: RowIndex, include: impl Fn(usize, &str) -> bool) -> String {
        let mut text = String::new();
        if let Some(schema) = &self.schema {
            for field in schema.fields() {
                if include(field.field_id(), field.name()) {
                    if !text.is_empty() {
                        text.push_str(", ");
                    }
                    let _ = write!(text, "{}={}", field.name(), field.value_at(row));
                }
            }
        }
        text
    }

    fn log_rows(&mut self, tag: &str, rows: &[RowIndex], changed: Option<&FieldBitSet>) {
        if !self.enabled.get() || rows.is_empty() {
            return;
        }
        let id = self.next_event();
        let level = self.level;
        log_at!(level, "e{} {} {} {} rows", id, self.name, tag, rows.len());
        for &row in rows {
            let text = match changed {
                Some(changed) => self.describe_row(row, |field_id, name| {
                    changed.get(field_id) || self.forced_fields.iter().any(|f| f == name)
                }),
                None => self.describe_row(row, |_, _| true),
            };
            log_at!(level, "e{} {} {} r{}: {}", id, self.name, tag, row, text);
        }
    }
}

struct LoggerInput {
    state: Rc<RefCell<LoggerState>>,
}

impl TransformInput for LoggerInput {
    fn set_source(&mut self, source: Option<TransformOutput>) {
        *self.state.borrow().source.borrow_mut() = source;
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        let output = {
            let mut state = self.state.borrow_mut();
            state.schema = schema.clone();
            if state.enabled.get() {
                let id = state.next_event();
                let level = state.level;
                match &schema {
                    Some(s) => log_at!(level, "e{} {} SCH {}: {:?}", id, state.name, s.name(), s.field_names()),
                    None => log_at!(level, "e{} {} SCH none", id, state.name),
                }
            }
            state.output.clone()
        };
        output.update_schema(schema);
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        let output = {
            let mut state = self.state.borrow_mut();
            state.log_rows("ADD", rows, None);
            state.output.clone()
        };
        output.notify_adds(rows);
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed_fields: &FieldBitSet) {
        let output = {
            let mut state = self.state.borrow_mut();
            state.log_rows("CHG", rows, Some(changed_fields));
            state.output.clone()
        };
        output.notify_changes(rows, changed_fields);
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        let output = {
            let mut state = self.state.borrow_mut();
            state.log_rows("REM", rows, None);
            state.output.clone()
        };
        output.notify_removes(rows);
    }
}

/// Logs every event passing through and forwards it unchanged.
///
/// Removed rows are logged with the values still readable when the removal arrives.
pub struct OutputLogger {
    input: InputRef,
    output: TransformOutput,
    enabled: Rc<Cell<bool>>,
}

impl OutputLogger {
    pub fn input(&self) -> InputRef {
        self.input.clone()
    }

    pub fn output(&self) -> TransformOutput {
        self.output.clone()
    }

    /// Turns logging on or off. Events are forwarded either way.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

/// Builder for [`OutputLogger`].
pub struct OutputLoggerBuilder {
    name: String,
    level: Level,
    enabled: bool,
    forced_fields: Vec<String>,
}

impl OutputLoggerBuilder {
    /// Starts a logger that logs at `INFO`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: Level::INFO,
            enabled: true,
            forced_fields: Vec::new(),
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Always prints these fields on changes, even when they did not change.
    pub fn force_fields<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.forced_fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> OutputLogger {
        let source: SourceSlot = Rc::new(RefCell::new(None));
        let output = TransformOutput::new(DelegatedRowProvider::new(source.clone()));
        let enabled = Rc::new(Cell::new(self.enabled));
        let state = Rc::new(RefCell::new(LoggerState {
            name: self.name,
            level: self.level,
            enabled: enabled.clone(),
            forced_fields: self.forced_fields,
            schema: None,
            source,
            output: output.clone(),
            event_id: 0,
        }));
        OutputLogger {
            input: Rc::new(RefCell::new(LoggerInput { state })),
            output,
            enabled,
        }
    }
}

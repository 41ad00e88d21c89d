//! The Join operator.

use super::lookup::LookupJoinMapper;
use super::schema::{JoinSchemaBuilder, JoinSide, JoinSideBinding};
use super::tracker::JoinChangeTracker;
use crate::change::{BitSetRowProvider, InputRef, TransformInput, TransformOutput};
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use tracing::{debug, error, trace};
use weft_core::{Error, FieldBitSet, Result, RowIndex, Schema};

#[derive(Default)]
struct SideState {
    schema: Option<Rc<Schema>>,
    source: Option<TransformOutput>,
    binding: JoinSideBinding,
}

pub(crate) struct JoinState {
    schema_builder: JoinSchemaBuilder,
    mapper: LookupJoinMapper,
    tracker: JoinChangeTracker,
    output: TransformOutput,
    left: SideState,
    right: SideState,
    bound: bool,
    last_error: Option<Error>,
}

impl JoinState {
    fn side_mut(&mut self, side: JoinSide) -> &mut SideState {
        match side {
            JoinSide::Left => &mut self.left,
            JoinSide::Right => &mut self.right,
        }
    }

    fn teardown(&mut self) {
        self.mapper.reset();
        self.mapper.interner_mut().unbind_schemas();
        self.tracker.reset();
        self.left.binding = JoinSideBinding::default();
        self.right.binding = JoinSideBinding::default();
        self.bound = false;
    }

    fn bind(&mut self) -> Result<Option<Rc<Schema>>> {
        let (Some(left), Some(right)) = (self.left.schema.clone(), self.right.schema.clone()) else {
            return Ok(None);
        };
        let left_mapper = self.mapper.left_row_mapper();
        let right_mapper = self.mapper.right_row_mapper();
        let joined = self.schema_builder.build_schema(
            &left,
            &right,
            self.mapper.interner_mut(),
            left_mapper,
            right_mapper,
        )?;
        self.tracker.set_outbound_field_ids(
            joined.left.out_field_ids.clone(),
            joined.right.out_field_ids.clone(),
            joined.schema.len(),
        );
        self.left.binding = joined.left;
        self.right.binding = joined.right;
        self.bound = true;
        Ok(Some(joined.schema))
    }

    fn schema_updated(&mut self, side: JoinSide, schema: Option<Rc<Schema>>) {
        let was_bound = self.bound;
        self.side_mut(side).schema = schema;
        if was_bound {
            self.teardown();
        }
        match self.bind() {
            Ok(Some(schema)) => {
                debug!(
                    operator = self.schema_builder.name(),
                    fields = schema.len(),
                    "schema bound"
                );
                self.last_error = None;
                self.output.update_schema(Some(schema));
                let other = match side {
                    JoinSide::Left => JoinSide::Right,
                    JoinSide::Right => JoinSide::Left,
                };
                let rows = match &self.side_mut(other).source {
                    Some(source) => source.rows(),
                    None => alloc::vec::Vec::new(),
                };
                self.rows_added(other, &rows);
            }
            Ok(None) => {
                if was_bound {
                    debug!(operator = self.schema_builder.name(), side = %side, "schema torn down");
                    self.output.update_schema(None);
                }
            }
            Err(err) => {
                error!(
                    operator = self.schema_builder.name(),
                    error = %err,
                    "failed to bind schemas"
                );
                self.teardown();
                self.last_error = Some(err);
                if was_bound {
                    self.output.update_schema(None);
                }
            }
        }
    }

    fn rows_added(&mut self, side: JoinSide, rows: &[RowIndex]) {
        if !self.bound || rows.is_empty() {
            return;
        }
        for &row in rows {
            match side {
                JoinSide::Left => self.mapper.left_row_added(row, &mut self.tracker),
                JoinSide::Right => self.mapper.right_row_added(row, &mut self.tracker),
            }
        }
        self.fire(side);
    }

    fn rows_changed(&mut self, side: JoinSide, rows: &[RowIndex], changed: &FieldBitSet) {
        if !self.bound {
            return;
        }
        let binding = match side {
            JoinSide::Left => &self.left.binding,
            JoinSide::Right => &self.right.binding,
        };
        let reevaluate_key = changed.intersects(&binding.key_dependencies);
        let tracker = &mut self.tracker;
        binding
            .field_mapping
            .translate_inbound_change_set(changed, |id| tracker.change_field(id));
        for &row in rows {
            match side {
                JoinSide::Left => self.mapper.left_row_changed(row, reevaluate_key, &mut *tracker),
                JoinSide::Right => self.mapper.right_row_changed(row, reevaluate_key, &mut *tracker),
            }
        }
        self.fire(side);
    }

    fn rows_removed(&mut self, side: JoinSide, rows: &[RowIndex]) {
        if !self.bound {
            return;
        }
        for &row in rows {
            match side {
                JoinSide::Left => self.mapper.left_row_removed(row, &mut self.tracker),
                JoinSide::Right => self.mapper.right_row_removed(row, &mut self.tracker),
            }
        }
        self.fire(side);
    }

    fn fire(&mut self, side: JoinSide) {
        trace!(operator = self.schema_builder.name(), side = %side, "firing join changes");
        self.tracker.fire(&self.output, |_| {});
    }
}

struct JoinInput {
    state: Rc<RefCell<JoinState>>,
    side: JoinSide,
}

impl TransformInput for JoinInput {
    fn set_source(&mut self, source: Option<TransformOutput>) {
        self.state.borrow_mut().side_mut(self.side).source = source;
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        self.state.borrow_mut().schema_updated(self.side, schema);
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        self.state.borrow_mut().rows_added(self.side, rows);
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed_fields: &FieldBitSet) {
        self.state.borrow_mut().rows_changed(self.side, rows, changed_fields);
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        self.state.borrow_mut().rows_removed(self.side, rows);
    }
}

/// Joins a left and a right input on a key.
///
/// The output schema exists only while both inputs have one. Output rows are indexed
/// by left row. Build one with [`JoinBuilder`](super::JoinBuilder).
pub struct Join {
    state: Rc<RefCell<JoinState>>,
    left_input: InputRef,
    right_input: InputRef,
    output: TransformOutput,
}

impl Join {
    pub(crate) fn new(schema_builder: JoinSchemaBuilder, mapper: LookupJoinMapper) -> Self {
        let output = TransformOutput::new(BitSetRowProvider::new(mapper.active_rows()));
        let state = Rc::new(RefCell::new(JoinState {
            schema_builder,
            mapper,
            tracker: JoinChangeTracker::new(),
            output: output.clone(),
            left: SideState::default(),
            right: SideState::default(),
            bound: false,
            last_error: None,
        }));
        let left_input: InputRef = Rc::new(RefCell::new(JoinInput {
            state: state.clone(),
            side: JoinSide::Left,
        }));
        let right_input: InputRef = Rc::new(RefCell::new(JoinInput {
            state: state.clone(),
            side: JoinSide::Right,
        }));
        Self {
            state,
            left_input,
            right_input,
            output,
        }
    }

    pub fn left_input(&self) -> InputRef {
        self.left_input.clone()
    }

    pub fn right_input(&self) -> InputRef {
        self.right_input.clone()
    }

    pub fn output(&self) -> TransformOutput {
        self.output.clone()
    }

    pub fn name(&self) -> String {
        String::from(self.state.borrow().schema_builder.name())
    }

    /// Returns true for an outer join.
    pub fn is_outer(&self) -> bool {
        self.state.borrow().mapper.is_outer()
    }

    /// Returns the error of the last failed bind, if the Join is unbound because of one.
    pub fn last_error(&self) -> Option<Error> {
        self.state.borrow().last_error.clone()
    }
}

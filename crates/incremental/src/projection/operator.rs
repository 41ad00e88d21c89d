//! The Projection operator.

use super::schema::{ProjectionDependencyMap, ProjectionLayout};
use crate::change::{
    DelegatedRowProvider, InputRef, SourceSlot, StateChangeSet, TransformInput, TransformOutput,
};
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use tracing::{debug, error, trace};
use weft_core::{Error, FieldBitSet, RowIndex, Schema};

pub(crate) struct ProjectionState {
    layout: ProjectionLayout,
    dependencies: ProjectionDependencyMap,
    state_change: StateChangeSet,
    source: SourceSlot,
    output: TransformOutput,
    bound: bool,
    last_error: Option<Error>,
}

impl ProjectionState {
    pub(crate) fn new(layout: ProjectionLayout) -> Self {
        let source: SourceSlot = Rc::new(RefCell::new(None));
        Self {
            layout,
            dependencies: ProjectionDependencyMap::new(),
            state_change: StateChangeSet::new(),
            output: TransformOutput::new(DelegatedRowProvider::new(source.clone())),
            source,
            bound: false,
            last_error: None,
        }
    }

    fn teardown(&mut self) {
        self.layout.unbind_calculations();
        self.dependencies.reset();
        self.state_change.reset();
        self.bound = false;
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        self.teardown();
        let Some(schema) = schema else {
            debug!(operator = %self.layout.name, "inbound schema removed");
            self.output.update_schema(None);
            return;
        };
        match self
            .layout
            .build_outbound_schema(&schema, &mut self.dependencies)
        {
            Ok(outbound) => {
                debug!(
                    operator = %self.layout.name,
                    inbound = schema.name(),
                    fields = outbound.len(),
                    "schema bound"
                );
                self.state_change.set_field_count(outbound.len());
                self.bound = true;
                self.last_error = None;
                self.output.update_schema(Some(outbound));
            }
            Err(err) => {
                error!(operator = %self.layout.name, error = %err, "failed to bind schema");
                self.teardown();
                self.last_error = Some(err);
                self.output.update_schema(None);
            }
        }
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        if !self.bound {
            return;
        }
        for &row in rows {
            self.state_change.add_row(row);
        }
        self.fire();
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed: &FieldBitSet) {
        if !self.bound {
            return;
        }
        let mut outbound = FieldBitSet::new();
        self.dependencies
            .translate_inbound_change_fields(changed, &mut outbound);
        if outbound.is_empty() {
            trace!(operator = %self.layout.name, "change touches no projected field");
            return;
        }
        for &row in rows {
            self.state_change.change_row(row);
        }
        self.state_change.change_fields(&outbound);
        self.fire();
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        if !self.bound {
            return;
        }
        for &row in rows {
            self.state_change.remove_row(row);
        }
        self.fire();
    }

    fn fire(&mut self) {
        self.state_change.fire(&self.output, |_| {});
    }
}

struct ProjectionInput {
    state: Rc<RefCell<ProjectionState>>,
}

impl TransformInput for ProjectionInput {
    fn set_source(&mut self, source: Option<TransformOutput>) {
        let state = self.state.borrow();
        *state.source.borrow_mut() = source;
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        self.state.borrow_mut().schema_updated(schema);
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        self.state.borrow_mut().rows_added(rows);
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed_fields: &FieldBitSet) {
        self.state.borrow_mut().rows_changed(rows, changed_fields);
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        self.state.borrow_mut().rows_removed(rows);
    }
}

/// Reshapes the fields of its input: selects, renames, reorders and adds lazily
/// calculated fields.
///
/// Rows pass through unchanged. A change is forwarded only when it touches a
/// projected field or a dependency of a calculated one. Build one with
/// [`ProjectionBuilder`](super::ProjectionBuilder).
pub struct Projection {
    state: Rc<RefCell<ProjectionState>>,
    input: InputRef,
    output: TransformOutput,
}

impl Projection {
    pub(crate) fn new(state: ProjectionState) -> Self {
        let output = state.output.clone();
        let state = Rc::new(RefCell::new(state));
        let input: InputRef = Rc::new(RefCell::new(ProjectionInput {
            state: state.clone(),
        }));
        Self {
            state,
            input,
            output,
        }
    }

    pub fn input(&self) -> InputRef {
        self.input.clone()
    }

    pub fn output(&self) -> TransformOutput {
        self.output.clone()
    }

    pub fn name(&self) -> String {
        self.state.borrow().layout.name.clone()
    }

    /// Returns the error of the last failed schema bind, if the operator is unbound
    /// because of one.
    pub fn last_error(&self) -> Option<Error> {
        self.state.borrow().last_error.clone()
    }
}

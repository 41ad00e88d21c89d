//! The Filter operator.

use super::passing::{PassingRowMapper, PassingRows};
use super::predicate::{ConstantPredicate, RowPredicate};
use crate::change::{BitSetRowProvider, InputRef, StateChangeSet, TransformInput, TransformOutput};
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use tracing::{debug, error, trace};
use weft_core::{
    Error, FieldBitSet, FieldMapping, MappedField, Result, RowIndex, Schema, SchemaBuilder,
    SchemaFieldResolver, NO_ROW,
};

pub(crate) struct FilterState {
    name: String,
    passes_by_default: bool,
    predicate: Box<dyn RowPredicate>,
    dependencies: FieldBitSet,
    passing: Rc<RefCell<PassingRows>>,
    state_change: StateChangeSet,
    field_mapping: FieldMapping,
    inbound: Option<Rc<Schema>>,
    bound: bool,
    source: Option<TransformOutput>,
    output: TransformOutput,
    last_error: Option<Error>,
}

impl FilterState {
    pub(crate) fn new(
        name: String,
        capacity: usize,
        passes_by_default: bool,
        predicate: Option<Box<dyn RowPredicate>>,
    ) -> Self {
        let passing = PassingRows::with_capacity(capacity);
        let output = TransformOutput::new(BitSetRowProvider::new(passing.active()));
        Self {
            name,
            passes_by_default,
            predicate: predicate.unwrap_or_else(|| default_predicate(passes_by_default)),
            dependencies: FieldBitSet::new(),
            passing: Rc::new(RefCell::new(passing)),
            state_change: StateChangeSet::new(),
            field_mapping: FieldMapping::default(),
            inbound: None,
            bound: false,
            source: None,
            output,
            last_error: None,
        }
    }

    fn predicate_context(&self) -> String {
        format!("predicate of Filter '{}'", self.name)
    }

    fn teardown(&mut self) {
        self.predicate.unbind_schema();
        self.dependencies.clear();
        self.passing.borrow_mut().clear();
        self.state_change.reset();
        self.field_mapping = FieldMapping::default();
        self.bound = false;
    }

    fn bind(&mut self, schema: &Schema) -> Result<Rc<Schema>> {
        let mut resolver = SchemaFieldResolver::new(schema, self.predicate_context());
        self.predicate.bind_to_schema(&mut resolver)?;
        self.dependencies = resolver.into_dependencies();

        let mapper = Rc::new(PassingRowMapper::new(self.passing.clone()));
        let mut builder = SchemaBuilder::new(self.name.clone());
        let mut mapping = FieldMapping::builder();
        for in_field in schema.fields() {
            let field = MappedField::new(in_field.field().clone(), mapper.clone());
            let id = builder.push(
                String::from(in_field.name()),
                Rc::new(field),
                in_field.metadata().clone(),
            )?;
            mapping.map_inbound_to_outbound(in_field.field_id(), id);
        }
        self.field_mapping = mapping.build();
        let outbound = builder.build();
        self.state_change.set_field_count(outbound.len());
        self.bound = true;
        Ok(Rc::new(outbound))
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        self.teardown();
        self.inbound = schema.clone();
        let Some(schema) = schema else {
            debug!(operator = %self.name, "inbound schema removed");
            self.output.update_schema(None);
            return;
        };
        match self.bind(&schema) {
            Ok(outbound) => {
                debug!(
                    operator = %self.name,
                    inbound = schema.name(),
                    dependencies = self.dependencies.count_ones(),
                    "schema bound"
                );
                self.last_error = None;
                self.output.update_schema(Some(outbound));
            }
            Err(err) => {
                error!(operator = %self.name, error = %err, "failed to bind schema");
                self.teardown();
                self.last_error = Some(err);
                self.output.update_schema(None);
            }
        }
    }

    /// Swaps the predicate and tests every source row against it.
    ///
    /// A predicate that cannot be bound to the current schema is rejected and the
    /// previous one stays in place. If the previous predicate had failed to bind,
    /// the schema is bound again with the new one.
    fn update_predicate(&mut self, predicate: Option<Box<dyn RowPredicate>>) -> Result<()> {
        let mut predicate = predicate.unwrap_or_else(|| default_predicate(self.passes_by_default));
        let Some(schema) = self.inbound.clone() else {
            self.predicate.unbind_schema();
            self.predicate = predicate;
            return Ok(());
        };
        if !self.bound {
            self.predicate = predicate;
            self.schema_updated(Some(schema));
            if let Some(err) = &self.last_error {
                return Err(err.clone());
            }
        } else {
            let mut resolver = SchemaFieldResolver::new(&schema, self.predicate_context());
            predicate.bind_to_schema(&mut resolver)?;
            self.predicate.unbind_schema();
            self.predicate = predicate;
            self.dependencies = resolver.into_dependencies();
        }
        debug!(operator = %self.name, "predicate updated");
        if let Some(source) = self.source.clone() {
            for row in source.rows() {
                self.retest(row, false);
            }
            self.fire();
        }
        Ok(())
    }

    /// Tests `row` again and records the transition. `changed` also reports rows
    /// that keep passing as changed.
    fn retest(&mut self, row: RowIndex, changed: bool) {
        let passes = self.predicate.test_row(row);
        let mut passing = self.passing.borrow_mut();
        match (passing.outbound_of(row), passes) {
            (Some(out), true) => {
                if changed {
                    self.state_change.change_row(out);
                }
            }
            (None, true) => {
                if let Some(out) = passing.insert(row) {
                    self.state_change.add_row(out);
                }
            }
            (Some(out), false) => {
                passing.remove_and_reserve(out);
                self.state_change.remove_row(out);
            }
            (None, false) => {}
        }
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        if !self.bound {
            return;
        }
        for &row in rows {
            if self.predicate.test_row(row) {
                if let Some(out) = self.passing.borrow_mut().insert(row) {
                    self.state_change.add_row(out);
                }
            }
        }
        self.fire();
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed: &FieldBitSet) {
        if !self.bound {
            return;
        }
        let state_change = &mut self.state_change;
        self.field_mapping
            .translate_inbound_change_set(changed, |id| state_change.change_field(id));
        if changed.intersects(&self.dependencies) {
            for &row in rows {
                self.retest(row, true);
            }
        } else {
            let passing = self.passing.borrow();
            for &row in rows {
                if let Some(out) = passing.outbound_of(row) {
                    self.state_change.change_row(out);
                }
            }
        }
        self.fire();
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        if !self.bound {
            return;
        }
        {
            let mut passing = self.passing.borrow_mut();
            for &row in rows {
                if let Some(out) = passing.outbound_of(row) {
                    passing.remove_and_reserve(out);
                    self.state_change.remove_row(out);
                }
            }
        }
        self.fire();
    }

    fn fire(&mut self) {
        trace!(operator = %self.name, passing = self.passing.borrow().len(), "firing filter changes");
        let passing = &self.passing;
        self.state_change
            .fire(&self.output, |out| passing.borrow_mut().free_reserved(out));
    }
}

fn default_predicate(passes: bool) -> Box<dyn RowPredicate> {
    Box::new(if passes {
        ConstantPredicate::passes()
    } else {
        ConstantPredicate::fails()
    })
}

struct FilterInput {
    state: Rc<RefCell<FilterState>>,
}

impl TransformInput for FilterInput {
    fn set_source(&mut self, source: Option<TransformOutput>) {
        self.state.borrow_mut().source = source;
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

/// Forwards the inbound rows that pass a [`RowPredicate`].
///
/// Passing rows are published under dense outbound row ids. A row whose predicate
/// inputs change is tested again and may be added to or removed from the output.
/// Build one with [`FilterBuilder`](super::FilterBuilder).
pub struct Filter {
    state: Rc<RefCell<FilterState>>,
    input: InputRef,
    output: TransformOutput,
}

impl Filter {
    pub(crate) fn new(state: FilterState) -> Self {
        let output = state.output.clone();
        let state = Rc::new(RefCell::new(state));
        let input: InputRef = Rc::new(RefCell::new(FilterInput {
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
        self.state.borrow().name.clone()
    }

    /// Replaces the predicate and re-evaluates every source row in one batch.
    ///
    /// `None` restores the default predicate, which passes or fails every row
    /// depending on how the filter was built.
    pub fn update_predicate(&self, predicate: Option<Box<dyn RowPredicate>>) -> Result<()> {
        self.state.borrow_mut().update_predicate(predicate)
    }

    /// Returns the inbound row behind an outbound row.
    pub fn source_row_of(&self, row: RowIndex) -> Option<RowIndex> {
        let state = self.state.borrow();
        let source = state.passing.borrow().source_row_of(row);
        (source != NO_ROW).then_some(source)
    }

    /// Returns the error of the last failed schema bind, if the operator is unbound
    /// because of one.
    pub fn last_error(&self) -> Option<Error> {
        self.state.borrow().last_error.clone()
    }
}

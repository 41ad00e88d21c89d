//! The incremental GroupBy operator.

use super::aggregation::{AggregationFunction, FieldDescriptor, OutboundFieldResolver, TrackedField};
use super::cache::Cache;
use super::dependency::{function_context, DependencyMap, GroupFunctionBinding};
use super::mapping::{GroupMapping, GroupRowMods, NO_GROUP};
use super::schema::GroupByLayout;
use crate::change::{
    BitSetRowProvider, DelegatedRowProvider, InputRef, SourceSlot, StateChangeSet,
    TransformInput, TransformOutput,
};
use crate::interner::RowInterner;
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use tracing::{debug, error, trace};
use weft_core::{
    ArrayField, BitSet, Error, FieldBitSet, FieldMapping, Result, RowIndex, Schema,
    SchemaFieldResolver, WritableFieldRef,
};

/// Resolves the calculated fields of the parent schema for aggregation functions.
struct CalculatedResolver<'a> {
    operator: &'a str,
    descriptors: &'a [FieldDescriptor],
    stores: &'a [(Rc<ArrayField>, usize)],
    changes: &'a Rc<RefCell<FieldBitSet>>,
}

impl OutboundFieldResolver for CalculatedResolver<'_> {
    fn get_writable_field(&mut self, name: &str) -> Result<WritableFieldRef> {
        let index = self
            .descriptors
            .iter()
            .position(|d| d.name() == name)
            .ok_or_else(|| {
                Error::field_not_found(
                    name,
                    format!("calculated fields of GroupBy '{}'", self.operator),
                    self.operator,
                )
            })?;
        let (store, field_id) = &self.stores[index];
        Ok(Rc::new(TrackedField::new(
            store.clone(),
            *field_id,
            self.changes.clone(),
        )))
    }
}

/// Everything a GroupBy needs, assembled by the builder.
pub(crate) struct GroupByParts {
    pub layout: GroupByLayout,
    pub capacity: usize,
    pub interner: Box<dyn RowInterner>,
    pub functions: Vec<Box<dyn AggregationFunction>>,
    pub cached_fields: Vec<String>,
}

pub(crate) struct GroupByState {
    layout: GroupByLayout,
    capacity: usize,
    interner: Box<dyn RowInterner>,
    functions: Vec<Box<dyn AggregationFunction>>,
    mapping: Rc<RefCell<GroupMapping>>,
    dependency_map: DependencyMap,
    group_binding: GroupFunctionBinding,
    cache: Cache,
    added: GroupRowMods,
    changed: GroupRowMods,
    removed: GroupRowMods,
    state_change: StateChangeSet,
    aggregation_changes: Rc<RefCell<FieldBitSet>>,
    active_groups: Rc<RefCell<BitSet>>,
    first_row_fields: FieldBitSet,
    calculated: Vec<Rc<ArrayField>>,
    parent_output: TransformOutput,
    child_output: TransformOutput,
    source: SourceSlot,
    child_mapping: FieldMapping,
    child_group_field_id: Option<usize>,
    in_schema: Option<Rc<Schema>>,
    last_error: Option<Error>,
}

impl GroupByState {
    fn new(parts: GroupByParts) -> Self {
        let capacity = parts.capacity;
        let active_groups = Rc::new(RefCell::new(BitSet::with_capacity(capacity)));
        let source: SourceSlot = Rc::new(RefCell::new(None));
        Self {
            layout: parts.layout,
            capacity,
            interner: parts.interner,
            functions: parts.functions,
            mapping: Rc::new(RefCell::new(GroupMapping::with_capacity(capacity))),
            dependency_map: DependencyMap::new(),
            group_binding: GroupFunctionBinding::default(),
            cache: Cache::new(parts.cached_fields, capacity),
            added: GroupRowMods::new(),
            changed: GroupRowMods::new(),
            removed: GroupRowMods::new(),
            state_change: StateChangeSet::new(),
            aggregation_changes: Rc::new(RefCell::new(FieldBitSet::new())),
            parent_output: TransformOutput::new(BitSetRowProvider::new(active_groups.clone())),
            active_groups,
            first_row_fields: FieldBitSet::new(),
            calculated: Vec::new(),
            child_output: TransformOutput::new(DelegatedRowProvider::new(source.clone())),
            source,
            child_mapping: FieldMapping::default(),
            child_group_field_id: None,
            in_schema: None,
            last_error: None,
        }
    }

    fn teardown(&mut self) {
        for function in &mut self.functions {
            function.unbind_schema();
        }
        self.interner.unbind_schema();
        self.cache.unbind();
        self.mapping.borrow_mut().reset();
        self.dependency_map.reset();
        self.group_binding.reset();
        self.added.clear();
        self.changed.clear();
        self.removed.clear();
        self.state_change.reset();
        self.aggregation_changes.borrow_mut().clear();
        self.active_groups.borrow_mut().clear();
        self.first_row_fields.clear();
        self.calculated.clear();
        self.child_mapping = FieldMapping::default();
        self.child_group_field_id = None;
        self.in_schema = None;
    }

    fn bind(&mut self, schema: &Rc<Schema>) -> Result<(Rc<Schema>, Rc<Schema>)> {
        let mut resolver =
            SchemaFieldResolver::new(schema, format!("group function of GroupBy '{}'", self.layout.name));
        self.interner.bind_to_schema(&mut resolver)?;
        self.group_binding = GroupFunctionBinding::new(resolver.into_dependencies(), schema);

        let parent = self.layout.build_parent_schema(
            schema,
            self.group_binding.field_names(),
            &self.mapping,
            self.capacity,
            &mut self.dependency_map,
        )?;
        self.cache.bind(schema)?;

        for (index, function) in self.functions.iter_mut().enumerate() {
            let mut current =
                self.dependency_map
                    .resolver(schema, index, function_context(&self.layout.name, index));
            let mut previous = self.cache.resolver();
            let mut outbound = CalculatedResolver {
                operator: &self.layout.name,
                descriptors: &self.layout.calculated,
                stores: &parent.calculated,
                changes: &self.aggregation_changes,
            };
            function.bind_to_schema(&mut previous, &mut current, &mut outbound)?;
        }

        let child = self.layout.build_child_schema(schema, &self.mapping)?;
        self.child_mapping = child.mapping;
        self.child_group_field_id = child.group_field_id;
        self.first_row_fields = parent.first_row_fields;
        self.calculated = parent.calculated.into_iter().map(|(store, _)| store).collect();
        self.state_change.set_field_count(parent.schema.len());
        self.in_schema = Some(schema.clone());
        Ok((parent.schema, child.schema))
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) {
        self.teardown();
        let Some(schema) = schema else {
            debug!(operator = %self.layout.name, "inbound schema removed");
            self.parent_output.update_schema(None);
            self.child_output.update_schema(None);
            return;
        };
        match self.bind(&schema) {
            Ok((parent, child)) => {
                debug!(
                    operator = %self.layout.name,
                    inbound = schema.name(),
                    fields = parent.len(),
                    "schema bound"
                );
                self.last_error = None;
                self.parent_output.update_schema(Some(parent));
                self.child_output.update_schema(Some(child));
            }
            Err(err) => {
                error!(operator = %self.layout.name, error = %err, "failed to bind schema");
                self.teardown();
                self.last_error = Some(err);
                self.parent_output.update_schema(None);
                self.child_output.update_schema(None);
            }
        }
    }

    /// Maps `row` into `group` and records the parent-level effect.
    fn enter_group(&mut self, row: RowIndex, group: usize, outbound: &mut FieldBitSet) {
        let was_empty = self.mapping.borrow().group_count(group) == 0;
        self.mapping.borrow_mut().map_row_to_group(row, group);
        if was_empty {
            self.active_groups.borrow_mut().set(group);
            self.state_change.add_row(group);
        } else {
            self.state_change.change_row(group);
            self.dependency_map.mark_count_changed(outbound);
        }
        self.added.add(group, row);
    }

    /// Unmaps `row` from its group and records the parent-level effect.
    fn leave_group(&mut self, row: RowIndex, outbound: &mut FieldBitSet) -> usize {
        let (group, first_changed, now_empty) = {
            let mut mapping = self.mapping.borrow_mut();
            let group = mapping.group_of_row(row);
            if group == NO_GROUP {
                return NO_GROUP;
            }
            let first_before = mapping.first_row(group);
            mapping.unmap_row(row);
            (
                group,
                mapping.first_row(group) != first_before,
                mapping.group_count(group) == 0,
            )
        };
        if now_empty {
            self.active_groups.borrow_mut().unset(group);
            self.state_change.remove_row(group);
        } else {
            self.state_change.change_row(group);
            self.dependency_map.mark_count_changed(outbound);
            if first_changed {
                outbound.union_with(&self.first_row_fields);
            }
        }
        self.removed.add(group, row);
        group
    }

    fn rows_added(&mut self, rows: &[RowIndex]) {
        if self.in_schema.is_none() {
            return;
        }
        let mut outbound = FieldBitSet::new();
        for &row in rows {
            let group = self.interner.intern(row);
            self.enter_group(row, group, &mut outbound);
        }
        for function in &mut self.functions {
            self.added
                .for_each(|group, rows| function.group_rows_added(group, rows));
        }
        self.state_change.change_fields(&outbound);
        self.fire();
        self.cache.update_all(rows);
        self.child_output.notify_adds(rows);
    }

    fn rows_changed(&mut self, rows: &[RowIndex], changed: &FieldBitSet) {
        if self.in_schema.is_none() {
            return;
        }
        let mut outbound = FieldBitSet::new();
        let selected = self
            .dependency_map
            .translate_inbound_change_fields(changed, &mut outbound);
        let forwarded_changed = outbound.intersects(&self.first_row_fields);
        let mut child_changes = FieldBitSet::new();
        self.child_mapping.translate_into(changed, &mut child_changes);

        let regroup = self.group_binding.is_changed(changed);
        let mut moved = false;
        for &row in rows {
            let group = self.mapping.borrow().group_of_row(row);
            if group == NO_GROUP {
                continue;
            }
            let target = if regroup { self.interner.intern(row) } else { group };
            if target != group {
                moved = true;
                self.leave_group(row, &mut outbound);
                self.enter_group(row, target, &mut outbound);
                continue;
            }
            self.changed.add(group, row);
            let is_first = self.mapping.borrow().first_row(group) == row;
            if !selected.is_empty() || (forwarded_changed && is_first) {
                self.state_change.change_row(group);
            }
        }

        let selected: Vec<usize> = if moved {
            if let Some(id) = self.child_group_field_id {
                child_changes.set(id);
            }
            (0..self.functions.len()).collect()
        } else {
            selected
        };
        for index in selected {
            let function = &mut self.functions[index];
            self.removed
                .for_each(|group, rows| function.group_rows_removed(group, rows));
            self.added
                .for_each(|group, rows| function.group_rows_added(group, rows));
            self.changed
                .for_each(|group, rows| function.group_rows_changed(group, rows));
        }

        self.state_change.change_fields(&outbound);
        self.fire();
        self.cache.update_selected(rows, changed);
        if !child_changes.is_empty() {
            self.child_output.notify_changes(rows, &child_changes);
        }
    }

    fn rows_removed(&mut self, rows: &[RowIndex]) {
        if self.in_schema.is_none() {
            return;
        }
        let mut outbound = FieldBitSet::new();
        for &row in rows {
            self.leave_group(row, &mut outbound);
        }
        for function in &mut self.functions {
            self.removed
                .for_each(|group, rows| function.group_rows_removed(group, rows));
        }
        self.state_change.change_fields(&outbound);
        self.fire();
        self.child_output.notify_removes(rows);
    }

    fn fire(&mut self) {
        {
            let mut changes = self.aggregation_changes.borrow_mut();
            self.state_change.change_fields(&changes);
            changes.clear();
        }
        trace!(
            operator = %self.layout.name,
            added = !self.added.is_empty(),
            changed = !self.changed.is_empty(),
            removed = !self.removed.is_empty(),
            "firing group changes"
        );
        let interner = &mut self.interner;
        let calculated = &self.calculated;
        self.state_change.fire(&self.parent_output, |group| {
            interner.free_entry(group);
            for store in calculated {
                store.reset_row(group);
            }
        });
        self.added.clear();
        self.changed.clear();
        self.removed.clear();
    }
}

struct GroupByInput {
    state: Rc<RefCell<GroupByState>>,
}

impl TransformInput for GroupByInput {
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

/// Groups inbound rows by key and maintains per-group aggregates.
///
/// The parent output has one row per non-empty group, indexed by group id. The child
/// output passes every inbound row through, optionally decorated with its group id.
/// Build one with [`GroupByBuilder`](super::GroupByBuilder) and attach
/// [`GroupBy::input`] to a source.
pub struct GroupBy {
    state: Rc<RefCell<GroupByState>>,
    input: InputRef,
    parent_output: TransformOutput,
    child_output: TransformOutput,
}

impl GroupBy {
    pub(crate) fn new(parts: GroupByParts) -> Self {
        let state = GroupByState::new(parts);
        let parent_output = state.parent_output.clone();
        let child_output = state.child_output.clone();
        let state = Rc::new(RefCell::new(state));
        let input: InputRef = Rc::new(RefCell::new(GroupByInput {
            state: state.clone(),
        }));
        Self {
            state,
            input,
            parent_output,
            child_output,
        }
    }

    /// Returns the input to attach to a source output.
    pub fn input(&self) -> InputRef {
        self.input.clone()
    }

    /// Returns the output with one row per group.
    pub fn parent_output(&self) -> TransformOutput {
        self.parent_output.clone()
    }

    /// Returns the output with one row per inbound row.
    pub fn child_output(&self) -> TransformOutput {
        self.child_output.clone()
    }

    /// Returns the operator name.
    pub fn name(&self) -> String {
        self.state.borrow().layout.name.clone()
    }

    /// Returns the error of the last failed schema bind, if the operator is unbound
    /// because of one.
    pub fn last_error(&self) -> Option<Error> {
        self.state.borrow().last_error.clone()
    }

    /// Returns the group of an inbound row, or `None` if the row is not grouped.
    pub fn group_of_row(&self, row: RowIndex) -> Option<usize> {
        let state = self.state.borrow();
        let group = state.mapping.borrow().group_of_row(row);
        (group != NO_GROUP).then_some(group)
    }

    /// Returns the inbound rows of `group`.
    pub fn rows_of_group(&self, group: usize) -> Vec<RowIndex> {
        let state = self.state.borrow();
        let rows = state.mapping.borrow().rows_of(group).collect();
        rows
    }
}

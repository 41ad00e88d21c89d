//! Filter scenarios driven by a keyed table.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use weft_core::{DataType, Error, FieldResolver, Result, RowIndex, Value};
use weft_incremental::{
    CaptureInput, CapturedEvent, FieldPredicate, Filter, FilterBuilder, OrPredicate, RowPredicate,
};
use weft_storage::KeyedTable;

const FIELDS: [&str; 3] = ["Id", "Value1", "Value2"];

fn hundreds() -> FieldPredicate<impl Fn(&Value) -> bool> {
    FieldPredicate::new("Value1", |v| as_i32(v) % 100 == 0)
}

fn below(limit: i32) -> FieldPredicate<impl Fn(&Value) -> bool> {
    FieldPredicate::new("Value1", move |v| as_i32(v) < limit)
}

/// Counts every row test.
struct Counting<P> {
    inner: P,
    tests: Rc<Cell<usize>>,
}

impl<P: RowPredicate> RowPredicate for Counting<P> {
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.inner.bind_to_schema(resolver)
    }

    fn unbind_schema(&mut self) {
        self.inner.unbind_schema();
    }

    fn test_row(&self, row: RowIndex) -> bool {
        self.tests.set(self.tests.get() + 1);
        self.inner.test_row(row)
    }
}

struct Fixture {
    table: KeyedTable,
    filter: Filter,
    out: Rc<RefCell<CaptureInput>>,
}

impl Fixture {
    fn new(builder: FilterBuilder) -> Self {
        let table = table(
            "table",
            "Id",
            &[("Value1", DataType::Int32), ("Value2", DataType::Int32)],
        );
        let filter = builder.build();
        let out = capture(&filter.output());
        table.output().attach(filter.input());
        Self { table, filter, out }
    }

    /// Keys 1 and 3 fail the hundreds predicate, key 2 passes as outbound row 0.
    fn populated(builder: FilterBuilder) -> Self {
        let mut fixture = Self::new(builder);
        fixture.add(1, 98, 77);
        fixture.add(2, 100, 177);
        fixture.add(3, 102, 177);
        fixture.fire();
        fixture.events();
        fixture
    }

    fn add(&mut self, id: i32, value1: i32, value2: i32) {
        self.table
            .add_row(int(id), &[("Value1", int(value1)), ("Value2", int(value2))])
            .unwrap();
    }

    fn change(&mut self, id: i32, field: &str, value: i32) {
        self.table.change_row(&int(id), &[(field, int(value))]).unwrap();
    }

    fn remove(&mut self, id: i32) {
        self.table.remove_row(&int(id)).unwrap();
    }

    fn fire(&mut self) {
        self.table.fire_changes();
    }

    fn events(&self) -> Vec<CapturedEvent> {
        take(&self.out)
    }
}

fn hundreds_filter() -> FilterBuilder {
    FilterBuilder::new("filter").initial_predicate(hundreds())
}

fn row(id: i32, value1: i32, value2: i32) -> [(&'static str, Value); 3] {
    [("Id", int(id)), ("Value1", int(value1)), ("Value2", int(value2))]
}

#[test]
fn test_emits_inbound_schema() {
    let fixture = Fixture::new(FilterBuilder::new("filter"));
    assert_eq!(fixture.events(), vec![schema(&FIELDS)]);
    assert_eq!(fixture.filter.name(), "filter");
}

#[test]
fn test_detach_sends_null_schema() {
    let fixture = Fixture::new(FilterBuilder::new("filter"));
    fixture.events();
    fixture.table.output().detach(&fixture.filter.input());
    assert_eq!(fixture.events(), vec![CapturedEvent::Schema(None)]);
}

#[test]
fn test_passes_when_no_predicate() {
    let mut fixture = Fixture::new(FilterBuilder::new("filter").passes_when_no_predicate(true));
    fixture.events();
    fixture.add(1, 100, 177);
    fixture.add(2, 200, 277);
    fixture.fire();
    assert_eq!(
        fixture.events(),
        vec![added(0, &row(1, 100, 177)), added(1, &row(2, 200, 277))]
    );
}

#[test]
fn test_fails_when_no_predicate() {
    let mut fixture = Fixture::new(FilterBuilder::new("filter").passes_when_no_predicate(false));
    fixture.events();
    fixture.add(1, 100, 177);
    fixture.add(2, 200, 277);
    fixture.fire();
    assert!(fixture.events().is_empty());
    assert!(fixture.filter.output().rows().is_empty());
}

#[test]
fn test_forwards_passing_rows() {
    let mut fixture = Fixture::new(hundreds_filter());
    fixture.events();
    fixture.add(1, 98, 77);
    fixture.add(2, 100, 177);
    fixture.add(3, 102, 177);
    fixture.fire();
    assert_eq!(fixture.events(), vec![added(0, &row(2, 100, 177))]);
    assert_eq!(fixture.filter.source_row_of(0), fixture.table.row_of(&int(2)));
    assert_eq!(fixture.filter.source_row_of(1), None);
}

#[test]
fn test_change_of_passing_row_without_dependency() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.change(2, "Value2", 555);
    fixture.fire();
    assert_eq!(fixture.events(), vec![changed(0, &[("Value2", int(555))])]);
}

#[test]
fn test_change_of_passing_row_with_dependency() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.change(2, "Value1", 500);
    fixture.fire();
    assert_eq!(fixture.events(), vec![changed(0, &[("Value1", int(500))])]);
}

#[test]
fn test_change_of_failing_row_is_dropped() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.change(1, "Value2", 555);
    fixture.fire();
    fixture.change(1, "Value1", 555);
    fixture.fire();
    assert!(fixture.events().is_empty());
}

#[test]
fn test_row_starting_to_pass_is_added() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.change(1, "Value1", 200);
    fixture.fire();
    assert_eq!(fixture.events(), vec![added(1, &row(1, 200, 77))]);
}

#[test]
fn test_row_stopping_to_pass_is_removed() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.change(2, "Value1", 111);
    fixture.fire();
    assert_eq!(fixture.events(), vec![removed(0)]);
    assert!(fixture.filter.output().rows().is_empty());
}

#[test]
fn test_swap_in_one_batch_keeps_removed_row_reserved() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.change(1, "Value1", 200);
    fixture.change(2, "Value1", 111);
    fixture.fire();
    assert_eq!(
        fixture.events(),
        vec![removed(0), added(1, &row(1, 200, 77))]
    );

    fixture.change(3, "Value1", 300);
    fixture.fire();
    assert_eq!(fixture.events(), vec![added(0, &row(3, 300, 177))]);
}

#[test]
fn test_remove_of_failing_row_is_dropped() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.remove(1);
    fixture.fire();
    assert!(fixture.events().is_empty());
}

#[test]
fn test_remove_of_passing_row_frees_outbound_row() {
    let mut fixture = Fixture::populated(hundreds_filter());
    fixture.remove(2);
    fixture.fire();
    assert_eq!(fixture.events(), vec![removed(0)]);

    fixture.add(5, 300, 1);
    fixture.fire();
    assert_eq!(fixture.events(), vec![added(0, &row(5, 300, 1))]);
}

#[test]
fn test_predicate_only_tested_when_dependencies_change() {
    let tests = Rc::new(Cell::new(0));
    let predicate = Counting {
        inner: hundreds(),
        tests: tests.clone(),
    };
    let mut fixture = Fixture::populated(FilterBuilder::new("filter").initial_predicate(predicate));
    assert_eq!(tests.get(), 3);

    tests.set(0);
    fixture.change(2, "Value2", 555);
    fixture.fire();
    assert_eq!(tests.get(), 0);

    fixture.change(2, "Value1", 555);
    fixture.fire();
    assert_eq!(tests.get(), 1);
    assert_eq!(fixture.events(), vec![changed(0, &[("Value2", int(555))]), removed(0)]);
}

#[test]
fn test_or_predicate_depends_on_every_input() {
    let by_value1: Box<dyn RowPredicate> = Box::new(hundreds());
    let by_value2: Box<dyn RowPredicate> =
        Box::new(FieldPredicate::new("Value2", |v| as_i32(v) == 555));
    let predicate = OrPredicate::new(vec![by_value1, by_value2]);
    let mut fixture = Fixture::populated(FilterBuilder::new("filter").initial_predicate(predicate));
    fixture.change(1, "Value2", 555);
    fixture.fire();
    assert_eq!(fixture.events(), vec![added(1, &row(1, 98, 555))]);
}

#[test]
fn test_update_predicate_retests_every_row() {
    let mut fixture = Fixture::new(FilterBuilder::new("filter").initial_predicate(below(150)));
    fixture.add(1, 98, 77);
    fixture.add(2, 100, 177);
    fixture.add(3, 102, 177);
    fixture.add(4, 200, 277);
    fixture.fire();
    fixture.events();

    fixture
        .filter
        .update_predicate(Some(Box::new(hundreds())))
        .unwrap();
    assert_eq!(
        fixture.events(),
        vec![removed(0), removed(2), added(3, &row(4, 200, 277))]
    );
    let rows = snapshot(&fixture.filter.output());
    assert_eq!(rows.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(rows[&1]["Id"], int(2));
    assert_eq!(rows[&3]["Id"], int(4));
}

#[test]
fn test_update_predicate_to_none_restores_default() {
    let fixture = Fixture::populated(hundreds_filter());
    fixture.filter.update_predicate(None).unwrap();
    assert_eq!(fixture.events(), vec![removed(0)]);

    let fixture = Fixture::populated(hundreds_filter().passes_when_no_predicate(true));
    fixture.filter.update_predicate(None).unwrap();
    assert_eq!(
        fixture.events(),
        vec![added(1, &row(1, 98, 77)), added(2, &row(3, 102, 177))]
    );
}

#[test]
fn test_rejected_predicate_keeps_previous() {
    let mut fixture = Fixture::populated(hundreds_filter());
    let err = fixture
        .filter
        .update_predicate(Some(Box::new(FieldPredicate::new("Missing", |_| true))))
        .unwrap_err();
    assert!(matches!(err, Error::FieldNotFound { .. }));
    assert!(fixture.events().is_empty());

    fixture.change(1, "Value1", 400);
    fixture.fire();
    assert_eq!(fixture.events(), vec![added(1, &row(1, 400, 77))]);
}

#[test]
fn test_bind_failure_recovers_with_new_predicate() {
    let mut table = table(
        "table",
        "Id",
        &[("Value1", DataType::Int32), ("Value2", DataType::Int32)],
    );
    table
        .add_row(int(2), &[("Value1", int(100)), ("Value2", int(177))])
        .unwrap();
    table.fire_changes();

    let filter = FilterBuilder::new("filter")
        .initial_predicate(FieldPredicate::new("Missing", |_| true))
        .build();
    let out = capture(&filter.output());
    table.output().attach(filter.input());
    assert_eq!(take(&out), vec![CapturedEvent::Schema(None)]);
    assert_eq!(
        filter.last_error(),
        Some(Error::field_not_found(
            "Missing",
            "predicate of Filter 'filter'",
            "table"
        ))
    );

    filter.update_predicate(Some(Box::new(hundreds()))).unwrap();
    assert_eq!(filter.last_error(), None);
    assert_eq!(
        take(&out),
        vec![schema(&FIELDS), added(0, &row(2, 100, 177))]
    );
}

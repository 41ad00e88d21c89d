//! Projection scenarios driven by a keyed table.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use weft_core::{DataType, Error, Metadata, Value};
use weft_incremental::{
    CaptureInput, CapturedEvent, FieldPredicate, FilterBuilder, FnCalculation, Projection,
    ProjectionBuilder,
};
use weft_storage::KeyedTable;

fn orders() -> KeyedTable {
    table(
        "orders",
        "Id",
        &[
            ("Qty", DataType::Int32),
            ("Price", DataType::Int32),
            ("Note", DataType::String),
        ],
    )
}

fn add(table: &mut KeyedTable, id: i32, qty: i32, price: i32) {
    table
        .add_row(
            int(id),
            &[("Qty", int(qty)), ("Price", int(price)), ("Note", text("n"))],
        )
        .unwrap();
}

fn product(values: &[Value]) -> Value {
    int(as_i32(&values[0]) * as_i32(&values[1]))
}

fn total_of(inputs: [&str; 2]) -> FnCalculation<fn(&[Value]) -> Value> {
    FnCalculation::new(DataType::Int32, inputs, product as fn(&[Value]) -> Value)
}

fn total() -> FnCalculation<fn(&[Value]) -> Value> {
    total_of(["Qty", "Price"])
}

struct Fixture {
    table: KeyedTable,
    projection: Projection,
    out: Rc<RefCell<CaptureInput>>,
}

impl Fixture {
    fn new(builder: ProjectionBuilder) -> Self {
        let table = orders();
        let projection = builder.build().unwrap();
        let out = capture(&projection.output());
        table.output().attach(projection.input());
        Self {
            table,
            projection,
            out,
        }
    }

    fn change(&mut self, id: i32, field: &str, value: Value) {
        self.table.change_row(&int(id), &[(field, value)]).unwrap();
        self.table.fire_changes();
    }

    fn events(&self) -> Vec<CapturedEvent> {
        take(&self.out)
    }
}

#[test]
fn test_forwards_every_field_by_default() {
    let mut fixture = Fixture::new(ProjectionBuilder::new("view"));
    assert_eq!(fixture.events(), vec![schema(&["Id", "Qty", "Price", "Note"])]);
    add(&mut fixture.table, 1, 2, 5);
    fixture.table.fire_changes();
    assert_eq!(
        fixture.events(),
        vec![added(
            0,
            &[
                ("Id", int(1)),
                ("Qty", int(2)),
                ("Price", int(5)),
                ("Note", text("n"))
            ]
        )]
    );
    assert_eq!(fixture.projection.name(), "view");
}

#[test]
fn test_include_alias_and_order() {
    let fixture = Fixture::new(
        ProjectionBuilder::new("view")
            .include(["Id", "Qty"])
            .include(["Price"])
            .inbound_alias("Price", "Px")
            .outbound_order_on_left(["Px"])
            .outbound_order_on_right(["Id"]),
    );
    assert_eq!(fixture.events(), vec![schema(&["Px", "Qty", "Id"])]);
}

#[test]
fn test_omit() {
    let fixture = Fixture::new(ProjectionBuilder::new("view").omit(["Note", "NotThere"]));
    assert_eq!(fixture.events(), vec![schema(&["Id", "Qty", "Price"])]);
}

#[test]
fn test_missing_included_field_unbinds() {
    let fixture = Fixture::new(ProjectionBuilder::new("view").include(["Id", "Nope"]));
    assert_eq!(fixture.events(), vec![CapturedEvent::Schema(None)]);
    assert!(matches!(
        fixture.projection.last_error(),
        Some(Error::InvalidSetup { .. })
    ));
}

#[test]
fn test_repeated_order_names_are_rejected() {
    let result = ProjectionBuilder::new("view")
        .outbound_order_on_left(["Id", "Qty"])
        .outbound_order_on_right(["Qty"])
        .build();
    assert!(matches!(result, Err(Error::InvalidSetup { .. })));
}

#[test]
fn test_calculated_field_follows_dependencies() {
    let mut fixture = Fixture::new(
        ProjectionBuilder::new("view")
            .omit(["Note"])
            .lazy_calculation("Total", total()),
    );
    assert_eq!(fixture.events(), vec![schema(&["Id", "Qty", "Price", "Total"])]);

    add(&mut fixture.table, 1, 2, 5);
    fixture.table.fire_changes();
    assert_eq!(
        fixture.events(),
        vec![added(
            0,
            &[("Id", int(1)), ("Qty", int(2)), ("Price", int(5)), ("Total", int(10))]
        )]
    );

    fixture.change(1, "Price", int(6));
    assert_eq!(
        fixture.events(),
        vec![changed(0, &[("Price", int(6)), ("Total", int(12))])]
    );

    fixture.change(1, "Note", text("ignored"));
    assert!(fixture.events().is_empty());

    fixture.table.remove_row(&int(1)).unwrap();
    fixture.table.fire_changes();
    assert_eq!(fixture.events(), vec![removed(0)]);
}

#[test]
fn test_calculation_reads_aliased_and_calculated_fields() {
    let doubled = FnCalculation::new(DataType::Int32, ["Total"], |v: &[Value]| {
        int(as_i32(&v[0]) * 2)
    });
    let mut fixture = Fixture::new(
        ProjectionBuilder::new("view")
            .include(["Id", "Qty", "Price"])
            .inbound_alias("Qty", "Quantity")
            .lazy_calculation("Total", total_of(["Quantity", "Price"]))
            .lazy_calculation("Doubled", doubled),
    );
    fixture.events();
    add(&mut fixture.table, 1, 2, 5);
    fixture.table.fire_changes();
    fixture.events();

    fixture.change(1, "Qty", int(3));
    assert_eq!(
        fixture.events(),
        vec![changed(
            0,
            &[("Quantity", int(3)), ("Total", int(15)), ("Doubled", int(30))]
        )]
    );
}

#[test]
fn test_calculation_metadata() {
    let fixture = Fixture::new(ProjectionBuilder::new("view").lazy_calculation_with_metadata(
        "Total",
        total(),
        Metadata::new().with_tag("calculated"),
    ));
    let schema = fixture.out.borrow().schema().unwrap();
    assert!(schema.field("Total").unwrap().metadata().has_tag("calculated"));
    assert_eq!(schema.field("Total").unwrap().data_type(), DataType::Int32);
    assert!(schema.field("Id").unwrap().metadata().has_tag("key"));
}

#[test]
fn test_calculated_name_colliding_with_inbound_field() {
    let fixture = Fixture::new(ProjectionBuilder::new("view").lazy_calculation("Qty", total()));
    assert_eq!(fixture.events(), vec![CapturedEvent::Schema(None)]);
    assert!(matches!(
        fixture.projection.last_error(),
        Some(Error::NameCollision { .. })
    ));
}

#[test]
fn test_late_subscriber_sees_source_rows() {
    let mut table = orders();
    add(&mut table, 1, 2, 5);
    add(&mut table, 2, 1, 1);
    table.fire_changes();
    let projection = ProjectionBuilder::new("view")
        .include(["Id"])
        .build()
        .unwrap();
    table.output().attach(projection.input());

    let out = capture(&projection.output());
    assert_eq!(
        take(&out),
        vec![
            schema(&["Id"]),
            added(0, &[("Id", int(1))]),
            added(1, &[("Id", int(2))]),
        ]
    );
}

#[test]
fn test_detach_sends_null_schema() {
    let fixture = Fixture::new(ProjectionBuilder::new("view"));
    fixture.events();
    fixture.table.output().detach(&fixture.projection.input());
    assert_eq!(fixture.events(), vec![CapturedEvent::Schema(None)]);
}

#[test]
fn test_projection_of_filtered_rows() {
    let mut table = orders();
    let filter = FilterBuilder::new("big")
        .initial_predicate(FieldPredicate::new("Qty", |v| as_i32(v) >= 10))
        .build();
    let projection = ProjectionBuilder::new("view")
        .include(["Id"])
        .lazy_calculation("Total", total())
        .build()
        .unwrap();
    table.output().attach(filter.input());
    filter.output().attach(projection.input());
    let out = capture(&projection.output());

    add(&mut table, 1, 2, 5);
    add(&mut table, 2, 10, 3);
    table.fire_changes();
    table.change_row(&int(2), &[("Qty", int(11))]).unwrap();
    table.fire_changes();
    table.change_row(&int(2), &[("Qty", int(1))]).unwrap();
    table.fire_changes();

    assert_eq!(
        take(&out),
        vec![
            schema(&["Id", "Total"]),
            added(0, &[("Id", int(2)), ("Total", int(30))]),
            changed(0, &[("Total", int(33))]),
            removed(0),
        ]
    );
}

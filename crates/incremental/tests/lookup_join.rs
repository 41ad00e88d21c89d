//! Lookup Join operator scenarios driven by keyed tables.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use weft_core::{DataType, Error};
use weft_incremental::{CaptureInput, CapturedEvent, Join, JoinBuilder, JoinKeyHandling};
use weft_storage::KeyedTable;

const FIELDS: [&str; 5] = ["OrderId", "ProductId", "Qty", "Name", "Price"];

struct Fixture {
    orders: KeyedTable,
    products: KeyedTable,
    join: Join,
    out: Rc<RefCell<CaptureInput>>,
}

fn orders() -> KeyedTable {
    table(
        "orders",
        "OrderId",
        &[("ProductId", DataType::Int32), ("Qty", DataType::Int32)],
    )
}

fn products() -> KeyedTable {
    table(
        "products",
        "ProductId",
        &[("Name", DataType::String), ("Price", DataType::Int64)],
    )
}

fn builder() -> JoinBuilder {
    JoinBuilder::new("orders_products")
        .join_on(["ProductId"], ["ProductId"])
        .with_join_key_handling(JoinKeyHandling::KeepLeft)
}

impl Fixture {
    fn with(builder: JoinBuilder) -> Self {
        let orders = orders();
        let products = products();
        let join = builder.build().unwrap();
        let out = capture(&join.output());
        orders.output().attach(join.left_input());
        products.output().attach(join.right_input());
        Self {
            orders,
            products,
            join,
            out,
        }
    }

    fn inner() -> Self {
        let fixture = Self::with(builder());
        fixture.out.borrow_mut().clear();
        fixture
    }

    fn outer() -> Self {
        let fixture = Self::with(builder().outer());
        fixture.out.borrow_mut().clear();
        fixture
    }

    fn add_order(&mut self, id: i32, product: i32, qty: i32) {
        self.orders
            .add_row(int(id), &[("ProductId", int(product)), ("Qty", int(qty))])
            .unwrap();
        self.orders.fire_changes();
    }

    fn add_product(&mut self, id: i32, name: &str, price: i64) {
        self.products
            .add_row(int(id), &[("Name", text(name)), ("Price", long(price))])
            .unwrap();
        self.products.fire_changes();
    }

    fn events(&self) -> Vec<CapturedEvent> {
        take(&self.out)
    }
}

#[test]
fn test_schema_after_both_sides_attach() {
    let orders = orders();
    let products = products();
    let join = builder().build().unwrap();
    let out = capture(&join.output());

    orders.output().attach(join.left_input());
    assert!(take(&out).is_empty());
    assert!(join.output().schema().is_none());

    products.output().attach(join.right_input());
    assert_eq!(take(&out), vec![schema(&FIELDS)]);
}

mod inner {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_events_until_matched() {
        let mut f = Fixture::inner();
        f.add_order(1, 10, 3);
        f.add_order(2, 11, 4);
        assert!(f.events().is_empty());

        f.add_product(10, "bolt", 5);
        assert_eq!(
            f.events(),
            vec![added(
                0,
                &[
                    ("OrderId", int(1)),
                    ("ProductId", int(10)),
                    ("Qty", int(3)),
                    ("Name", text("bolt")),
                    ("Price", long(5)),
                ]
            )]
        );
        assert_eq!(f.join.output().rows(), vec![0]);
    }

    #[test]
    fn test_product_joins_every_order() {
        let mut f = Fixture::inner();
        f.add_order(1, 10, 3);
        f.add_order(2, 10, 4);
        f.add_product(10, "bolt", 5);
        let events = f.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CapturedEvent::Added { row: 0, .. }));
        assert!(matches!(events[1], CapturedEvent::Added { row: 1, .. }));
    }

    #[test]
    fn test_right_value_change() {
        let mut f = Fixture::inner();
        f.add_order(1, 10, 3);
        f.add_product(10, "bolt", 5);
        f.events();

        f.products
            .change_row(&int(10), &[("Price", long(6))])
            .unwrap();
        f.products.fire_changes();
        assert_eq!(f.events(), vec![changed(0, &[("Price", long(6))])]);
    }

    #[test]
    fn test_left_value_change() {
        let mut f = Fixture::inner();
        f.add_order(1, 10, 3);
        f.add_product(10, "bolt", 5);
        f.events();

        f.orders.change_row(&int(1), &[("Qty", int(9))]).unwrap();
        f.orders.fire_changes();
        assert_eq!(f.events(), vec![changed(0, &[("Qty", int(9))])]);
    }

    #[test]
    fn test_left_key_change() {
        let mut f = Fixture::inner();
        f.add_product(10, "bolt", 5);
        f.add_product(11, "nut", 2);
        f.add_order(1, 10, 3);
        f.events();

        f.orders
            .change_row(&int(1), &[("ProductId", int(11))])
            .unwrap();
        f.orders.fire_changes();
        assert_eq!(
            f.events(),
            vec![changed(
                0,
                &[
                    ("ProductId", int(11)),
                    ("Name", text("nut")),
                    ("Price", long(2)),
                ]
            )]
        );

        f.orders
            .change_row(&int(1), &[("ProductId", int(12))])
            .unwrap();
        f.orders.fire_changes();
        assert_eq!(f.events(), vec![removed(0)]);
    }

    #[test]
    fn test_removals() {
        let mut f = Fixture::inner();
        f.add_order(1, 10, 3);
        f.add_order(2, 11, 4);
        f.add_product(10, "bolt", 5);
        f.add_product(11, "nut", 2);
        f.events();

        f.products.remove_row(&int(10)).unwrap();
        f.products.fire_changes();
        assert_eq!(f.events(), vec![removed(0)]);

        f.orders.remove_row(&int(2)).unwrap();
        f.orders.fire_changes();
        assert_eq!(f.events(), vec![removed(1)]);
        assert!(f.join.output().rows().is_empty());
    }

    #[test]
    fn test_empty_fire_emits_nothing() {
        let mut f = Fixture::inner();
        f.add_order(1, 10, 3);
        f.add_product(10, "bolt", 5);
        f.events();
        f.orders.fire_changes();
        f.products.fire_changes();
        assert!(f.events().is_empty());
    }
}

mod outer {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unmatched_left_reads_defaults() {
        let mut f = Fixture::outer();
        f.add_order(1, 10, 3);
        assert_eq!(
            f.events(),
            vec![added(
                0,
                &[
                    ("OrderId", int(1)),
                    ("ProductId", int(10)),
                    ("Qty", int(3)),
                    ("Name", text("")),
                    ("Price", long(0)),
                ]
            )]
        );
    }

    #[test]
    fn test_match_changes_right_fields_only() {
        let mut f = Fixture::outer();
        f.add_order(1, 10, 3);
        f.events();

        f.add_product(10, "bolt", 5);
        assert_eq!(
            f.events(),
            vec![changed(0, &[("Name", text("bolt")), ("Price", long(5))])]
        );
    }

    #[test]
    fn test_right_removal_restores_defaults() {
        let mut f = Fixture::outer();
        f.add_order(1, 10, 3);
        f.add_product(10, "bolt", 5);
        f.events();

        f.products.remove_row(&int(10)).unwrap();
        f.products.fire_changes();
        assert_eq!(
            f.events(),
            vec![changed(0, &[("Name", text("")), ("Price", long(0))])]
        );
        assert_eq!(f.join.output().rows(), vec![0]);
    }

    #[test]
    fn test_source_row_fields() {
        let mut f = Fixture::with(
            builder()
                .outer()
                .include_left_source_row_as("OrderRow")
                .include_right_source_row_as("ProductRow"),
        );
        assert_eq!(
            f.out.borrow().field_names(),
            vec!["OrderRow", "ProductRow", "OrderId", "ProductId", "Qty", "Name", "Price"]
        );
        f.add_product(20, "washer", 1);
        f.add_product(10, "bolt", 5);
        f.add_order(1, 10, 3);
        f.add_order(2, 30, 1);

        let out = f.out.borrow();
        assert_eq!(out.value(0, "OrderRow"), Some(int(0)));
        assert_eq!(out.value(0, "ProductRow"), Some(int(1)));
        assert_eq!(out.value(1, "ProductRow"), Some(int(-1)));
    }
}

#[test]
fn test_detach_and_reattach() {
    let mut f = Fixture::inner();
    f.add_order(1, 10, 3);
    f.add_product(10, "bolt", 5);
    f.events();

    let right = f.join.right_input();
    f.products.output().detach(&right);
    assert_eq!(f.events(), vec![CapturedEvent::Schema(None)]);
    assert!(f.join.output().schema().is_none());

    f.products.output().attach(right);
    let events = f.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], schema(&FIELDS));
    assert!(matches!(events[1], CapturedEvent::Added { row: 0, .. }));
}

#[test]
fn test_bind_failure_is_reported() {
    let orders = orders();
    let products = products();
    let join = JoinBuilder::new("broken")
        .join_on(["Missing"], ["ProductId"])
        .build()
        .unwrap();
    let out = capture(&join.output());
    orders.output().attach(join.left_input());
    products.output().attach(join.right_input());

    assert!(matches!(join.last_error(), Some(Error::FieldNotFound { .. })));
    assert!(take(&out).is_empty());
}

#[test]
fn test_key_type_mismatch_is_reported() {
    let orders = table("orders", "OrderId", &[("ProductId", DataType::Int64)]);
    let products = products();
    let join = builder().build().unwrap();
    orders.output().attach(join.left_input());
    products.output().attach(join.right_input());
    assert!(matches!(join.last_error(), Some(Error::TypeMismatch { .. })));
}

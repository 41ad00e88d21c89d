//! Property-based tests for GroupBy.
//!
//! Random batches of table mutations must leave the GroupBy parent output equal to
//! totals recomputed from the table, and the events emitted along the way must be
//! enough to rebuild that output downstream.

mod common;

use std::collections::BTreeMap;

use common::*;
use proptest::prelude::*;
use weft_core::DataType;
use weft_incremental::{GroupByBuilder, SumAggregation};
use weft_storage::KeyedTable;

const KEYS: i32 = 8;

#[derive(Clone, Debug)]
enum Op {
    Add { id: i32, group: i32, value: i32 },
    Change { id: i32, group: Option<i32>, value: Option<i32> },
    Remove { id: i32 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEYS, 0..3, -20..20).prop_map(|(id, group, value)| Op::Add { id, group, value }),
        (0..KEYS, prop::option::of(0..3), prop::option::of(-20..20))
            .prop_map(|(id, group, value)| Op::Change { id, group, value }),
        (0..KEYS).prop_map(|id| Op::Remove { id }),
    ]
}

fn batches_strategy() -> impl Strategy<Value = Vec<Vec<Op>>> {
    prop::collection::vec(prop::collection::vec(op_strategy(), 0..6), 1..12)
}

/// Applies an operation when it is valid for the current table contents.
fn apply(table: &mut KeyedTable, op: &Op) {
    let present = |table: &KeyedTable, id: i32| table.row_of(&int(id)).is_some();
    match *op {
        Op::Add { id, group, value } if !present(table, id) => {
            table
                .add_row(int(id), &[("Group", int(group)), ("Value", int(value))])
                .unwrap();
        }
        Op::Change { id, group, value } if present(table, id) => {
            let mut values = Vec::new();
            if let Some(group) = group {
                values.push(("Group", int(group)));
            }
            if let Some(value) = value {
                values.push(("Value", int(value)));
            }
            table.change_row(&int(id), &values).unwrap();
        }
        Op::Remove { id } if present(table, id) => {
            table.remove_row(&int(id)).unwrap();
        }
        _ => {}
    }
}

/// Count and sum per group, recomputed from the table.
fn expected_totals(table: &KeyedTable) -> BTreeMap<i32, (i32, i32)> {
    let mut totals = BTreeMap::new();
    for id in 0..KEYS {
        let key = int(id);
        if table.row_of(&key).is_none() {
            continue;
        }
        let group = as_i32(&table.value(&key, "Group").unwrap());
        let value = as_i32(&table.value(&key, "Value").unwrap());
        let entry = totals.entry(group).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += value;
    }
    totals
}

fn actual_totals(rows: &RowValues) -> BTreeMap<i32, (i32, i32)> {
    rows.values()
        .map(|row| {
            (
                as_i32(&row["Group"]),
                (as_i32(&row["Count"]), as_i32(&row["Total"])),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_parent_matches_recomputed_totals(batches in batches_strategy()) {
        let mut table = table(
            "t",
            "Id",
            &[("Group", DataType::Int32), ("Value", DataType::Int32)],
        );
        let group_by = GroupByBuilder::new("totals")
            .group_by_fields(["Group"])
            .include_count_field("Count")
            .add_aggregation(SumAggregation::new("Value", "Total", DataType::Int32))
            .build()
            .unwrap();
        let parent = capture(&group_by.parent_output());
        let child = capture(&group_by.child_output());
        table.output().attach(group_by.input());

        let mut parent_mirror = Mirror::default();
        let mut child_mirror = Mirror::default();
        for batch in &batches {
            for op in batch {
                apply(&mut table, op);
            }
            table.fire_changes();

            parent_mirror.apply(take(&parent));
            child_mirror.apply(take(&child));
            let current = snapshot(&group_by.parent_output());
            prop_assert_eq!(actual_totals(&current), expected_totals(&table));
            prop_assert_eq!(parent_mirror.rows(), &current);
            prop_assert_eq!(child_mirror.rows(), &snapshot(&group_by.child_output()));
            prop_assert_eq!(group_by.child_output().rows().len(), table.len());
        }
    }

    /// Firing with nothing pending produces no events.
    #[test]
    fn prop_empty_fire_is_silent(batches in batches_strategy()) {
        let mut table = table(
            "t",
            "Id",
            &[("Group", DataType::Int32), ("Value", DataType::Int32)],
        );
        let group_by = GroupByBuilder::new("totals")
            .group_by_fields(["Group"])
            .include_count_field("Count")
            .add_aggregation(SumAggregation::new("Value", "Total", DataType::Int32))
            .build()
            .unwrap();
        let parent = capture(&group_by.parent_output());
        table.output().attach(group_by.input());

        for batch in &batches {
            for op in batch {
                apply(&mut table, op);
            }
            table.fire_changes();
            take(&parent);
            table.fire_changes();
            prop_assert!(take(&parent).is_empty());
        }
    }
}

//! Setup of GroupBy operators.

use super::aggregation::{AggregationFunction, FieldReferences};
use super::operator::{GroupBy, GroupByParts};
use super::schema::GroupByLayout;
use crate::interner::{DynamicRowInterner, RowInterner};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use weft_core::{Error, Result};

/// Default number of rows and groups storage is sized for.
pub const DEFAULT_CAPACITY: usize = 128;

enum GroupFunction {
    Fields(Vec<String>),
    Custom {
        interner: Box<dyn RowInterner>,
        field_names: Vec<String>,
    },
}

/// Builder for [`GroupBy`].
///
/// ```ignore
/// let group_by = GroupByBuilder::new("by_customer")
///     .group_by_fields(["Customer"])
///     .include_count_field("Count")
///     .add_aggregation(SumAggregation::new("Qty", "TotalQty", DataType::Int64))
///     .build()?;
/// orders.output().attach(group_by.input());
/// ```
pub struct GroupByBuilder {
    name: String,
    group_function: GroupFunction,
    forwarded: Vec<String>,
    group_id_field: Option<String>,
    count_field: Option<String>,
    child_group_id_field: Option<String>,
    functions: Vec<Box<dyn AggregationFunction>>,
    capacity: usize,
}

impl GroupByBuilder {
    /// Starts a GroupBy that puts every row in a single group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_function: GroupFunction::Fields(Vec::new()),
            forwarded: Vec::new(),
            group_id_field: None,
            count_field: None,
            child_group_id_field: None,
            functions: Vec::new(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Groups rows by the values of the named fields.
    pub fn group_by_fields<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.group_function = GroupFunction::Fields(names.into_iter().map(Into::into).collect());
        self
    }

    /// Groups rows with a custom interner. `field_names` are the inbound fields it
    /// reads, used to check for name collisions.
    pub fn group_function<S: Into<String>>(
        mut self,
        interner: Box<dyn RowInterner>,
        field_names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.group_function = GroupFunction::Custom {
            interner,
            field_names: field_names.into_iter().map(Into::into).collect(),
        };
        self
    }

    /// Copies the named inbound fields into the parent, read from each group's
    /// oldest row.
    pub fn forward_fields<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.forwarded.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds a parent field holding the group id.
    pub fn include_group_id_field(mut self, name: impl Into<String>) -> Self {
        self.group_id_field = Some(name.into());
        self
    }

    /// Adds a parent field holding the number of rows in each group.
    pub fn include_count_field(mut self, name: impl Into<String>) -> Self {
        self.count_field = Some(name.into());
        self
    }

    /// Adds a child field holding the group id of each row.
    pub fn include_child_group_id_field(mut self, name: impl Into<String>) -> Self {
        self.child_group_id_field = Some(name.into());
        self
    }

    /// Registers an aggregation function.
    pub fn add_aggregation(mut self, function: impl AggregationFunction + 'static) -> Self {
        self.functions.push(Box::new(function));
        self
    }

    /// Registers a boxed aggregation function.
    pub fn add_boxed_aggregation(mut self, function: Box<dyn AggregationFunction>) -> Self {
        self.functions.push(function);
        self
    }

    /// Sizes internal storage for `capacity` rows and groups.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Validates the field names and creates the operator.
    pub fn build(self) -> Result<GroupBy> {
        let mut references = FieldReferences::new();
        for function in &self.functions {
            function.collect_field_references(&mut references);
        }

        let (interner, group_fields): (Box<dyn RowInterner>, Vec<String>) = match self.group_function {
            GroupFunction::Fields(names) => (
                Box::new(DynamicRowInterner::with_capacity(names.clone(), self.capacity)),
                names,
            ),
            GroupFunction::Custom {
                interner,
                field_names,
            } => (interner, field_names),
        };

        let mut names = NameRegistry::new(&self.name);
        if let Some(name) = &self.group_id_field {
            names.register(name, Usage::GroupId)?;
        }
        if let Some(name) = &self.count_field {
            names.register(name, Usage::Count)?;
        }
        for name in &self.forwarded {
            names.register(name, Usage::Forwarded)?;
        }
        for name in &group_fields {
            names.register(name, Usage::GroupFunction)?;
        }
        for descriptor in references.outbound_fields() {
            names.register(descriptor.name(), Usage::Calculated)?;
        }
        if names.is_empty() {
            return Err(Error::invalid_setup(
                "No fields will be in schema; all field sources are empty",
            ));
        }

        Ok(GroupBy::new(GroupByParts {
            layout: GroupByLayout {
                name: self.name,
                group_id_field: self.group_id_field,
                count_field: self.count_field,
                child_group_id_field: self.child_group_id_field,
                forwarded: self.forwarded,
                calculated: references.outbound_fields().to_vec(),
            },
            capacity: self.capacity,
            interner,
            functions: self.functions,
            cached_fields: references.previous_value_fields().to_vec(),
        }))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Usage {
    GroupId,
    Count,
    Forwarded,
    GroupFunction,
    Calculated,
}

impl Usage {
    fn describe(self) -> &'static str {
        match self {
            Usage::GroupId => "group id field",
            Usage::Count => "count field",
            Usage::Forwarded => "forwarded field",
            Usage::GroupFunction => "group function field",
            Usage::Calculated => "calculated field",
        }
    }

    /// A group function field may also be forwarded.
    fn may_share(self, other: Usage) -> bool {
        matches!(
            (self, other),
            (Usage::Forwarded, Usage::GroupFunction) | (Usage::GroupFunction, Usage::Forwarded)
        )
    }
}

struct NameRegistry<'a> {
    operator: &'a str,
    names: Vec<(String, Usage)>,
}

impl<'a> NameRegistry<'a> {
    fn new(operator: &'a str) -> Self {
        Self {
            operator,
            names: Vec::new(),
        }
    }

    fn register(&mut self, name: &str, usage: Usage) -> Result<()> {
        if let Some((_, existing)) = self.names.iter().find(|(n, _)| n == name) {
            if usage.may_share(*existing) {
                return Ok(());
            }
            return Err(Error::name_collision(
                self.operator,
                name,
                usage.describe(),
                existing.describe(),
            ));
        }
        self.names.push((String::from(name), usage));
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

//! Setup of Projection operators.

use super::calculation::{CalculatedFieldDescriptor, FieldCalculation};
use super::operator::{Projection, ProjectionState};
use super::schema::{FieldSorter, ProjectionLayout};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{Metadata, Result};

/// Builder for [`Projection`].
///
/// ```ignore
/// let projection = ProjectionBuilder::new("order_view")
///     .omit(["Note"])
///     .inbound_alias("Px", "Price")
///     .lazy_calculation("Notional", FnCalculation::new(DataType::Float64, ["Qty", "Price"], notional))
///     .outbound_order_on_left(["OrderId"])
///     .build()?;
/// orders.output().attach(projection.input());
/// ```
pub struct ProjectionBuilder {
    name: String,
    included: Option<Vec<String>>,
    omitted: Vec<String>,
    aliases: Vec<(String, String)>,
    calculated: Vec<CalculatedFieldDescriptor>,
    left: Vec<String>,
    right: Vec<String>,
}

impl ProjectionBuilder {
    /// Starts a projection that forwards every inbound field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included: None,
            omitted: Vec::new(),
            aliases: Vec::new(),
            calculated: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Forwards only the named inbound fields. Binding fails if any is missing.
    pub fn include<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.included
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Drops the named inbound fields. Names missing from the inbound schema are
    /// ignored.
    pub fn omit<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.omitted.extend(names.into_iter().map(Into::into));
        self
    }

    /// Publishes the inbound field `inbound` as `outbound`.
    pub fn inbound_alias(mut self, inbound: impl Into<String>, outbound: impl Into<String>) -> Self {
        let inbound = inbound.into();
        let outbound = outbound.into();
        match self.aliases.iter_mut().find(|(name, _)| *name == inbound) {
            Some(alias) => alias.1 = outbound,
            None => self.aliases.push((inbound, outbound)),
        }
        self
    }

    /// Adds a field computed on read. A calculation may read calculations added
    /// before it.
    pub fn lazy_calculation(self, name: impl Into<String>, calculation: impl FieldCalculation + 'static) -> Self {
        self.lazy_calculation_with_metadata(name, calculation, Metadata::new())
    }

    pub fn lazy_calculation_with_metadata(
        mut self,
        name: impl Into<String>,
        calculation: impl FieldCalculation + 'static,
        metadata: Metadata,
    ) -> Self {
        let descriptor =
            CalculatedFieldDescriptor::new(name, Rc::new(RefCell::new(calculation)), metadata);
        match self.calculated.iter_mut().find(|c| c.name() == descriptor.name()) {
            Some(existing) => *existing = descriptor,
            None => self.calculated.push(descriptor),
        }
        self
    }

    /// Places the named fields first, in this order.
    pub fn outbound_order_on_left<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.left = names.into_iter().map(Into::into).collect();
        self
    }

    /// Places the named fields last, in this order.
    pub fn outbound_order_on_right<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.right = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<Projection> {
        let sorter = FieldSorter::new(self.left, self.right);
        sorter.validate_unique_names(&format!("Projection '{}'", self.name))?;
        Ok(Projection::new(ProjectionState::new(ProjectionLayout {
            name: self.name,
            included: self.included,
            omitted: self.omitted,
            aliases: self.aliases,
            calculated: self.calculated,
            sorter,
        })))
    }
}

//! Outbound schema layout of a projection.

use super::calculation::{CalculatedField, CalculatedFieldDescriptor};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use weft_core::{
    Error, FieldBitSet, FieldMapping, FieldRef, FieldResolver, Result, Schema, SchemaBuilder,
    SchemaField,
};

/// Pins named fields to the start and end of the outbound field order.
#[derive(Clone, Debug, Default)]
pub struct FieldSorter {
    left: Vec<String>,
    right: Vec<String>,
}

impl FieldSorter {
    pub fn new(left: Vec<String>, right: Vec<String>) -> Self {
        Self { left, right }
    }

    /// Fails if a name appears more than once across both ends.
    pub fn validate_unique_names(&self, operator: &str) -> Result<()> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.left.len() + self.right.len());
        let mut repeated: Vec<&str> = Vec::new();
        for name in self.left.iter().chain(&self.right) {
            if seen.contains(&name.as_str()) {
                if !repeated.contains(&name.as_str()) {
                    repeated.push(name);
                }
            } else {
                seen.push(name);
            }
        }
        if repeated.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_setup(format!(
                "{}: names repeated in the field order: {:?}",
                operator, repeated
            )))
        }
    }

    /// Orders `names`: the left names, the remaining names as given, then the right
    /// names.
    pub fn order(&self, names: &[&str]) -> Vec<String> {
        let pinned = |name: &&str| self.left.iter().chain(&self.right).any(|p| p == name);
        self.left
            .iter()
            .cloned()
            .chain(names.iter().filter(|n| !pinned(n)).map(|n| String::from(*n)))
            .chain(self.right.iter().cloned())
            .collect()
    }
}

/// Maps inbound field changes to the outbound fields they affect.
///
/// Selected inbound fields map one-to-one through a [`FieldMapping`]. Calculated
/// fields additionally depend on every field they read.
#[derive(Debug, Default)]
pub struct ProjectionDependencyMap {
    mapping: FieldMapping,
    references: Vec<FieldBitSet>,
}

impl ProjectionDependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.mapping = FieldMapping::default();
        self.references.iter_mut().for_each(FieldBitSet::clear);
    }

    pub fn set_field_mapping(&mut self, mapping: FieldMapping) {
        self.mapping = mapping;
    }

    pub fn field_mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Records that the outbound field `outbound` reads the inbound field `inbound`.
    pub fn add_reference(&mut self, inbound: usize, outbound: usize) {
        if inbound >= self.references.len() {
            self.references.resize_with(inbound + 1, FieldBitSet::new);
        }
        self.references[inbound].set(outbound);
    }

    /// Records that `outbound` reads the calculated field `calculated`, inheriting
    /// every inbound dependency recorded for it so far.
    pub fn add_calculated_reference(&mut self, calculated: usize, outbound: usize) {
        for references in &mut self.references {
            if references.get(calculated) {
                references.set(outbound);
            }
        }
    }

    /// Adds the outbound fields affected by the inbound `changed` fields to `out`.
    pub fn translate_inbound_change_fields(&self, changed: &FieldBitSet, out: &mut FieldBitSet) {
        self.mapping.translate_into(changed, out);
        for inbound in changed.iter_ones() {
            if let Some(references) = self.references.get(inbound) {
                out.union_with(references);
            }
        }
    }

    /// Returns the number of calculated-field dependencies.
    pub fn reference_count(&self) -> usize {
        self.references.iter().map(FieldBitSet::count_ones).sum()
    }
}

/// Resolves the fields a calculation reads and records them as its dependencies.
struct CalculationResolver<'a> {
    inbound: &'a Schema,
    outbound: &'a Schema,
    dependencies: &'a mut ProjectionDependencyMap,
    field_id: usize,
    context: String,
}

impl FieldResolver for CalculationResolver<'_> {
    fn find_field(&mut self, name: &str) -> Option<FieldRef> {
        // A calculation naming its own field reads the inbound field of that name.
        if let Some(field) = self.outbound.field(name).filter(|f| f.field_id() != self.field_id) {
            match self.dependencies.mapping.inbound_field_id(field.field_id()) {
                Some(inbound) => self.dependencies.add_reference(inbound, self.field_id),
                None => self
                    .dependencies
                    .add_calculated_reference(field.field_id(), self.field_id),
            }
            return Some(field.field().clone());
        }
        let field = self.inbound.field(name)?;
        self.dependencies.add_reference(field.field_id(), self.field_id);
        Some(field.field().clone())
    }

    fn get_field(&mut self, name: &str) -> Result<FieldRef> {
        self.find_field(name).ok_or_else(|| {
            Error::field_not_found(name, self.context.clone(), self.inbound.name())
        })
    }
}

/// Everything that decides a projection's outbound schema.
pub(crate) struct ProjectionLayout {
    pub name: String,
    pub included: Option<Vec<String>>,
    pub omitted: Vec<String>,
    pub aliases: Vec<(String, String)>,
    pub calculated: Vec<CalculatedFieldDescriptor>,
    pub sorter: FieldSorter,
}

impl ProjectionLayout {
    fn operator(&self) -> String {
        format!("Projection '{}'", self.name)
    }

    fn alias_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(inbound, _)| inbound == name)
            .map_or(name, |(_, outbound)| outbound.as_str())
    }

    /// Picks the inbound fields to forward, under their outbound names, in inbound
    /// order.
    fn select_fields<'a>(&'a self, inbound: &'a Schema) -> Result<Vec<(&'a str, &'a SchemaField)>> {
        if let Some(included) = &self.included {
            let missing: Vec<&str> = included
                .iter()
                .map(String::as_str)
                .filter(|name| inbound.field(name).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(Error::invalid_setup(format!(
                    "{}: included fields not found in inbound schema '{}': {:?}",
                    self.operator(),
                    inbound.name(),
                    missing
                )));
            }
        }
        let selected = inbound
            .fields()
            .iter()
            .filter(|field| {
                self.included
                    .as_ref()
                    .map_or(true, |names| names.iter().any(|n| n == field.name()))
            })
            .filter(|field| !self.omitted.iter().any(|n| n == field.name()))
            .map(|field| (self.alias_of(field.name()), field))
            .collect();
        Ok(selected)
    }

    /// Builds the outbound schema and binds every calculation to it.
    ///
    /// Selected fields are forwarded as the inbound field itself, so the outbound
    /// rows are the inbound rows.
    pub(crate) fn build_outbound_schema(
        &self,
        inbound: &Schema,
        dependencies: &mut ProjectionDependencyMap,
    ) -> Result<Rc<Schema>> {
        dependencies.reset();
        let selected = self.select_fields(inbound)?;
        for calc in &self.calculated {
            if selected.iter().any(|(name, _)| *name == calc.name()) {
                return Err(Error::name_collision(
                    self.operator(),
                    calc.name(),
                    "calculated field",
                    "inbound field",
                ));
            }
        }

        let names: Vec<&str> = selected
            .iter()
            .map(|(name, _)| *name)
            .chain(self.calculated.iter().map(CalculatedFieldDescriptor::name))
            .collect();
        let mut builder = SchemaBuilder::new(self.name.clone());
        let mut mapping = FieldMapping::builder();
        for name in self.sorter.order(&names) {
            if let Some((_, field)) = selected.iter().find(|(n, _)| *n == name) {
                let id = builder.push(name, field.field().clone(), field.metadata().clone())?;
                mapping.map_inbound_to_outbound(field.field_id(), id);
            } else if let Some(calc) = self.calculated.iter().find(|c| c.name() == name) {
                let field = CalculatedField::new(calc.calculation().clone());
                builder.push(name, Rc::new(field), calc.metadata().clone())?;
            } else {
                return Err(Error::field_not_found(
                    name,
                    format!("field order of {}", self.operator()),
                    inbound.name(),
                ));
            }
        }
        dependencies.set_field_mapping(mapping.build());
        let outbound = builder.build();

        for calc in &self.calculated {
            let field_id = outbound
                .field_id(calc.name())
                .ok_or_else(|| Error::schema_not_bound(format!("{} field '{}'", self.operator(), calc.name())))?;
            let mut resolver = CalculationResolver {
                inbound,
                outbound: &outbound,
                dependencies: &mut *dependencies,
                field_id,
                context: format!("calculation '{}' of {}", calc.name(), self.operator()),
            };
            calc.calculation().borrow_mut().bind_to_schema(&mut resolver)?;
        }
        Ok(Rc::new(outbound))
    }

    pub(crate) fn unbind_calculations(&self) {
        for calc in &self.calculated {
            calc.calculation().borrow_mut().unbind_schema();
        }
    }
}

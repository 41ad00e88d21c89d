//! Output schemas of a GroupBy.

use super::aggregation::FieldDescriptor;
use super::dependency::DependencyMap;
use super::mapping::{FirstRowMapper, GroupMapping};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{
    row_value, ArrayField, DataType, Error, FieldBitSet, FieldMapping, FieldRef, FnField,
    MappedField, Metadata, Result, RowIdentityField, RowMapper, Schema, SchemaBuilder, Value,
};

/// Field names and options fixed when a GroupBy is built.
#[derive(Clone, Debug)]
pub(crate) struct GroupByLayout {
    pub name: String,
    pub group_id_field: Option<String>,
    pub count_field: Option<String>,
    pub child_group_id_field: Option<String>,
    pub forwarded: Vec<String>,
    pub calculated: Vec<FieldDescriptor>,
}

/// A bound parent schema with the storage behind its calculated fields.
pub(crate) struct ParentSchema {
    pub schema: Rc<Schema>,
    /// Store and outbound field id of every calculated field, in declaration order.
    pub calculated: Vec<(Rc<ArrayField>, usize)>,
    /// Outbound ids of the fields that read the first row of a group.
    pub first_row_fields: FieldBitSet,
}

/// A bound child schema.
pub(crate) struct ChildSchema {
    pub schema: Rc<Schema>,
    pub mapping: FieldMapping,
    pub group_field_id: Option<usize>,
}

impl GroupByLayout {
    fn context(&self, role: &str) -> String {
        format!("{} of GroupBy '{}'", role, self.name)
    }

    /// Builds the parent schema: one row per group.
    ///
    /// Fields are, in order: the group id, forwarded fields, the count, calculated
    /// fields, then group function fields that were not forwarded. Forwarded and group
    /// function fields are registered in `dependency_map`.
    pub fn build_parent_schema(
        &self,
        inbound: &Schema,
        group_fields: &[String],
        mapping: &Rc<RefCell<GroupMapping>>,
        capacity: usize,
        dependency_map: &mut DependencyMap,
    ) -> Result<ParentSchema> {
        let mut builder = SchemaBuilder::new(self.name.clone());
        let first_row: Rc<dyn RowMapper> = Rc::new(FirstRowMapper::new(mapping.clone()));
        let mut first_row_fields = FieldBitSet::new();

        if let Some(name) = &self.group_id_field {
            let id = builder.push(name.clone(), Rc::new(RowIdentityField), Metadata::new())?;
            dependency_map.set_group_field_id(Some(id));
        }

        for name in &self.forwarded {
            let in_field = inbound.field(name).ok_or_else(|| {
                Error::field_not_found(name.as_str(), self.context("forwarded field"), inbound.name())
            })?;
            let field = MappedField::new(in_field.field().clone(), first_row.clone());
            let id = builder.push(name.clone(), Rc::new(field), in_field.metadata().clone())?;
            dependency_map.map_inbound_field_id_to_outbound_field_id(in_field.field_id(), id);
            first_row_fields.set(id);
        }

        if let Some(name) = &self.count_field {
            let groups = mapping.clone();
            let count = FnField::new(DataType::Int32, move |group| {
                Value::Int32(groups.borrow().group_count(group) as i32)
            });
            let id = builder.push(name.clone(), Rc::new(count), Metadata::new())?;
            dependency_map.set_count_field_id(Some(id));
        }

        let mut calculated = Vec::with_capacity(self.calculated.len());
        for descriptor in &self.calculated {
            let store = Rc::new(ArrayField::with_capacity(descriptor.data_type(), capacity));
            let id = builder.push(
                String::from(descriptor.name()),
                store.clone(),
                descriptor.metadata().clone(),
            )?;
            calculated.push((store, id));
        }

        for name in group_fields {
            if builder.contains(name) {
                continue;
            }
            let in_field = inbound.field(name).ok_or_else(|| {
                Error::field_not_found(name.as_str(), self.context("group function"), inbound.name())
            })?;
            let field = MappedField::new(in_field.field().clone(), first_row.clone());
            let id = builder.push(name.clone(), Rc::new(field), in_field.metadata().clone())?;
            dependency_map.map_inbound_field_id_to_outbound_field_id(in_field.field_id(), id);
            first_row_fields.set(id);
        }

        if builder.is_empty() {
            return Err(Error::invalid_setup(format!(
                "GroupBy '{}' produced an empty parent schema",
                self.name
            )));
        }
        Ok(ParentSchema {
            schema: Rc::new(builder.build()),
            calculated,
            first_row_fields,
        })
    }

    /// Builds the child schema: every inbound row, optionally prefixed with the id of
    /// its group.
    pub fn build_child_schema(
        &self,
        inbound: &Schema,
        mapping: &Rc<RefCell<GroupMapping>>,
    ) -> Result<ChildSchema> {
        let mut builder = SchemaBuilder::new(format!("{}.child", self.name));
        let mut group_field_id = None;
        if let Some(name) = &self.child_group_id_field {
            if inbound.field(name).is_some() {
                return Err(Error::name_collision(
                    self.name.as_str(),
                    name.as_str(),
                    "child group id field",
                    "inbound field",
                ));
            }
            let groups = mapping.clone();
            let field = FnField::new(DataType::Int32, move |row| {
                Value::Int32(row_value(groups.borrow().group_of_row(row)))
            });
            group_field_id = Some(builder.push(name.clone(), Rc::new(field), Metadata::new())?);
        }

        let mut field_mapping = FieldMapping::builder();
        for in_field in inbound.fields() {
            let field: FieldRef = in_field.field().clone();
            let id = builder.push(
                String::from(in_field.name()),
                field,
                in_field.metadata().clone(),
            )?;
            field_mapping.map_inbound_to_outbound(in_field.field_id(), id);
        }
        Ok(ChildSchema {
            schema: Rc::new(builder.build()),
            mapping: field_mapping.build(),
            group_field_id,
        })
    }
}

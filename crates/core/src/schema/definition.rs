//! Schema and schema builder.

use super::field::{Metadata, SchemaField};
use crate::error::{Error, Result};
use crate::field::FieldRef;
use alloc::string::String;
use alloc::vec::Vec;

/// An immutable, named, ordered list of fields.
#[derive(Clone, Debug)]
pub struct Schema {
    /// Schema name.
    name: String,
    /// Fields ordered by field id.
    fields: Vec<SchemaField>,
}

impl Schema {
    /// Returns the schema name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields in id order.
    #[inline]
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Returns the number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Gets a field by id.
    pub fn field_at(&self, field_id: usize) -> Option<&SchemaField> {
        self.fields.get(field_id)
    }

    /// Gets a field by name.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Gets a field id by name.
    pub fn field_id(&self, name: &str) -> Option<usize> {
        self.field(name).map(SchemaField::field_id)
    }

    /// Returns the field names in id order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(SchemaField::name).collect()
    }
}

/// Builder for creating schemas.
///
/// Field ids are assigned in insertion order.
pub struct SchemaBuilder {
    name: String,
    fields: Vec<SchemaField>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field with empty metadata.
    pub fn add_field(self, name: impl Into<String>, field: FieldRef) -> Result<Self> {
        self.add_field_with_metadata(name, field, Metadata::new())
    }

    /// Adds a field with metadata.
    pub fn add_field_with_metadata(
        mut self,
        name: impl Into<String>,
        field: FieldRef,
        metadata: Metadata,
    ) -> Result<Self> {
        self.push(name.into(), field, metadata)?;
        Ok(self)
    }

    /// Adds a field in place and returns its id.
    pub fn push(&mut self, name: String, field: FieldRef, metadata: Metadata) -> Result<usize> {
        if name.is_empty() {
            return Err(Error::invalid_setup("field name cannot be empty"));
        }
        if self.contains(&name) {
            return Err(Error::duplicate_field(self.name.clone(), name));
        }
        let field_id = self.fields.len();
        self.fields
            .push(SchemaField::new(field_id, name, field, metadata));
        Ok(field_id)
    }

    /// Returns true if a field with this name was already added.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    /// Returns the number of fields added so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field was added.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        Schema {
            name: self.name,
            fields: self.fields,
        }
    }
}

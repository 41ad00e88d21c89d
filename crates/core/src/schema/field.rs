//! Schema field definitions.

use crate::field::{FieldRef, RowIndex};
use crate::types::DataType;
use crate::value::Value;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use core::fmt;

/// Free-form annotations carried by a schema field.
///
/// Operators forward metadata unchanged when they forward a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    tags: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
}

impl Metadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds a key/value attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns true if the tag is present.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns the attribute value for `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns true if there are no tags or attributes.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.attributes.is_empty()
    }
}

/// A field published by a schema.
#[derive(Clone)]
pub struct SchemaField {
    /// Position in the schema (0-based, dense).
    field_id: usize,
    /// Field name, unique within the schema.
    name: String,
    /// Accessor for the field values.
    field: FieldRef,
    /// Annotations.
    metadata: Metadata,
}

impl SchemaField {
    pub(crate) fn new(field_id: usize, name: String, field: FieldRef, metadata: Metadata) -> Self {
        Self {
            field_id,
            name,
            field,
            metadata,
        }
    }

    /// Returns the field id.
    #[inline]
    pub fn field_id(&self) -> usize {
        self.field_id
    }

    /// Returns the field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field accessor.
    #[inline]
    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// Returns the field type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.field.data_type()
    }

    /// Returns the field metadata.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Reads the value at `row`.
    #[inline]
    pub fn value_at(&self, row: RowIndex) -> Value {
        self.field.value_at(row)
    }
}

impl fmt::Debug for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaField")
            .field("field_id", &self.field_id)
            .field("name", &self.name)
            .field("data_type", &self.data_type())
            .finish()
    }
}

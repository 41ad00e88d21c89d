//! Field resolution during schema binding.
//!
//! Components that read inbound fields (interners, aggregation functions, caches)
//! never hold a schema; they ask a resolver for fields by name while binding and keep
//! the returned accessors. Resolvers record which fields were requested so the
//! owning operator knows what each component depends on.

use crate::bitset::FieldBitSet;
use crate::error::{Error, Result};
use crate::field::FieldRef;
use crate::schema::Schema;
use crate::types::DataType;
use alloc::string::String;

/// Looks up fields by name.
pub trait FieldResolver {
    /// Returns the field named `name`, or `None` if there is no such field.
    fn find_field(&mut self, name: &str) -> Option<FieldRef>;

    /// Returns the field named `name`, failing with [`Error::FieldNotFound`].
    fn get_field(&mut self, name: &str) -> Result<FieldRef>;

    /// Returns the field named `name` after checking its type.
    fn get_typed_field(&mut self, name: &str, expected: DataType) -> Result<FieldRef> {
        let field = self.get_field(name)?;
        if field.data_type() != expected {
            return Err(Error::type_mismatch(name, expected, field.data_type()));
        }
        Ok(field)
    }
}

/// Resolves fields against a schema and records the ids of every field handed out.
pub struct SchemaFieldResolver<'a> {
    schema: &'a Schema,
    context: String,
    dependencies: FieldBitSet,
}

impl<'a> SchemaFieldResolver<'a> {
    /// Creates a resolver. `context` names the requester in error messages.
    pub fn new(schema: &'a Schema, context: impl Into<String>) -> Self {
        Self {
            schema,
            context: context.into(),
            dependencies: FieldBitSet::new(),
        }
    }

    /// Returns the ids of the fields resolved so far.
    pub fn dependencies(&self) -> &FieldBitSet {
        &self.dependencies
    }

    /// Consumes the resolver, returning the resolved field ids.
    pub fn into_dependencies(self) -> FieldBitSet {
        self.dependencies
    }

    /// Returns the schema being resolved against.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }
}

impl FieldResolver for SchemaFieldResolver<'_> {
    fn find_field(&mut self, name: &str) -> Option<FieldRef> {
        let field = self.schema.field(name)?;
        self.dependencies.set(field.field_id());
        Some(field.field().clone())
    }

    fn get_field(&mut self, name: &str) -> Result<FieldRef> {
        self.find_field(name).ok_or_else(|| {
            Error::field_not_found(name, self.context.clone(), self.schema.name())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ArrayField;
    use crate::schema::SchemaBuilder;
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;

    fn schema() -> Schema {
        SchemaBuilder::new("trades")
            .add_field("Id", Rc::new(ArrayField::new(DataType::Int32)))
            .unwrap()
            .add_field("Qty", Rc::new(ArrayField::new(DataType::Int64)))
            .unwrap()
            .add_field("Px", Rc::new(ArrayField::new(DataType::Float64)))
            .unwrap()
            .build()
    }

    #[test]
    fn test_records_dependencies() {
        let schema = schema();
        let mut resolver = SchemaFieldResolver::new(&schema, "test");
        assert!(resolver.find_field("Px").is_some());
        assert!(resolver.get_field("Id").is_ok());
        assert!(resolver.find_field("Nope").is_none());
        assert_eq!(resolver.dependencies().iter_ones().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_get_field_not_found() {
        let schema = schema();
        let mut resolver = SchemaFieldResolver::new(&schema, "group function");
        let err = resolver.get_field("Nope").err().unwrap();
        assert_eq!(err, Error::field_not_found("Nope", "group function", "trades"));
        assert!(resolver.into_dependencies().is_empty());
    }

    #[test]
    fn test_get_typed_field() {
        let schema = schema();
        let mut resolver = SchemaFieldResolver::new(&schema, "test");
        assert!(resolver.get_typed_field("Qty", DataType::Int64).is_ok());
        let err = resolver.get_typed_field("Qty", DataType::Int32).err().unwrap();
        assert_eq!(err, Error::type_mismatch("Qty", DataType::Int32, DataType::Int64));
    }
}

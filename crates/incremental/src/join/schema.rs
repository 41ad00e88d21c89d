//! Output schema of a Join.

use crate::interner::JoinInterner;
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;
use weft_core::{
    row_value, DataType, Error, FieldBitSet, FieldMapping, FieldMappingBuilder, FieldRef, FnField,
    MappedField, Metadata, Result, RowMapper, Schema, SchemaBuilder, SchemaFieldResolver, Value,
};

/// How many times a conflicting name is passed back to the resolver before giving up.
const MAX_RESOLVE_ATTEMPTS: usize = 64;

/// Which join key fields appear in the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinKeyHandling {
    #[default]
    KeepAll,
    KeepLeft,
    KeepRight,
    DropAll,
}

impl JoinKeyHandling {
    /// Returns true if the key fields of `side` are kept.
    pub fn keeps(self, side: JoinSide) -> bool {
        match (self, side) {
            (JoinKeyHandling::KeepAll, _) => true,
            (JoinKeyHandling::KeepLeft, JoinSide::Left) => true,
            (JoinKeyHandling::KeepRight, JoinSide::Right) => true,
            _ => false,
        }
    }
}

/// One of the two inputs of a Join.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinSide {
    Left,
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Left => f.write_str("left"),
            JoinSide::Right => f.write_str("right"),
        }
    }
}

/// Picks a replacement for an output field name that is already taken.
///
/// Returning `None` drops the field. A returned name that is still taken is passed
/// back to the resolver.
pub trait NameConflictResolver {
    fn resolve_name_conflict(&self, name: &str, is_usable: &dyn Fn(&str) -> bool) -> Option<String>;
}

/// Appends `_1`, `_2`, ... and picks the first unused name.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuffixNameResolver;

impl NameConflictResolver for SuffixNameResolver {
    fn resolve_name_conflict(&self, name: &str, is_usable: &dyn Fn(&str) -> bool) -> Option<String> {
        let mut count = 1usize;
        loop {
            let candidate = format!("{}_{}", name, count);
            if is_usable(&candidate) {
                return Some(candidate);
            }
            count += 1;
        }
    }
}

/// Drops every conflicting field.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropConflicts;

impl NameConflictResolver for DropConflicts {
    fn resolve_name_conflict(&self, _name: &str, _is_usable: &dyn Fn(&str) -> bool) -> Option<String> {
        None
    }
}

impl<F> NameConflictResolver for F
where
    F: Fn(&str, &dyn Fn(&str) -> bool) -> Option<String>,
{
    fn resolve_name_conflict(&self, name: &str, is_usable: &dyn Fn(&str) -> bool) -> Option<String> {
        self(name, is_usable)
    }
}

/// What the Join needs to know about one side after binding.
#[derive(Clone, Debug, Default)]
pub struct JoinSideBinding {
    /// Inbound field id to output field id.
    pub field_mapping: FieldMapping,
    /// Output fields owned by this side, including its source-row field.
    pub out_field_ids: FieldBitSet,
    /// Inbound fields the join key reads.
    pub key_dependencies: FieldBitSet,
}

/// A bound Join output schema.
pub struct JoinSchema {
    pub schema: Rc<Schema>,
    pub left: JoinSideBinding,
    pub right: JoinSideBinding,
}

/// Builds the merged output schema of a Join.
///
/// Fields are, in order: the left source-row field, the right source-row field, the
/// left fields, then the right fields. Key fields are dropped according to the
/// [`JoinKeyHandling`] and name conflicts are settled by the [`NameConflictResolver`].
pub struct JoinSchemaBuilder {
    name: String,
    left_source_row_field: Option<String>,
    right_source_row_field: Option<String>,
    key_handling: JoinKeyHandling,
    resolver: Box<dyn NameConflictResolver>,
}

impl JoinSchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            left_source_row_field: None,
            right_source_row_field: None,
            key_handling: JoinKeyHandling::default(),
            resolver: Box::new(SuffixNameResolver),
        }
    }

    pub fn with_left_source_row_field(mut self, name: Option<String>) -> Self {
        self.left_source_row_field = name;
        self
    }

    pub fn with_right_source_row_field(mut self, name: Option<String>) -> Self {
        self.right_source_row_field = name;
        self
    }

    pub fn with_key_handling(mut self, handling: JoinKeyHandling) -> Self {
        self.key_handling = handling;
        self
    }

    pub fn with_name_conflict_resolver(mut self, resolver: Box<dyn NameConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds `interner` to both schemas and builds the output schema.
    ///
    /// Output fields read their side's inbound field through the side's row mapper.
    pub fn build_schema(
        &self,
        left: &Schema,
        right: &Schema,
        interner: &mut dyn JoinInterner,
        left_mapper: Rc<dyn RowMapper>,
        right_mapper: Rc<dyn RowMapper>,
    ) -> Result<JoinSchema> {
        let context = format!("join key of Join '{}'", self.name);
        let mut left_resolver = SchemaFieldResolver::new(left, context.clone());
        let mut right_resolver = SchemaFieldResolver::new(right, context);
        interner.bind_to_schemas(&mut left_resolver, &mut right_resolver)?;

        let mut left_binding = JoinSideBinding {
            key_dependencies: left_resolver.into_dependencies(),
            ..JoinSideBinding::default()
        };
        let mut right_binding = JoinSideBinding {
            key_dependencies: right_resolver.into_dependencies(),
            ..JoinSideBinding::default()
        };

        let mut builder = SchemaBuilder::new(self.name.clone());
        if let Some(name) = &self.left_source_row_field {
            let id = builder.push(name.clone(), source_row_field(left_mapper.clone()), Metadata::new())?;
            left_binding.out_field_ids.set(id);
        }
        if let Some(name) = &self.right_source_row_field {
            let id = builder.push(name.clone(), source_row_field(right_mapper.clone()), Metadata::new())?;
            right_binding.out_field_ids.set(id);
        }

        self.add_side(&mut builder, left, JoinSide::Left, &left_mapper, &mut left_binding)?;
        self.add_side(&mut builder, right, JoinSide::Right, &right_mapper, &mut right_binding)?;

        Ok(JoinSchema {
            schema: Rc::new(builder.build()),
            left: left_binding,
            right: right_binding,
        })
    }

    fn add_side(
        &self,
        builder: &mut SchemaBuilder,
        schema: &Schema,
        side: JoinSide,
        mapper: &Rc<dyn RowMapper>,
        binding: &mut JoinSideBinding,
    ) -> Result<()> {
        let keep_keys = self.key_handling.keeps(side);
        let mut mapping = FieldMappingBuilder::with_capacity(schema.len());
        for in_field in schema.fields() {
            if !keep_keys && binding.key_dependencies.get(in_field.field_id()) {
                continue;
            }
            let Some(name) = self.resolve_name(builder, in_field.name())? else {
                continue;
            };
            let field = MappedField::new(in_field.field().clone(), mapper.clone());
            let id = builder.push(name, Rc::new(field), in_field.metadata().clone())?;
            binding.out_field_ids.set(id);
            mapping.map_inbound_to_outbound(in_field.field_id(), id);
        }
        binding.field_mapping = mapping.build();
        Ok(())
    }

    fn resolve_name(&self, builder: &SchemaBuilder, name: &str) -> Result<Option<String>> {
        if !builder.contains(name) {
            return Ok(Some(String::from(name)));
        }
        let is_usable = |candidate: &str| !builder.contains(candidate);
        let mut attempted = String::from(name);
        for _ in 0..MAX_RESOLVE_ATTEMPTS {
            match self.resolver.resolve_name_conflict(&attempted, &is_usable) {
                None => return Ok(None),
                Some(candidate) if is_usable(candidate.as_str()) => return Ok(Some(candidate)),
                Some(candidate) => attempted = candidate,
            }
        }
        Err(Error::invalid_setup(format!(
            "Join '{}' could not resolve a unique name for '{}' after {} attempts",
            self.name, name, MAX_RESOLVE_ATTEMPTS
        )))
    }
}

fn source_row_field(mapper: Rc<dyn RowMapper>) -> FieldRef {
    Rc::new(FnField::new(DataType::Int32, move |row| {
        Value::Int32(row_value(mapper.source_row_of(row)))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::DynamicJoinInterner;
    use alloc::vec;
    use alloc::vec::Vec;
    use weft_core::{ArrayField, IdentityRowMapper, NO_ROW};

    struct Unmapped;

    impl RowMapper for Unmapped {
        fn source_row_of(&self, _row: usize) -> usize {
            NO_ROW
        }
    }

    fn schema(name: &str, fields: &[&str]) -> Schema {
        let mut builder = SchemaBuilder::new(name);
        for field in fields {
            builder
                .push(String::from(*field), Rc::new(ArrayField::new(DataType::Int32)), Metadata::new())
                .unwrap();
        }
        builder.build()
    }

    fn build(builder: &JoinSchemaBuilder, left: &Schema, right: &Schema, keys: (&[&str], &[&str])) -> JoinSchema {
        let mut interner = DynamicJoinInterner::new(keys.0.iter().copied(), keys.1.iter().copied(), 4).unwrap();
        builder
            .build_schema(left, right, &mut interner, Rc::new(IdentityRowMapper), Rc::new(Unmapped))
            .unwrap()
    }

    #[test]
    fn test_source_row_fields_come_first() {
        let left = schema("l", &["A", "K"]);
        let right = schema("r", &["K", "B"]);
        let builder = JoinSchemaBuilder::new("j")
            .with_left_source_row_field(Some(String::from("LeftRow")))
            .with_right_source_row_field(Some(String::from("RightRow")));
        let joined = build(&builder, &left, &right, (&["K"], &["K"]));
        assert_eq!(
            joined.schema.field_names(),
            vec!["LeftRow", "RightRow", "A", "K", "K_1", "B"]
        );
        assert_eq!(joined.left.out_field_ids, FieldBitSet::from_bits([0, 2, 3]));
        assert_eq!(joined.right.out_field_ids, FieldBitSet::from_bits([1, 4, 5]));
        assert_eq!(joined.schema.fields()[0].value_at(7), Value::Int32(7));
        assert_eq!(joined.schema.fields()[1].value_at(7), Value::Int32(-1));
    }

    #[test]
    fn test_key_dependencies_and_mapping() {
        let left = schema("l", &["A", "K"]);
        let right = schema("r", &["B", "K"]);
        let joined = build(&JoinSchemaBuilder::new("j"), &left, &right, (&["K"], &["K"]));
        assert_eq!(joined.left.key_dependencies, FieldBitSet::from_bits([1]));
        assert_eq!(joined.right.key_dependencies, FieldBitSet::from_bits([1]));
        assert_eq!(joined.right.field_mapping.outbound_field_id(0), Some(2));
        assert_eq!(joined.right.field_mapping.outbound_field_id(1), Some(3));
    }

    #[test]
    fn test_drop_conflicts() {
        let left = schema("l", &["A", "K"]);
        let right = schema("r", &["K", "A", "B"]);
        let builder = JoinSchemaBuilder::new("j").with_name_conflict_resolver(Box::new(DropConflicts));
        let joined = build(&builder, &left, &right, (&["K"], &["K"]));
        assert_eq!(joined.schema.field_names(), vec!["A", "K", "B"]);
        assert_eq!(joined.right.field_mapping.outbound_field_id(1), None);
    }

    #[test]
    fn test_closure_resolver_cascades() {
        let left = schema("l", &["A", "A_x", "A_x_x"]);
        let right = schema("r", &["A"]);
        let resolver = |name: &str, _usable: &dyn Fn(&str) -> bool| Some(format!("{}_x", name));
        let builder = JoinSchemaBuilder::new("j").with_name_conflict_resolver(Box::new(resolver));
        let joined = build(&builder, &left, &right, (&[], &[]));
        assert_eq!(joined.schema.field_names(), vec!["A", "A_x", "A_x_x", "A_x_x_x"]);
    }

    #[test]
    fn test_resolver_that_never_settles() {
        let left = schema("l", &["A"]);
        let right = schema("r", &["A"]);
        let resolver = |name: &str, _usable: &dyn Fn(&str) -> bool| Some(String::from(name));
        let builder = JoinSchemaBuilder::new("j").with_name_conflict_resolver(Box::new(resolver));
        let mut interner = DynamicJoinInterner::new(Vec::<String>::new(), Vec::<String>::new(), 4).unwrap();
        let err = builder
            .build_schema(&left, &right, &mut interner, Rc::new(IdentityRowMapper), Rc::new(Unmapped))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidSetup { .. }));
    }

    #[test]
    fn test_missing_key_field() {
        let left = schema("l", &["A"]);
        let right = schema("r", &["B"]);
        let mut interner = DynamicJoinInterner::new(["K"], ["K"], 4).unwrap();
        let err = JoinSchemaBuilder::new("j")
            .build_schema(&left, &right, &mut interner, Rc::new(IdentityRowMapper), Rc::new(Unmapped))
            .err()
            .unwrap();
        assert!(matches!(err, Error::FieldNotFound { .. }));
    }

    #[test]
    fn test_key_handling() {
        assert!(JoinKeyHandling::KeepAll.keeps(JoinSide::Right));
        assert!(JoinKeyHandling::KeepLeft.keeps(JoinSide::Left));
        assert!(!JoinKeyHandling::KeepLeft.keeps(JoinSide::Right));
        assert!(!JoinKeyHandling::DropAll.keeps(JoinSide::Left));
    }
}

//! Setup of Join operators.

use super::lookup::LookupJoinMapper;
use super::operator::Join;
use super::schema::{JoinKeyHandling, JoinSchemaBuilder, NameConflictResolver};
use crate::groupby::DEFAULT_CAPACITY;
use crate::interner::{DynamicJoinInterner, JoinInterner};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use weft_core::{Error, Result};

enum JoinKeys {
    Fields { left: Vec<String>, right: Vec<String> },
    Custom(Box<dyn JoinInterner>),
}

/// Builder for a lookup [`Join`].
///
/// ```ignore
/// let join = JoinBuilder::new("orders_with_prices")
///     .join_on(["Product"], ["Product"])
///     .outer()
///     .with_join_key_handling(JoinKeyHandling::KeepLeft)
///     .build()?;
/// orders.output().attach(join.left_input());
/// prices.output().attach(join.right_input());
/// ```
pub struct JoinBuilder {
    name: String,
    keys: Option<JoinKeys>,
    left_source_row_field: Option<String>,
    right_source_row_field: Option<String>,
    outer: bool,
    key_handling: JoinKeyHandling,
    resolver: Option<Box<dyn NameConflictResolver>>,
    capacity: usize,
}

impl JoinBuilder {
    /// Starts an inner join with no key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: None,
            left_source_row_field: None,
            right_source_row_field: None,
            outer: false,
            key_handling: JoinKeyHandling::default(),
            resolver: None,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Joins rows whose named left fields equal the named right fields, pairwise.
    pub fn join_on<L, R>(
        mut self,
        left: impl IntoIterator<Item = L>,
        right: impl IntoIterator<Item = R>,
    ) -> Self
    where
        L: Into<String>,
        R: Into<String>,
    {
        self.keys = Some(JoinKeys::Fields {
            left: left.into_iter().map(Into::into).collect(),
            right: right.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Joins rows with a custom interner.
    pub fn with_interner(mut self, interner: Box<dyn JoinInterner>) -> Self {
        self.keys = Some(JoinKeys::Custom(interner));
        self
    }

    /// Adds an output field holding the left row index.
    pub fn include_left_source_row_as(mut self, name: impl Into<String>) -> Self {
        self.left_source_row_field = Some(name.into());
        self
    }

    /// Adds an output field holding the joined right row index, `-1` when unmatched.
    pub fn include_right_source_row_as(mut self, name: impl Into<String>) -> Self {
        self.right_source_row_field = Some(name.into());
        self
    }

    pub fn inner(mut self) -> Self {
        self.outer = false;
        self
    }

    pub fn outer(mut self) -> Self {
        self.outer = true;
        self
    }

    pub fn with_join_key_handling(mut self, handling: JoinKeyHandling) -> Self {
        self.key_handling = handling;
        self
    }

    pub fn with_name_conflict_resolver(mut self, resolver: impl NameConflictResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Sizes internal storage for `capacity` rows and keys.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Join> {
        let interner: Box<dyn JoinInterner> = match self.keys {
            Some(JoinKeys::Fields { left, right }) => {
                Box::new(DynamicJoinInterner::new(left, right, self.capacity)?)
            }
            Some(JoinKeys::Custom(interner)) => interner,
            None => {
                return Err(Error::invalid_setup(format!(
                    "Join '{}' has no join key; call join_on or with_interner",
                    self.name
                )))
            }
        };
        let mut schema_builder = JoinSchemaBuilder::new(self.name)
            .with_left_source_row_field(self.left_source_row_field)
            .with_right_source_row_field(self.right_source_row_field)
            .with_key_handling(self.key_handling);
        if let Some(resolver) = self.resolver {
            schema_builder = schema_builder.with_name_conflict_resolver(resolver);
        }
        let mapper = LookupJoinMapper::new(interner, self.outer, self.capacity);
        Ok(Join::new(schema_builder, mapper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_required() {
        let err = JoinBuilder::new("j").build().err().unwrap();
        assert!(matches!(err, Error::InvalidSetup { .. }));
    }

    #[test]
    fn test_key_arity_checked() {
        let err = JoinBuilder::new("j")
            .join_on(["A", "B"], ["A"])
            .build()
            .err()
            .unwrap();
        assert_eq!(err, Error::JoinKeyArity { left: 2, right: 1 });
    }

    #[test]
    fn test_outer_flag() {
        let join = JoinBuilder::new("j").join_on(["A"], ["A"]).outer().build().unwrap();
        assert!(join.is_outer());
        assert_eq!(join.name(), "j");
        assert!(join.output().schema().is_none());
    }
}

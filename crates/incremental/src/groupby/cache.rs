//! Previous-value cache for aggregation inputs.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use weft_core::{
    ArrayField, Error, FieldBitSet, FieldRef, FieldResolver, Result, RowIndex, Schema,
    WritableField,
};

struct CachedField {
    name: String,
    inbound_field_id: usize,
    source: FieldRef,
    store: Rc<ArrayField>,
}

struct BoundCache {
    schema_name: String,
    fields: Vec<CachedField>,
    by_inbound_id: Vec<Option<usize>>,
}

/// Holds the values of selected inbound fields as of the last processed batch.
///
/// Aggregation functions read the cache to learn what a row contributed before it
/// changed or was removed. The owning operator updates the cache after firing.
pub struct Cache {
    field_names: Vec<String>,
    capacity: usize,
    bound: Option<BoundCache>,
}

impl Cache {
    /// Creates a cache for the named inbound fields.
    pub fn new<S: Into<String>>(field_names: impl IntoIterator<Item = S>, capacity: usize) -> Self {
        let mut cache = Self {
            field_names: Vec::new(),
            capacity,
            bound: None,
        };
        for name in field_names {
            cache.add_field(name);
        }
        cache
    }

    /// Adds a field to cache. Adding a name twice is a no-op.
    pub fn add_field(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.field_names.contains(&name) {
            self.field_names.push(name);
        }
    }

    /// Returns the cached field names.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Returns true if the cache is bound to a schema.
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Creates storage for every cached field of `schema`.
    pub fn bind(&mut self, schema: &Schema) -> Result<()> {
        let mut fields = Vec::with_capacity(self.field_names.len());
        let mut by_inbound_id = Vec::new();
        for name in &self.field_names {
            let in_field = schema
                .field(name)
                .ok_or_else(|| Error::field_not_found(name.as_str(), "cache", schema.name()))?;
            let id = in_field.field_id();
            if id >= by_inbound_id.len() {
                by_inbound_id.resize(id + 1, None);
            }
            by_inbound_id[id] = Some(fields.len());
            fields.push(CachedField {
                name: name.clone(),
                inbound_field_id: id,
                source: in_field.field().clone(),
                store: Rc::new(ArrayField::with_capacity(in_field.data_type(), self.capacity)),
            });
        }
        self.bound = Some(BoundCache {
            schema_name: String::from(schema.name()),
            fields,
            by_inbound_id,
        });
        Ok(())
    }

    /// Drops all cached values and storage.
    pub fn unbind(&mut self) {
        self.bound = None;
    }

    /// Copies every cached field of `rows`.
    pub fn update_all(&self, rows: &[RowIndex]) {
        if let Some(bound) = &self.bound {
            for field in &bound.fields {
                copy_rows(field, rows);
            }
        }
    }

    /// Copies only the cached fields that are in `changed`.
    pub fn update_selected(&self, rows: &[RowIndex], changed: &FieldBitSet) {
        if let Some(bound) = &self.bound {
            for inbound in changed.iter_ones() {
                if let Some(Some(index)) = bound.by_inbound_id.get(inbound) {
                    copy_rows(&bound.fields[*index], rows);
                }
            }
        }
    }

    /// Returns the ids of the inbound fields being cached.
    pub fn inbound_field_ids(&self) -> FieldBitSet {
        self.bound
            .iter()
            .flat_map(|b| b.fields.iter().map(|f| f.inbound_field_id))
            .collect()
    }

    /// Returns a resolver over the cached (previous) values.
    pub fn resolver(&self) -> CacheResolver<'_> {
        CacheResolver { cache: self }
    }
}

fn copy_rows(field: &CachedField, rows: &[RowIndex]) {
    for &row in rows {
        field.store.set_value_at(row, field.source.value_at(row));
    }
}

/// Resolves field names to their cached previous values.
pub struct CacheResolver<'a> {
    cache: &'a Cache,
}

impl CacheResolver<'_> {
    fn lookup(&self, name: &str) -> Result<FieldRef> {
        let bound = self
            .cache
            .bound
            .as_ref()
            .ok_or_else(|| Error::schema_not_bound("cache"))?;
        bound
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.store.clone() as FieldRef)
            .ok_or_else(|| Error::field_not_found(name, "cache", bound.schema_name.as_str()))
    }
}

impl FieldResolver for CacheResolver<'_> {
    fn find_field(&mut self, name: &str) -> Option<FieldRef> {
        self.lookup(name).ok()
    }

    fn get_field(&mut self, name: &str) -> Result<FieldRef> {
        self.lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{DataType, SchemaBuilder, Value};

    fn schema() -> (Schema, Rc<ArrayField>, Rc<ArrayField>) {
        let a = Rc::new(ArrayField::new(DataType::Int32));
        let b = Rc::new(ArrayField::new(DataType::Int64));
        let schema = SchemaBuilder::new("in")
            .add_field("A", a.clone())
            .unwrap()
            .add_field("B", b.clone())
            .unwrap()
            .build();
        (schema, a, b)
    }

    #[test]
    fn test_unbound_resolver_fails() {
        let cache = Cache::new(["A"], 8);
        let err = cache.resolver().get_field("A").err().unwrap();
        assert_eq!(err, Error::schema_not_bound("cache"));
    }

    #[test]
    fn test_bind_missing_field() {
        let (schema, _, _) = schema();
        let mut cache = Cache::new(["Z"], 8);
        let err = cache.bind(&schema).err().unwrap();
        assert_eq!(err, Error::field_not_found("Z", "cache", "in"));
    }

    #[test]
    fn test_update_all_and_selected() {
        let (schema, a, b) = schema();
        let mut cache = Cache::new(["A", "B", "A"], 8);
        assert_eq!(cache.field_names().len(), 2);
        cache.bind(&schema).unwrap();
        assert!(cache.is_bound());

        a.set_value_at(0, Value::Int32(1));
        b.set_value_at(0, Value::Int64(10));
        cache.update_all(&[0]);

        let prev_a = cache.resolver().get_field("A").unwrap();
        let prev_b = cache.resolver().get_field("B").unwrap();
        assert_eq!(prev_a.value_at(0), Value::Int32(1));
        assert_eq!(prev_b.value_at(0), Value::Int64(10));

        a.set_value_at(0, Value::Int32(2));
        b.set_value_at(0, Value::Int64(20));
        cache.update_selected(&[0], &FieldBitSet::from_bits([1]));
        assert_eq!(prev_a.value_at(0), Value::Int32(1));
        assert_eq!(prev_b.value_at(0), Value::Int64(20));
        assert_eq!(cache.inbound_field_ids(), FieldBitSet::from_bits([0, 1]));

        cache.unbind();
        assert!(cache.resolver().find_field("A").is_none());
    }
}

//! Row interning: mapping rows to small, stable integer keys.
//!
//! A [`RowInterner`] turns the values of a fixed set of fields into a key. Rows
//! with equal values get equal keys, so the key serves as a group id (GroupBy) or
//! a join key (Lookup Join). A [`JoinInterner`] pairs two row interners that share
//! one key space.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use weft_core::{DataType, Error, FieldRef, FieldResolver, Result, RowIndex, Value};

/// Key reserved for "no key".
pub const UNSET_KEY: usize = usize::MAX;

/// Maps rows to stable integer keys.
pub trait RowInterner {
    /// Resolves the key fields. Every field requested through `resolver` becomes a
    /// dependency of the key.
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()>;

    /// Drops the resolved fields and every interned key.
    fn unbind_schema(&mut self);

    /// Returns the key of `row`. Interning the same values again yields the same key.
    fn intern(&mut self, row: RowIndex) -> usize;

    /// Releases a key that no row uses any more, allowing it to be reused.
    fn free_entry(&mut self, key: usize) {
        let _ = key;
    }
}

/// Maps every row to key 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantRowInterner;

impl RowInterner for ConstantRowInterner {
    fn bind_to_schema(&mut self, _resolver: &mut dyn FieldResolver) -> Result<()> {
        Ok(())
    }

    fn unbind_schema(&mut self) {}

    fn intern(&mut self, _row: RowIndex) -> usize {
        0
    }
}

/// Assigns dense keys to value tuples, recycling freed keys.
#[derive(Debug, Default)]
pub struct InternSet {
    keys: HashMap<Vec<Value>, usize>,
    entries: Vec<Option<Vec<Value>>>,
    free: Vec<usize>,
}

impl InternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Returns the key of `tuple`, assigning one if needed.
    pub fn intern(&mut self, tuple: &[Value]) -> usize {
        if let Some(key) = self.keys.get(tuple) {
            return *key;
        }
        let owned = tuple.to_vec();
        let key = match self.free.pop() {
            Some(key) => {
                self.entries[key] = Some(owned.clone());
                key
            }
            None => {
                self.entries.push(Some(owned.clone()));
                self.entries.len() - 1
            }
        };
        self.keys.insert(owned, key);
        key
    }

    /// Returns the key of `tuple` without assigning one.
    pub fn lookup(&self, tuple: &[Value]) -> Option<usize> {
        self.keys.get(tuple).copied()
    }

    /// Returns the tuple interned under `key`.
    pub fn tuple_of(&self, key: usize) -> Option<&[Value]> {
        self.entries.get(key).and_then(|e| e.as_deref())
    }

    /// Releases `key`. Releasing an unknown or already free key is a no-op.
    pub fn free(&mut self, key: usize) {
        if let Some(entry) = self.entries.get_mut(key) {
            if let Some(tuple) = entry.take() {
                self.keys.remove(&tuple);
                self.free.push(key);
            }
        }
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.entries.clear();
        self.free.clear();
    }
}

/// Reads a tuple of field values per row and interns it.
struct TupleKeys {
    fields: Vec<FieldRef>,
    scratch: Vec<Value>,
}

impl TupleKeys {
    fn new(fields: Vec<FieldRef>) -> Self {
        let scratch = Vec::with_capacity(fields.len());
        Self { fields, scratch }
    }

    fn intern(&mut self, set: &mut InternSet, row: RowIndex) -> usize {
        self.scratch.clear();
        self.scratch
            .extend(self.fields.iter().map(|field| field.value_at(row)));
        set.intern(&self.scratch)
    }
}

/// Interns a fixed list of fields with declared types.
///
/// Binding fails if a field is missing or has a different type than declared.
pub struct FieldListInterner {
    fields: Vec<(String, DataType)>,
    keys: Option<TupleKeys>,
    set: InternSet,
}

impl FieldListInterner {
    /// Creates an interner over `(name, type)` pairs.
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = (S, DataType)>) -> Self {
        Self {
            fields: fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            keys: None,
            set: InternSet::new(),
        }
    }

    /// Creates an interner over a single field.
    pub fn single(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new([(name.into(), data_type)])
    }

    /// Returns the number of live keys.
    pub fn key_count(&self) -> usize {
        self.set.len()
    }
}

impl RowInterner for FieldListInterner {
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        let fields = self
            .fields
            .iter()
            .map(|(name, data_type)| resolver.get_typed_field(name, *data_type))
            .collect::<Result<Vec<_>>>()?;
        self.keys = Some(TupleKeys::new(fields));
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.keys = None;
        self.set.clear();
    }

    fn intern(&mut self, row: RowIndex) -> usize {
        match self.keys.as_mut() {
            Some(keys) => keys.intern(&mut self.set, row),
            None => UNSET_KEY,
        }
    }

    fn free_entry(&mut self, key: usize) {
        self.set.free(key);
    }
}

enum Strategy {
    Unbound,
    Constant,
    Tuple(TupleKeys),
}

/// Interns whatever fields are named, choosing a strategy when bound.
///
/// No names puts every row under key 0; one or more names intern the tuple of field
/// values, whatever their types.
pub struct DynamicRowInterner {
    names: Vec<String>,
    strategy: Strategy,
    set: InternSet,
}

impl DynamicRowInterner {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::with_capacity(names, 0)
    }

    pub fn with_capacity<S: Into<String>>(names: impl IntoIterator<Item = S>, capacity: usize) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            strategy: Strategy::Unbound,
            set: InternSet::with_capacity(capacity),
        }
    }

    /// Returns the field names forming the key.
    pub fn field_names(&self) -> &[String] {
        &self.names
    }
}

impl RowInterner for DynamicRowInterner {
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.strategy = if self.names.is_empty() {
            Strategy::Constant
        } else {
            let fields = self
                .names
                .iter()
                .map(|name| resolver.get_field(name))
                .collect::<Result<Vec<_>>>()?;
            Strategy::Tuple(TupleKeys::new(fields))
        };
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.strategy = Strategy::Unbound;
        self.set.clear();
    }

    fn intern(&mut self, row: RowIndex) -> usize {
        match &mut self.strategy {
            Strategy::Unbound => UNSET_KEY,
            Strategy::Constant => 0,
            Strategy::Tuple(keys) => keys.intern(&mut self.set, row),
        }
    }

    fn free_entry(&mut self, key: usize) {
        if let Strategy::Tuple(_) = self.strategy {
            self.set.free(key);
        }
    }
}

/// A pair of row interners sharing one key space.
///
/// A left row and a right row match iff they intern to the same key.
pub trait JoinInterner {
    /// Resolves the key fields on both sides.
    fn bind_to_schemas(
        &mut self,
        left: &mut dyn FieldResolver,
        right: &mut dyn FieldResolver,
    ) -> Result<()>;

    /// Drops resolved fields and every interned key.
    fn unbind_schemas(&mut self);

    /// Returns the interner for left rows.
    fn left(&mut self) -> &mut dyn RowInterner;

    /// Returns the interner for right rows.
    fn right(&mut self) -> &mut dyn RowInterner;
}

/// One side of a [`DynamicJoinInterner`].
struct SharedSideInterner {
    keys: Option<TupleKeys>,
    set: Rc<RefCell<InternSet>>,
}

impl RowInterner for SharedSideInterner {
    fn bind_to_schema(&mut self, _resolver: &mut dyn FieldResolver) -> Result<()> {
        // fields are resolved by the owning join interner, which checks both sides together
        Ok(())
    }

    fn unbind_schema(&mut self) {
        self.keys = None;
    }

    fn intern(&mut self, row: RowIndex) -> usize {
        match self.keys.as_mut() {
            Some(keys) => keys.intern(&mut self.set.borrow_mut(), row),
            None => UNSET_KEY,
        }
    }
}

/// Join interner over paired lists of left and right field names.
///
/// Binding requires each left field to have the same type as its right counterpart.
pub struct DynamicJoinInterner {
    left_names: Vec<String>,
    right_names: Vec<String>,
    set: Rc<RefCell<InternSet>>,
    left: SharedSideInterner,
    right: SharedSideInterner,
}

impl DynamicJoinInterner {
    /// Creates a join interner. Fails if the name lists differ in length.
    pub fn new<L, R>(
        left_names: impl IntoIterator<Item = L>,
        right_names: impl IntoIterator<Item = R>,
        capacity: usize,
    ) -> Result<Self>
    where
        L: Into<String>,
        R: Into<String>,
    {
        let left_names: Vec<String> = left_names.into_iter().map(Into::into).collect();
        let right_names: Vec<String> = right_names.into_iter().map(Into::into).collect();
        if left_names.len() != right_names.len() {
            return Err(Error::JoinKeyArity {
                left: left_names.len(),
                right: right_names.len(),
            });
        }
        let set = Rc::new(RefCell::new(InternSet::with_capacity(capacity)));
        Ok(Self {
            left_names,
            right_names,
            left: SharedSideInterner {
                keys: None,
                set: set.clone(),
            },
            right: SharedSideInterner {
                keys: None,
                set: set.clone(),
            },
            set,
        })
    }

    /// Returns the number of live keys.
    pub fn key_count(&self) -> usize {
        self.set.borrow().len()
    }
}

impl JoinInterner for DynamicJoinInterner {
    fn bind_to_schemas(
        &mut self,
        left: &mut dyn FieldResolver,
        right: &mut dyn FieldResolver,
    ) -> Result<()> {
        let mut left_fields = Vec::with_capacity(self.left_names.len());
        let mut right_fields = Vec::with_capacity(self.right_names.len());
        for (l, r) in self.left_names.iter().zip(self.right_names.iter()) {
            let lf = left.get_field(l)?;
            let rf = right.get_field(r)?;
            if lf.data_type() != rf.data_type() {
                return Err(Error::type_mismatch(
                    format!("join key {} = {}", l, r),
                    lf.data_type(),
                    rf.data_type(),
                ));
            }
            left_fields.push(lf);
            right_fields.push(rf);
        }
        self.left.keys = Some(TupleKeys::new(left_fields));
        self.right.keys = Some(TupleKeys::new(right_fields));
        Ok(())
    }

    fn unbind_schemas(&mut self) {
        self.left.unbind_schema();
        self.right.unbind_schema();
        self.set.borrow_mut().clear();
    }

    fn left(&mut self) -> &mut dyn RowInterner {
        &mut self.left
    }

    fn right(&mut self) -> &mut dyn RowInterner {
        &mut self.right
    }
}

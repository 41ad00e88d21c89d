//! Key-indexed source table.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use tracing::{debug, trace};
use weft_core::{
    ArrayField, BitSet, DataType, Error, Metadata, Result, RowIndex, Schema, SchemaBuilder, Value,
    WritableField,
};
use weft_incremental::{BitSetRowProvider, StateChangeSet, TransformOutput, DEFAULT_CAPACITY};

/// Builder for [`KeyedTable`].
pub struct KeyedTableBuilder {
    name: String,
    key_name: String,
    key_type: DataType,
    fields: Vec<(String, DataType, Metadata)>,
    capacity: usize,
}

impl KeyedTableBuilder {
    /// Starts a table whose first field is the key.
    pub fn new(name: impl Into<String>, key_name: impl Into<String>, key_type: DataType) -> Self {
        Self {
            name: name.into(),
            key_name: key_name.into(),
            key_type,
            fields: Vec::new(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Adds a value field.
    pub fn add_field(self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        self.add_field_with_metadata(name, data_type, Metadata::new())
    }

    /// Adds a value field with metadata.
    pub fn add_field_with_metadata(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        metadata: Metadata,
    ) -> Result<Self> {
        let name = name.into();
        if name == self.key_name || self.fields.iter().any(|(n, _, _)| *n == name) {
            return Err(Error::duplicate_field(self.name, name));
        }
        self.fields.push((name, data_type, metadata));
        Ok(self)
    }

    /// Sizes storage for `capacity` rows.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> Result<KeyedTable> {
        let mut builder = SchemaBuilder::new(self.name.clone());
        let mut columns = Vec::with_capacity(self.fields.len() + 1);
        let key = Rc::new(ArrayField::with_capacity(self.key_type, self.capacity));
        builder.push(self.key_name, key.clone(), Metadata::new().with_tag("key"))?;
        columns.push(key);
        for (name, data_type, metadata) in self.fields {
            let column = Rc::new(ArrayField::with_capacity(data_type, self.capacity));
            builder.push(name, column.clone(), metadata)?;
            columns.push(column);
        }
        let schema = Rc::new(builder.build());

        let active = Rc::new(RefCell::new(BitSet::with_capacity(self.capacity)));
        let output = TransformOutput::new(BitSetRowProvider::new(active.clone()));
        output.update_schema(Some(schema.clone()));
        let mut changes = StateChangeSet::new();
        changes.set_field_count(schema.len());
        debug!(table = %self.name, fields = schema.len(), "table created");

        Ok(KeyedTable {
            name: self.name,
            schema,
            columns,
            key_to_row: HashMap::with_capacity(self.capacity),
            free_rows: Vec::new(),
            pending_free: Vec::new(),
            next_row: 0,
            active,
            changes,
            output,
        })
    }
}

/// An in-memory table whose rows are addressed by a unique key.
///
/// Mutations are buffered until [`KeyedTable::fire_changes`]. Row slots of removed
/// rows stay readable until the batch fires and are reused afterwards.
pub struct KeyedTable {
    name: String,
    schema: Rc<Schema>,
    columns: Vec<Rc<ArrayField>>,
    key_to_row: HashMap<Value, RowIndex>,
    free_rows: Vec<RowIndex>,
    pending_free: Vec<RowIndex>,
    next_row: RowIndex,
    active: Rc<RefCell<BitSet>>,
    changes: StateChangeSet,
    output: TransformOutput,
}

impl KeyedTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Rc<Schema> {
        self.schema.clone()
    }

    /// Returns the output to attach operators to.
    pub fn output(&self) -> TransformOutput {
        self.output.clone()
    }

    /// Returns the number of live rows.
    pub fn len(&self) -> usize {
        self.key_to_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_row.is_empty()
    }

    /// Returns the row holding `key`.
    pub fn row_of(&self, key: &Value) -> Option<RowIndex> {
        self.key_to_row.get(key).copied()
    }

    /// Reads a field of the row holding `key`.
    pub fn value(&self, key: &Value, field: &str) -> Option<Value> {
        let row = self.row_of(key)?;
        self.schema.field(field).map(|f| f.value_at(row))
    }

    fn check_value(&self, field: &str, value: &Value) -> Result<usize> {
        let schema_field = self
            .schema
            .field(field)
            .ok_or_else(|| Error::field_not_found(field, "table row", self.name.as_str()))?;
        if let Some(got) = value.data_type() {
            if got != schema_field.data_type() {
                return Err(Error::type_mismatch(field, schema_field.data_type(), got));
            }
        }
        Ok(schema_field.field_id())
    }

    fn check_values(&self, values: &[(&str, Value)]) -> Result<Vec<usize>> {
        values
            .iter()
            .map(|(name, value)| self.check_value(name, value))
            .collect()
    }

    /// Adds a row. Fields not in `values` hold their default value.
    pub fn add_row(&mut self, key: Value, values: &[(&str, Value)]) -> Result<RowIndex> {
        if self.key_to_row.contains_key(&key) {
            return Err(Error::duplicate_key(self.name.as_str(), key));
        }
        let key_field = String::from(self.schema.fields()[0].name());
        self.check_value(&key_field, &key)?;
        let ids = self.check_values(values)?;
        if ids.contains(&0) {
            return Err(Error::invalid_setup(format!(
                "table '{}': the key is given separately from the row values",
                self.name
            )));
        }

        let row = match self.free_rows.pop() {
            Some(row) => row,
            None => {
                self.next_row += 1;
                self.next_row - 1
            }
        };
        for column in &self.columns {
            column.reset_row(row);
        }
        self.columns[0].set_value_at(row, key.clone());
        for (id, (_, value)) in ids.iter().zip(values) {
            self.columns[*id].set_value_at(row, value.clone());
        }
        self.key_to_row.insert(key, row);
        self.active.borrow_mut().set(row);
        self.changes.add_row(row);
        Ok(row)
    }

    /// Overwrites fields of the row holding `key`.
    pub fn change_row(&mut self, key: &Value, values: &[(&str, Value)]) -> Result<RowIndex> {
        let row = self
            .row_of(key)
            .ok_or_else(|| Error::key_not_found(self.name.as_str(), key.clone()))?;
        let ids = self.check_values(values)?;
        if ids.contains(&0) {
            return Err(Error::invalid_setup(format!(
                "table '{}': keys cannot be changed; remove and add the row instead",
                self.name
            )));
        }
        for (id, (_, value)) in ids.iter().zip(values) {
            self.columns[*id].set_value_at(row, value.clone());
            self.changes.change_field(*id);
        }
        self.changes.change_row(row);
        Ok(row)
    }

    /// Removes the row holding `key`.
    pub fn remove_row(&mut self, key: &Value) -> Result<RowIndex> {
        let row = self
            .key_to_row
            .remove(key)
            .ok_or_else(|| Error::key_not_found(self.name.as_str(), key.clone()))?;
        self.active.borrow_mut().unset(row);
        self.changes.remove_row(row);
        self.pending_free.push(row);
        Ok(row)
    }

    /// Publishes every buffered mutation as one batch.
    pub fn fire_changes(&mut self) {
        trace!(table = %self.name, rows = self.len(), "firing table changes");
        self.changes.fire(&self.output, |_| {});
        self.free_rows.append(&mut self.pending_free);
    }
}

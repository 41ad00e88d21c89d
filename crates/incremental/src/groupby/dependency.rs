//! Which outputs depend on which inbound fields.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use weft_core::{BitSet, Error, FieldBitSet, FieldRef, FieldResolver, Result, Schema};

/// Associates inbound fields with the aggregation functions that read them and with
/// the outbound fields forwarded from them.
///
/// Functions are identified by their registration index. Rebuilt on every bind.
#[derive(Debug, Default)]
pub struct DependencyMap {
    inbound_triggers: Vec<Vec<usize>>,
    inbound_references: Vec<FieldBitSet>,
    group_field_id: Option<usize>,
    count_field_id: Option<usize>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every association.
    pub fn reset(&mut self) {
        self.inbound_triggers.clear();
        self.inbound_references.clear();
        self.group_field_id = None;
        self.count_field_id = None;
    }

    /// Records that `function` reads `inbound_field_id`.
    pub fn register_function_dependency(&mut self, inbound_field_id: usize, function: usize) {
        if inbound_field_id >= self.inbound_triggers.len() {
            self.inbound_triggers.resize_with(inbound_field_id + 1, Vec::new);
        }
        let triggers = &mut self.inbound_triggers[inbound_field_id];
        if !triggers.contains(&function) {
            triggers.push(function);
        }
    }

    /// Records that `outbound_field_id` is forwarded from `inbound_field_id`.
    pub fn map_inbound_field_id_to_outbound_field_id(
        &mut self,
        inbound_field_id: usize,
        outbound_field_id: usize,
    ) {
        if inbound_field_id >= self.inbound_references.len() {
            self.inbound_references
                .resize_with(inbound_field_id + 1, FieldBitSet::new);
        }
        self.inbound_references[inbound_field_id].set(outbound_field_id);
    }

    pub fn set_group_field_id(&mut self, field_id: Option<usize>) {
        self.group_field_id = field_id;
    }

    pub fn group_field_id(&self) -> Option<usize> {
        self.group_field_id
    }

    pub fn set_count_field_id(&mut self, field_id: Option<usize>) {
        self.count_field_id = field_id;
    }

    pub fn count_field_id(&self) -> Option<usize> {
        self.count_field_id
    }

    /// Returns the functions reading `inbound_field_id`, in registration order.
    pub fn functions_reading(&self, inbound_field_id: usize) -> &[usize] {
        self.inbound_triggers
            .get(inbound_field_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Translates an inbound change set.
    ///
    /// Sets the forwarded outbound fields of every changed inbound field in
    /// `outbound_changes` and returns the indexes of the functions that read any
    /// changed field, ascending and without duplicates.
    pub fn translate_inbound_change_fields(
        &self,
        changed: &FieldBitSet,
        outbound_changes: &mut FieldBitSet,
    ) -> Vec<usize> {
        let mut functions = BitSet::new();
        for inbound in changed.iter_ones() {
            if let Some(references) = self.inbound_references.get(inbound) {
                outbound_changes.union_with(references);
            }
            for function in self.functions_reading(inbound) {
                functions.set(*function);
            }
        }
        functions.iter_ones().collect()
    }

    /// Sets the count field in `outbound_changes`, if there is one.
    pub fn mark_count_changed(&self, outbound_changes: &mut FieldBitSet) {
        if let Some(id) = self.count_field_id {
            outbound_changes.set(id);
        }
    }

    /// Returns a resolver that records the fields `function` reads.
    pub fn resolver<'a>(
        &'a mut self,
        schema: &'a Schema,
        function: usize,
        context: impl Into<String>,
    ) -> DependencyResolver<'a> {
        DependencyResolver {
            map: self,
            schema,
            function,
            context: context.into(),
        }
    }
}

/// Resolves inbound fields for one aggregation function, recording each as a trigger.
pub struct DependencyResolver<'a> {
    map: &'a mut DependencyMap,
    schema: &'a Schema,
    function: usize,
    context: String,
}

impl FieldResolver for DependencyResolver<'_> {
    fn find_field(&mut self, name: &str) -> Option<FieldRef> {
        let field = self.schema.field(name)?;
        self.map
            .register_function_dependency(field.field_id(), self.function);
        Some(field.field().clone())
    }

    fn get_field(&mut self, name: &str) -> Result<FieldRef> {
        self.find_field(name).ok_or_else(|| {
            Error::field_not_found(name, self.context.clone(), self.schema.name())
        })
    }
}

/// The inbound fields the group function depends on.
#[derive(Debug, Default, Clone)]
pub struct GroupFunctionBinding {
    field_names: Vec<String>,
    references: FieldBitSet,
}

impl GroupFunctionBinding {
    /// Creates a binding from the field ids the group function resolved in `schema`.
    pub fn new(references: FieldBitSet, schema: &Schema) -> Self {
        let field_names = references
            .iter_ones()
            .filter_map(|id| schema.field_at(id).map(|f| String::from(f.name())))
            .collect();
        Self {
            field_names,
            references,
        }
    }

    /// Returns the names of the referenced fields, in field id order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Returns true if any referenced field is in `changed`.
    pub fn is_changed(&self, changed: &FieldBitSet) -> bool {
        self.references.intersects(changed)
    }

    pub fn reset(&mut self) {
        self.field_names.clear();
        self.references.clear();
    }
}

pub(crate) fn function_context(operator: &str, function: usize) -> String {
    format!("aggregate function {} of GroupBy '{}'", function, operator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use weft_core::{ArrayField, DataType, SchemaBuilder};

    fn schema() -> Schema {
        let mut builder = SchemaBuilder::new("in");
        for name in ["Id", "Value1", "Value2", "Value3"] {
            builder = builder
                .add_field(name, Rc::new(ArrayField::new(DataType::Int32)))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_translate_returns_triggered_functions_in_order() {
        let mut map = DependencyMap::new();
        map.register_function_dependency(2, 1);
        map.register_function_dependency(2, 0);
        map.register_function_dependency(3, 1);
        map.register_function_dependency(3, 1);
        map.map_inbound_field_id_to_outbound_field_id(1, 0);

        let mut out = FieldBitSet::new();
        let functions = map.translate_inbound_change_fields(&FieldBitSet::from_bits([3, 2]), &mut out);
        assert_eq!(functions, vec![0, 1]);
        assert!(out.is_empty());
        assert_eq!(map.functions_reading(3), &[1]);

        let functions = map.translate_inbound_change_fields(&FieldBitSet::from_bits([1]), &mut out);
        assert!(functions.is_empty());
        assert_eq!(out, FieldBitSet::from_bits([0]));
    }

    #[test]
    fn test_count_field() {
        let mut map = DependencyMap::new();
        let mut out = FieldBitSet::new();
        map.mark_count_changed(&mut out);
        assert!(out.is_empty());
        map.set_count_field_id(Some(2));
        map.mark_count_changed(&mut out);
        assert_eq!(out, FieldBitSet::from_bits([2]));
        map.reset();
        assert_eq!(map.count_field_id(), None);
    }

    #[test]
    fn test_resolver_registers_dependencies() {
        let schema = schema();
        let mut map = DependencyMap::new();
        {
            let mut resolver = map.resolver(&schema, 0, "sum");
            assert!(resolver.get_field("Value2").is_ok());
            let err = resolver.get_field("Missing").err().unwrap();
            assert_eq!(err, Error::field_not_found("Missing", "sum", "in"));
        }
        assert_eq!(map.functions_reading(2), &[0]);
    }

    #[test]
    fn test_group_function_binding() {
        let schema = schema();
        let binding = GroupFunctionBinding::new(FieldBitSet::from_bits([1]), &schema);
        assert_eq!(binding.field_names(), &[String::from("Value1")]);
        assert!(binding.is_changed(&FieldBitSet::from_bits([1, 3])));
        assert!(!binding.is_changed(&FieldBitSet::from_bits([2])));
    }
}

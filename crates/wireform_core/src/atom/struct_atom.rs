//! The ordered-field aggregate atom: a fixed schema of named sub-atoms exchanged as `Value::Map`.

use std::collections::BTreeMap;

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::layer::LayerId;
use crate::state::State;
use crate::value::Value;

use super::combinator::CondSpec;
use super::{Atom, AtomProtocol, TypeTag};

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub atom: Atom,
    /// When set and false, the field is skipped entirely: no bytes read/written, value resolves
    /// to `Value::None`. Mirrors `ConditionAtom`, exposed directly on the field so a struct-model
    /// binding doesn't have to wrap every optional field in one by hand.
    pub condition: Option<CondSpec>,
}

impl Field {
    pub fn new(name: impl Into<String>, atom: Atom) -> Self {
        Self { name: name.into(), atom, condition: None }
    }

    pub fn with_condition(mut self, condition: CondSpec) -> Self {
        self.condition = Some(condition);
        self
    }

    fn enabled(&self, state: &State, layer: LayerId) -> Result<bool> {
        match &self.condition {
            Some(cond) => cond.evaluate(state, layer),
            None => Ok(true),
        }
    }
}

/// An ordered sequence of named fields. Each field's atom is processed in declaration order, with
/// earlier fields visible to later fields' expressions through the struct's own layer `obj`
/// (see [`crate::state::State::resolve_path`]).
///
/// `union` turns declaration order into overlay order instead of sequential order: every field
/// starts reading/writing from the struct's own start position, and the struct as a whole
/// advances by the widest field, C-union style.
#[derive(Debug, Clone)]
pub struct StructAtom {
    pub fields: Vec<Field>,
    pub union: bool,
}

impl StructAtom {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, union: false }
    }

    pub fn new_union(fields: Vec<Field>) -> Self {
        Self { fields, union: true }
    }
}

impl AtomProtocol for StructAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let map = value.as_map().ok_or_else(|| Error::TypeMismatch {
            path: state.path_of(layer).to_owned(),
            expected: "map",
            value: value.to_string(),
        })?;

        // The full object is already available up front when packing, unlike unpacking where it
        // has to be assembled field by field.
        state.layer_mut(layer).obj = Some(value.clone());

        let start = state.tell(layer)?;
        let mut widest_end = start;

        for field in &self.fields {
            if self.union {
                state.seek_to(layer, start as i64, crate::stream::Whence::Start)?;
            }
            if !field.enabled(state, layer)? {
                continue;
            }
            let field_value = map.get(&field.name).cloned().unwrap_or(Value::None);
            let child = state.push_child(layer, &field.name);
            state.set_field(child, field.name.clone());
            let result = field.atom.pack(&field_value, state, child);
            state.pop_child(child);
            result?;
            if self.union {
                widest_end = widest_end.max(state.tell(layer)?);
            }
        }

        if self.union {
            state.seek_to(layer, widest_end as i64, crate::stream::Whence::Start)?;
        }

        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let mut fields: BTreeMap<String, Value> = BTreeMap::new();
        let start = state.tell(layer)?;
        let mut widest_end = start;

        for field in &self.fields {
            if self.union {
                state.seek_to(layer, start as i64, crate::stream::Whence::Start)?;
            }
            state.layer_mut(layer).obj = Some(Value::Map(fields.clone()));
            if !field.enabled(state, layer)? {
                fields.insert(field.name.clone(), Value::None);
                continue;
            }
            let child = state.push_child(layer, &field.name);
            state.set_field(child, field.name.clone());
            let result = field.atom.unpack(state, child);
            state.pop_child(child);
            fields.insert(field.name.clone(), result?);
            if self.union {
                widest_end = widest_end.max(state.tell(layer)?);
            }
        }

        if self.union {
            state.seek_to(layer, widest_end as i64, crate::stream::Whence::Start)?;
        }

        state.layer_mut(layer).obj = Some(Value::Map(fields.clone()));
        Ok(Value::Map(fields))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        if self.union {
            let mut widest = 0u64;
            for field in &self.fields {
                widest = widest.max(field.atom.size(state, layer)?);
            }
            return Ok(widest);
        }
        let mut total = 0u64;
        for field in &self.fields {
            total += field.atom.size(state, layer)?;
        }
        Ok(total)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Map
    }

    fn set_byteorder(&mut self, order: Endian) {
        for field in &mut self.fields {
            field.atom.set_byteorder(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::primitive::IntAtom;
    use crate::context::Context;
    use crate::stream::memory_stream;

    fn sample_struct() -> StructAtom {
        StructAtom::new(vec![
            Field::new("kind", Atom::Int(IntAtom::new(8, false, true))),
            Field::new("value", Atom::Int(IntAtom::new(16, true, true))),
        ])
    }

    #[test]
    fn struct_round_trips_two_fields() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let atom = sample_struct();

        let mut fields = BTreeMap::new();
        fields.insert("kind".to_owned(), Value::Int(3));
        fields.insert("value".to_owned(), Value::Int(-7));
        let object = Value::Map(fields);

        atom.pack(&object, &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), object);
    }

    #[test]
    fn struct_exposes_earlier_fields_to_later_field_expressions() {
        use crate::expr::Expr;
        use crate::length::LengthSpec;

        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();

        let atom = StructAtom::new(vec![
            Field::new("count", Atom::Int(IntAtom::new(8, false, true))),
            Field::new(
                "items",
                Atom::Repeated(Box::new(crate::atom::RepeatedAtom::new(
                    Atom::Int(IntAtom::new(8, false, true)),
                    LengthSpec::Callable(Expr::path("count")),
                ))),
            ),
        ]);

        let mut fields = BTreeMap::new();
        fields.insert("count".to_owned(), Value::Int(2));
        fields.insert(
            "items".to_owned(),
            Value::Seq(vec![Value::Int(10), Value::Int(20)]),
        );
        let object = Value::Map(fields);

        atom.pack(&object, &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), object);
    }

    #[test]
    fn struct_size_sums_fixed_fields() {
        let state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        assert_eq!(sample_struct().size(&state, layer).unwrap(), 3);
    }

    #[test]
    fn disabled_field_is_skipped_and_resolves_to_none() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();

        let atom = StructAtom::new(vec![
            Field::new("kind", Atom::Int(IntAtom::new(8, false, true))),
            Field::new("extra", Atom::Int(IntAtom::new(8, false, true)))
                .with_condition(CondSpec::Literal(false)),
        ]);

        let mut fields = BTreeMap::new();
        fields.insert("kind".to_owned(), Value::Int(9));
        fields.insert("extra".to_owned(), Value::Int(99));
        let object = Value::Map(fields);

        atom.pack(&object, &mut state, layer).unwrap();
        assert_eq!(state.tell(layer).unwrap(), 1);

        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        let unpacked = atom.unpack(&mut state, layer).unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("kind".to_owned(), Value::Int(9));
        expected.insert("extra".to_owned(), Value::None);
        assert_eq!(unpacked, Value::Map(expected));
    }

    #[test]
    fn union_fields_overlay_and_struct_advances_by_the_widest() {
        let atom = StructAtom::new_union(vec![
            Field::new("as_byte", Atom::Int(IntAtom::new(8, false, true))),
            Field::new("as_word", Atom::Int(IntAtom::new(16, false, true))),
        ]);

        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();

        let mut fields = BTreeMap::new();
        fields.insert("as_byte".to_owned(), Value::Int(1));
        fields.insert("as_word".to_owned(), Value::Int(0x0201));
        let object = Value::Map(fields);

        atom.pack(&object, &mut state, layer).unwrap();
        assert_eq!(state.tell(layer).unwrap(), 2);

        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(state.read_exact(layer, 2).unwrap(), vec![0x01, 0x02]);

        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), object);
        assert_eq!(atom.size(&state, layer).unwrap(), 2);
    }
}

//! Top-level `pack`/`unpack`/`sizeof` calls: the functions a schema author actually calls.

use crate::atom::{Atom, AtomProtocol};
use crate::context::Context;
use crate::error::Result;
use crate::state::State;
use crate::stream::Stream;
use crate::value::Value;

/// Packs `value` against `schema`, writing to `stream`. `globals` seeds the top-level context
/// expressions can reference.
pub fn pack(schema: &Atom, value: &Value, stream: Box<dyn Stream>, globals: Context) -> Result<State> {
    let mut state = State::new(stream, globals);
    let root = state.root();
    let result = schema.pack(value, &mut state, root);
    if let Err(e) = &result {
        log::debug!("pack failed at {}: {e}", e.path());
    }
    result?;
    Ok(state)
}

/// Unpacks a value against `schema`, reading from `stream`.
pub fn unpack(schema: &Atom, stream: Box<dyn Stream>, globals: Context) -> Result<Value> {
    let mut state = State::new(stream, globals);
    let root = state.root();
    let result = schema.unpack(&mut state, root);
    if let Err(e) = &result {
        log::debug!("unpack failed at {}: {e}", e.path());
    }
    result
}

/// Computes `schema`'s byte size without touching any stream. Fails with `Error::DynamicSize` if
/// the schema contains anything whose size depends on runtime data.
pub fn sizeof(schema: &Atom, globals: Context) -> Result<u64> {
    let state = State::sizeof_only(globals);
    let root = state.root();
    schema.size(&state, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::primitive::IntAtom;
    use crate::atom::struct_atom::{Field, StructAtom};
    use crate::stream::{memory_stream, ReadOnlyStream};
    use std::collections::BTreeMap;
    use std::io::Cursor;

    #[test]
    fn pack_then_unpack_round_trips_a_struct() {
        let schema = Atom::Struct(Box::new(StructAtom::new(vec![
            Field::new("id", Atom::Int(IntAtom::new(32, false, true))),
            Field::new("flag", Atom::Bool(crate::atom::primitive::BoolAtom)),
        ])));

        let mut fields = BTreeMap::new();
        fields.insert("id".to_owned(), Value::Int(7));
        fields.insert("flag".to_owned(), Value::Bool(true));
        let value = Value::Map(fields);

        let state = pack(&schema, &value, Box::new(memory_stream()), Context::new()).unwrap();
        let mut bytes = Vec::new();
        let mut state = state;
        let root = state.root();
        state.seek_to(root, 0, crate::stream::Whence::Start).unwrap();
        bytes.extend(state.read_all(root).unwrap());

        let unpacked = unpack(
            &schema,
            Box::new(ReadOnlyStream(Cursor::new(bytes))),
            Context::new(),
        )
        .unwrap();
        assert_eq!(unpacked, value);
    }

    #[test]
    fn sizeof_reports_fixed_schema_size() {
        let schema = Atom::Struct(Box::new(StructAtom::new(vec![
            Field::new("a", Atom::Int(IntAtom::new(8, false, true))),
            Field::new("b", Atom::Int(IntAtom::new(32, false, true))),
        ])));
        assert_eq!(sizeof(&schema, Context::new()).unwrap(), 5);
    }

    #[test]
    fn sizeof_on_dynamic_schema_errors() {
        let schema = Atom::CString(crate::atom::string::CStringAtom::new(
            crate::atom::string::Encoding::Ascii,
        ));
        assert!(sizeof(&schema, Context::new()).is_err());
    }
}

//! Normalizes the length inputs accepted by `repeated`/string atoms into `(greedy, n)`.

use crate::atom::{Atom, AtomProtocol};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::layer::LayerId;
use crate::state::State;
use crate::value::Value;

/// One of the four length shapes a `repeated`/string atom can declare. `Prefix` covers both "an
/// atom" and "a slice" forms - they're the same read-then-use-as-count mechanism.
#[derive(Debug, Clone)]
pub enum LengthSpec {
    Fixed(i64),
    Greedy,
    Prefix(Box<Atom>),
    Callable(Expr),
}

impl LengthSpec {
    pub fn fixed(n: i64) -> Self {
        LengthSpec::Fixed(n)
    }

    pub fn prefix(atom: Atom) -> Self {
        LengthSpec::Prefix(Box::new(atom))
    }

    pub fn set_byteorder(&mut self, order: crate::endian::Endian) {
        if let LengthSpec::Prefix(atom) = self {
            atom.set_byteorder(order);
        }
    }
}

/// The result of `_eval_length`: whether to read greedily, and how many elements/bytes if not.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatedLength {
    pub greedy: bool,
    pub n: i64,
}

impl EvaluatedLength {
    pub fn fixed(n: i64) -> Self {
        Self { greedy: false, n }
    }

    pub fn greedy() -> Self {
        Self { greedy: true, n: 0 }
    }
}

/// Evaluates a length for unpack: a prefix atom is read from the stream to produce `n`.
pub fn eval_length_unpack(spec: &LengthSpec, state: &mut State, layer: LayerId) -> Result<EvaluatedLength> {
    match spec {
        LengthSpec::Fixed(n) => Ok(EvaluatedLength::fixed(*n)),
        LengthSpec::Greedy => Ok(EvaluatedLength::greedy()),
        LengthSpec::Prefix(atom) => {
            let value = atom.unpack(state, layer)?;
            let n = value.as_int().ok_or_else(|| Error::TypeMismatch {
                path: state.path_of(layer).to_owned(),
                expected: "int",
                value: value.to_string(),
            })?;
            Ok(EvaluatedLength::fixed(n as i64))
        }
        LengthSpec::Callable(expr) => {
            let resolved = expr.evaluate(state, layer)?;
            eval_length_unpack(&resolved_to_spec(resolved, state, layer)?, state, layer)
        }
    }
}

/// Evaluates a length for pack, given the number of elements/bytes actually present in the value
/// being packed. A prefix atom gets that count written to the stream right here, in the same
/// position a reader would later read it from.
pub fn eval_length_pack(
    spec: &LengthSpec,
    value_len: i64,
    state: &mut State,
    layer: LayerId,
) -> Result<EvaluatedLength> {
    match spec {
        LengthSpec::Fixed(n) => {
            if *n != value_len {
                return Err(Error::LengthMismatch {
                    path: state.path_of(layer).to_owned(),
                    expected: *n,
                    actual: value_len,
                });
            }
            Ok(EvaluatedLength::fixed(*n))
        }
        LengthSpec::Greedy => Ok(EvaluatedLength::fixed(value_len)),
        LengthSpec::Prefix(atom) => {
            atom.pack(&Value::Int(value_len as i128), state, layer)?;
            Ok(EvaluatedLength::fixed(value_len))
        }
        LengthSpec::Callable(expr) => {
            let resolved = expr.evaluate(state, layer)?;
            eval_length_pack(&resolved_to_spec(resolved, state, layer)?, value_len, state, layer)
        }
    }
}

/// A callable length may itself resolve to any of the other three shapes; `None`/ellipsis-ish
/// values resolve to greedy, integers to fixed, anything else is a type error.
fn resolved_to_spec(value: Value, state: &State, layer: LayerId) -> Result<LengthSpec> {
    match value {
        Value::None => Ok(LengthSpec::Greedy),
        Value::Int(n) => Ok(LengthSpec::Fixed(n as i64)),
        other => Err(Error::TypeMismatch {
            path: state.path_of(layer).to_owned(),
            expected: "int or none (greedy)",
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::primitive::IntAtom;
    use crate::context::Context;
    use crate::stream::memory_stream;

    #[test]
    fn fixed_length_unpack_is_a_no_op_read() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let result = eval_length_unpack(&LengthSpec::Fixed(3), &mut state, layer).unwrap();
        assert_eq!(result.n, 3);
        assert!(!result.greedy);
    }

    #[test]
    fn prefix_length_round_trips_through_a_byte() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let spec = LengthSpec::prefix(Atom::Int(IntAtom::new(8, false, true)));

        eval_length_pack(&spec, 3, &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        let result = eval_length_unpack(&spec, &mut state, layer).unwrap();
        assert_eq!(result.n, 3);
    }
}

//! Text atoms: a NUL-terminated C string and a length-prefixed Pascal string.

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::layer::LayerId;
use crate::length::LengthSpec;
use crate::state::State;
use crate::value::Value;

use super::{AtomProtocol, TypeTag};

/// Which byte encoding a string atom validates against on pack and decodes with on unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Ascii,
    Utf8,
}

fn encode(encoding: Encoding, s: &str, state: &State, layer: LayerId) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Utf8 => Ok(s.as_bytes().to_vec()),
        Encoding::Ascii => {
            if !s.is_ascii() {
                return Err(Error::InvalidValue {
                    path: state.path_of(layer).to_owned(),
                    message: format!("{s:?} is not ASCII"),
                });
            }
            Ok(s.as_bytes().to_vec())
        }
    }
}

fn decode(encoding: Encoding, bytes: Vec<u8>, state: &State, layer: LayerId) -> Result<String> {
    match encoding {
        Encoding::Ascii if !bytes.is_ascii() => Err(Error::InvalidValue {
            path: state.path_of(layer).to_owned(),
            message: "non-ASCII byte in an ascii string atom".to_owned(),
        }),
        _ => String::from_utf8(bytes).map_err(|e| Error::InvalidValue {
            path: state.path_of(layer).to_owned(),
            message: format!("invalid utf-8: {e}"),
        }),
    }
}

/// Resolves a `Fixed`/`Callable` length to a declared byte count for [`CStringAtom`], without the
/// exact-match check `eval_length_pack` applies elsewhere - a cstring is allowed to pack shorter
/// than its declared width and have the rest filled with `sep`.
fn declared_length(length: &LengthSpec, state: &State, layer: LayerId) -> Result<i64> {
    match length {
        LengthSpec::Fixed(n) => Ok(*n),
        LengthSpec::Callable(expr) => {
            let value = expr.evaluate(state, layer)?;
            value.as_int().map(|n| n as i64).ok_or_else(|| Error::TypeMismatch {
                path: state.path_of(layer).to_owned(),
                expected: "int",
                value: value.to_string(),
            })
        }
        LengthSpec::Greedy | LengthSpec::Prefix(_) => {
            unreachable!("only called for the Fixed/Callable declared-width modes")
        }
    }
}

/// A string terminated by a `sep` byte (`0x00` by default). `length` governs how the terminator
/// is placed: `Greedy` and `Prefix` both write a single trailing `sep`; `Fixed`/`Callable` instead
/// pad out to the declared width with `sep` bytes, C-string-in-a-fixed-buffer style. `keep`
/// controls whether the trailing terminator/padding survives into the unpacked string.
#[derive(Debug, Clone)]
pub struct CStringAtom {
    pub length: LengthSpec,
    pub encoding: Encoding,
    pub sep: u8,
    pub keep: bool,
}

impl CStringAtom {
    pub fn new(encoding: Encoding) -> Self {
        Self { length: LengthSpec::Greedy, encoding, sep: 0, keep: false }
    }

    pub fn with_length(mut self, length: LengthSpec) -> Self {
        self.length = length;
        self
    }

    pub fn with_sep(mut self, sep: u8) -> Self {
        self.sep = sep;
        self
    }

    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }
}

impl AtomProtocol for CStringAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let s = value
            .as_str()
            .ok_or_else(|| Error::TypeMismatch {
                path: state.path_of(layer).to_owned(),
                expected: "str",
                value: value.to_string(),
            })?;
        let bytes = encode(self.encoding, s, state, layer)?;

        if let LengthSpec::Prefix(atom) = &self.length {
            atom.pack(&Value::Int(bytes.len() as i128 + 1), state, layer)?;
        }

        state.write_bytes(layer, &bytes)?;

        match &self.length {
            LengthSpec::Greedy | LengthSpec::Prefix(_) => {
                state.write_bytes(layer, &[self.sep])?;
            }
            LengthSpec::Fixed(_) | LengthSpec::Callable(_) => {
                let declared = declared_length(&self.length, state, layer)?;
                let pad = declared - bytes.len() as i64;
                if pad < 0 {
                    return Err(Error::LengthMismatch {
                        path: state.path_of(layer).to_owned(),
                        expected: declared,
                        actual: bytes.len() as i64,
                    });
                }
                state.write_bytes(layer, &vec![self.sep; pad as usize])?;
            }
        }
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let raw = if matches!(self.length, LengthSpec::Greedy) {
            let mut bytes = Vec::new();
            loop {
                let byte = state.read_exact(layer, 1)?[0];
                if byte == self.sep {
                    break;
                }
                bytes.push(byte);
            }
            bytes
        } else {
            let evaluated = crate::length::eval_length_unpack(&self.length, state, layer)?;
            state.read_exact(layer, evaluated.n as usize)?
        };

        let mut string = decode(self.encoding, raw, state, layer)?;
        if !self.keep {
            while string.ends_with(self.sep as char) {
                string.pop();
            }
        }
        Ok(Value::Str(string))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        match self.length {
            LengthSpec::Fixed(n) => Ok(n as u64),
            _ => Err(Error::DynamicSize { path: state.path_of(layer).to_owned() }),
        }
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Str
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.length.set_byteorder(order);
    }
}

/// A string preceded (or followed, if the length is a callable reading ahead) by an explicit
/// byte count, rather than a sentinel.
#[derive(Debug, Clone)]
pub struct PStringAtom {
    pub length: LengthSpec,
    pub encoding: Encoding,
}

impl PStringAtom {
    pub fn new(length: LengthSpec, encoding: Encoding) -> Self {
        Self { length, encoding }
    }
}

impl AtomProtocol for PStringAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let s = value
            .as_str()
            .ok_or_else(|| Error::TypeMismatch {
                path: state.path_of(layer).to_owned(),
                expected: "str",
                value: value.to_string(),
            })?;
        let bytes = encode(self.encoding, s, state, layer)?;
        crate::length::eval_length_pack(&self.length, bytes.len() as i64, state, layer)?;
        state.write_bytes(layer, &bytes)?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let evaluated = crate::length::eval_length_unpack(&self.length, state, layer)?;
        let bytes = if evaluated.greedy {
            state.read_all(layer)?
        } else {
            state.read_exact(layer, evaluated.n as usize)?
        };
        Ok(Value::Str(decode(self.encoding, bytes, state, layer)?))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        match self.length {
            LengthSpec::Fixed(n) => Ok(n as u64),
            _ => Err(Error::DynamicSize { path: state.path_of(layer).to_owned() }),
        }
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Str
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.length.set_byteorder(order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::primitive::IntAtom;
    use crate::atom::Atom;
    use crate::context::Context;
    use crate::stream::memory_stream;

    #[test]
    fn cstring_round_trips_through_terminator() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let atom = CStringAtom::new(Encoding::Ascii);
        atom.pack(&Value::Str("hi".to_owned()), &mut state, layer)
            .unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("hi".to_owned())
        );
        assert_eq!(state.tell(layer).unwrap(), 3);
    }

    #[test]
    fn cstring_rejects_non_ascii_when_encoding_is_ascii() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let atom = CStringAtom::new(Encoding::Ascii);
        assert!(atom
            .pack(&Value::Str("héllo".to_owned()), &mut state, layer)
            .is_err());
    }

    #[test]
    fn cstring_with_fixed_length_pads_with_sep_and_strips_on_unpack() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let atom = CStringAtom::new(Encoding::Ascii).with_length(LengthSpec::fixed(8));
        atom.pack(&Value::Str("hi".to_owned()), &mut state, layer)
            .unwrap();
        assert_eq!(state.tell(layer).unwrap(), 8);

        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("hi".to_owned())
        );
    }

    #[test]
    fn cstring_with_keep_retains_trailing_padding() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let atom = CStringAtom::new(Encoding::Ascii)
            .with_length(LengthSpec::fixed(5))
            .with_keep(true);
        atom.pack(&Value::Str("hi".to_owned()), &mut state, layer)
            .unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("hi\0\0\0".to_owned())
        );
    }

    #[test]
    fn cstring_with_prefix_length_round_trips() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let length = LengthSpec::prefix(Atom::Int(IntAtom::new(8, false, true)));
        let atom = CStringAtom::new(Encoding::Ascii).with_length(length);
        atom.pack(&Value::Str("hi".to_owned()), &mut state, layer)
            .unwrap();
        // prefix includes the terminator: len("hi") + 1
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(state.read_exact(layer, 1).unwrap(), vec![3]);

        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("hi".to_owned())
        );
    }

    #[test]
    fn cstring_rejects_a_value_longer_than_its_fixed_width() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let atom = CStringAtom::new(Encoding::Ascii).with_length(LengthSpec::fixed(2));
        assert!(atom
            .pack(&Value::Str("too long".to_owned()), &mut state, layer)
            .is_err());
    }

    #[test]
    fn pstring_with_prefix_length_round_trips() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let layer = state.root();
        let length = LengthSpec::prefix(Atom::Int(IntAtom::new(8, false, true)));
        let atom = PStringAtom::new(length, Encoding::Utf8);
        atom.pack(&Value::Str("héllo".to_owned()), &mut state, layer)
            .unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("héllo".to_owned())
        );
    }
}

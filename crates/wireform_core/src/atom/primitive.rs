//! Fixed-shape scalar atoms: bools, chars, sized integers, floats, raw byte runs, padding and
//! the LEB128-style variable-length integer.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::layer::LayerId;
use crate::length::LengthSpec;
use crate::state::State;
use crate::value::Value;

use super::{AtomProtocol, TypeTag};

fn type_mismatch(state: &State, layer: LayerId, expected: &'static str, value: &Value) -> Error {
    Error::TypeMismatch {
        path: state.path_of(layer).to_owned(),
        expected,
        value: value.to_string(),
    }
}

/// A single byte, 0 meaning false and anything else meaning true. Packing always writes exactly
/// `0x00`/`0x01`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolAtom;

impl AtomProtocol for BoolAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let b = match value {
            Value::Bool(b) => *b,
            other => return Err(type_mismatch(state, layer, "bool", other)),
        };
        state.write_bytes(layer, &[b as u8])?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let byte = state.read_exact(layer, 1)?[0];
        Ok(Value::Bool(byte != 0))
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(1)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Bool
    }
}

/// A single byte interpreted as an ASCII/latin-1 code point, exchanged as `Value::Str` holding
/// exactly one `char`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharAtom;

impl AtomProtocol for CharAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let s = match value {
            Value::Str(s) => s,
            other => return Err(type_mismatch(state, layer, "single-char str", other)),
        };
        let mut chars = s.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(Error::InvalidValue {
                path: state.path_of(layer).to_owned(),
                message: format!("expected exactly one character, got {s:?}"),
            });
        };
        if !c.is_ascii() {
            return Err(Error::InvalidValue {
                path: state.path_of(layer).to_owned(),
                message: format!("{c:?} is not ASCII"),
            });
        }
        state.write_bytes(layer, &[c as u8])?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let byte = state.read_exact(layer, 1)?[0];
        Ok(Value::Str((byte as char).to_string()))
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(1)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Str
    }
}

/// A fixed-width integer, 1 to 16 bytes, signed or unsigned, in a chosen byte order.
#[derive(Debug, Clone, Copy)]
pub struct IntAtom {
    pub bits: u32,
    pub signed: bool,
    pub order: Endian,
}

impl IntAtom {
    pub fn new(bits: u32, signed: bool, little_endian: bool) -> Self {
        Self {
            bits,
            signed,
            order: if little_endian { Endian::Little } else { Endian::Big },
        }
    }

    pub fn bytes(self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    /// `byteorder`'s `write_iN` helpers want a fixed width; go through a 16-byte scratch buffer
    /// and slice out the bytes actually needed, since `bits` is only known at runtime.
    fn write_into(self, n: i128, buf: &mut [u8]) {
        let mut scratch = [0u8; 16];
        if self.order.is_little_endian() {
            LittleEndian::write_i128(&mut scratch, n);
        } else {
            BigEndian::write_i128(&mut scratch, n);
        }
        let width = self.bytes();
        if self.order.is_little_endian() {
            buf.copy_from_slice(&scratch[..width]);
        } else {
            buf.copy_from_slice(&scratch[16 - width..]);
        }
    }

    fn read_from(self, buf: &[u8]) -> i128 {
        let width = self.bytes();
        let negative = self.signed
            && if self.order.is_little_endian() {
                buf[width - 1] & 0x80 != 0
            } else {
                buf[0] & 0x80 != 0
            };
        let mut scratch = [if negative { 0xFF } else { 0x00 }; 16];
        if self.order.is_little_endian() {
            scratch[..width].copy_from_slice(buf);
        } else {
            scratch[16 - width..].copy_from_slice(buf);
        }
        if self.order.is_little_endian() {
            LittleEndian::read_i128(&scratch)
        } else {
            BigEndian::read_i128(&scratch)
        }
    }
}

impl AtomProtocol for IntAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let n = value
            .as_int()
            .ok_or_else(|| type_mismatch(state, layer, "int", value))?;
        let width = self.bytes();
        let mut buf = vec![0u8; width];
        self.write_into(n, &mut buf);
        state.write_bytes(layer, &buf)?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let width = self.bytes();
        let buf = state.read_exact(layer, width)?;
        Ok(Value::Int(self.read_from(&buf)))
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(self.bytes() as u64)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Int
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.order = order;
    }
}

/// IEEE-754 floats at 16, 32 or 64 bits. 16-bit is decoded/encoded by hand since `byteorder`
/// doesn't carry a half-precision type.
#[derive(Debug, Clone, Copy)]
pub struct FloatAtom {
    pub bits: u32,
    pub order: Endian,
}

impl FloatAtom {
    pub fn new(bits: u32) -> Self {
        Self { bits, order: Endian::Little }
    }

    fn bytes(self) -> usize {
        (self.bits / 8) as usize
    }
}

impl AtomProtocol for FloatAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let f = value
            .as_float()
            .ok_or_else(|| type_mismatch(state, layer, "float", value))?;
        let mut buf = vec![0u8; self.bytes()];
        let little = self.order.is_little_endian();
        match self.bits {
            16 => buf.copy_from_slice(&f32_to_f16(f as f32).to_le_bytes()),
            32 if little => LittleEndian::write_f32(&mut buf, f as f32),
            32 => BigEndian::write_f32(&mut buf, f as f32),
            64 if little => LittleEndian::write_f64(&mut buf, f),
            64 => BigEndian::write_f64(&mut buf, f),
            other => {
                return Err(Error::InvalidValue {
                    path: state.path_of(layer).to_owned(),
                    message: format!("unsupported float width {other}"),
                })
            }
        }
        if self.bits == 16 && !little {
            buf.reverse();
        }
        state.write_bytes(layer, &buf)?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let mut buf = state.read_exact(layer, self.bytes())?;
        let little = self.order.is_little_endian();
        let f = match self.bits {
            16 => {
                if !little {
                    buf.reverse();
                }
                f16_to_f32(u16::from_le_bytes([buf[0], buf[1]])) as f64
            }
            32 if little => LittleEndian::read_f32(&buf) as f64,
            32 => BigEndian::read_f32(&buf) as f64,
            64 if little => LittleEndian::read_f64(&buf),
            64 => BigEndian::read_f64(&buf),
            other => {
                return Err(Error::InvalidValue {
                    path: state.path_of(layer).to_owned(),
                    message: format!("unsupported float width {other}"),
                })
            }
        };
        Ok(Value::Float(f))
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(self.bytes() as u64)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Float
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.order = order;
    }
}

fn f32_to_f16(f: f32) -> u16 {
    let bits = f.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xFF) as i32 - 127 + 15;
    let mantissa = bits & 0x7F_FFFF;

    if exp <= 0 {
        sign
    } else if exp >= 0x1F {
        sign | 0x7C00
    } else {
        sign | ((exp as u16) << 10) | ((mantissa >> 13) as u16)
    }
}

fn f16_to_f32(half: u16) -> f32 {
    let sign = (half & 0x8000) as u32;
    let exp = ((half >> 10) & 0x1F) as u32;
    let mantissa = (half & 0x3FF) as u32;

    let bits = if exp == 0 {
        sign << 16
    } else if exp == 0x1F {
        (sign << 16) | 0x7F80_0000 | (mantissa << 13)
    } else {
        (sign << 16) | ((exp + 127 - 15) << 23) | (mantissa << 13)
    };
    f32::from_bits(bits)
}

/// A run of raw bytes, whose length is governed by a [`LengthSpec`] (fixed, greedy, prefixed or
/// callable).
#[derive(Debug, Clone)]
pub struct BytesAtom {
    pub length: LengthSpec,
}

impl BytesAtom {
    pub fn new(length: LengthSpec) -> Self {
        Self { length }
    }
}

impl AtomProtocol for BytesAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let bytes = value
            .as_bytes()
            .ok_or_else(|| type_mismatch(state, layer, "bytes", value))?;
        crate::length::eval_length_pack(&self.length, bytes.len() as i64, state, layer)?;
        state.write_bytes(layer, bytes)?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let evaluated = crate::length::eval_length_unpack(&self.length, state, layer)?;
        let bytes = if evaluated.greedy {
            state.read_all(layer)?
        } else {
            state.read_exact(layer, evaluated.n as usize)?
        };
        Ok(Value::Bytes(bytes))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        match self.length {
            LengthSpec::Fixed(n) => Ok(n as u64),
            _ => Err(Error::DynamicSize { path: state.path_of(layer).to_owned() }),
        }
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Bytes
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.length.set_byteorder(order);
    }
}

/// `n` bytes of filler. Packing writes `fill` repeated; unpacking discards the bytes and checks
/// them against `fill` when `strict` is set.
#[derive(Debug, Clone, Copy)]
pub struct PaddingAtom {
    pub n: usize,
    pub fill: u8,
    pub strict: bool,
}

impl PaddingAtom {
    pub fn new(n: usize) -> Self {
        Self { n, fill: 0, strict: false }
    }
}

impl AtomProtocol for PaddingAtom {
    fn pack(&self, _value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        state.write_bytes(layer, &vec![self.fill; self.n])?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let buf = state.read_exact(layer, self.n)?;
        if self.strict && buf.iter().any(|&b| b != self.fill) {
            return Err(Error::InvalidValue {
                path: state.path_of(layer).to_owned(),
                message: format!("padding byte mismatch, expected all {:#04x}", self.fill),
            });
        }
        Ok(Value::None)
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(self.n as u64)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::None
    }

    fn pack_many(
        &self,
        values: &[Value],
        state: &mut State,
        layer: LayerId,
        _length: &LengthSpec,
    ) -> Result<bool> {
        state.write_bytes(layer, &vec![self.fill; self.n * values.len()])?;
        Ok(true)
    }

    fn unpack_many(
        &self,
        state: &mut State,
        layer: LayerId,
        length: &LengthSpec,
    ) -> Result<Option<Value>> {
        let evaluated = crate::length::eval_length_unpack(length, state, layer)?;
        if evaluated.greedy {
            return Ok(None);
        }
        let total = self.n * evaluated.n as usize;
        let buf = state.read_exact(layer, total)?;
        if self.strict && buf.iter().any(|&b| b != self.fill) {
            return Err(Error::InvalidValue {
                path: state.path_of(layer).to_owned(),
                message: format!("padding byte mismatch, expected all {:#04x}", self.fill),
            });
        }
        Ok(Some(Value::Seq(vec![Value::None; evaluated.n as usize])))
    }
}

/// LEB128-style variable-length integer. The default layout puts the continuation flag in each
/// byte's high bit and the 7-bit magnitude group in the low bits, standard LEB128 style (300 packs
/// as `AC 02`). Setting `lsb` moves the continuation flag to each byte's low bit instead, with the
/// magnitude group shifted up into the remaining 7 bits. `order` only matters when a value needs
/// more than one group, deciding whether those groups themselves come out least-group-first or
/// most-group-first.
#[derive(Debug, Clone, Copy)]
pub struct VarIntAtom {
    pub signed: bool,
    pub lsb: bool,
    pub order: Endian,
}

impl VarIntAtom {
    pub fn new(signed: bool) -> Self {
        Self { signed, lsb: false, order: Endian::Little }
    }

    /// Splits `magnitude` into base-128 groups, least significant first.
    fn magnitude_groups(mut magnitude: u128) -> Vec<u8> {
        if magnitude == 0 {
            return vec![0];
        }
        let mut groups = Vec::new();
        while magnitude > 0 {
            groups.push((magnitude & 0x7F) as u8);
            magnitude >>= 7;
        }
        groups
    }

    fn encode(self, n: i128) -> Vec<u8> {
        let magnitude = if self.signed { n.unsigned_abs() } else { n as u128 };
        let sign_bit: u128 = if self.signed && n < 0 { 1 } else { 0 };
        // The sign occupies the lowest magnitude bit when signed, Zigzag-style, so groups are
        // built from a shifted magnitude.
        let encoded_magnitude = if self.signed {
            (magnitude << 1) | sign_bit
        } else {
            magnitude
        };

        let mut groups = Self::magnitude_groups(encoded_magnitude);
        if !self.order.is_little_endian() {
            groups.reverse();
        }

        let last = groups.len() - 1;
        groups
            .iter()
            .enumerate()
            .map(|(i, &g)| {
                let continues = i != last;
                if self.lsb {
                    (g << 1) | (continues as u8)
                } else {
                    g | ((continues as u8) << 7)
                }
            })
            .collect()
    }

    fn group_value(self, byte: u8) -> (u8, bool) {
        if self.lsb {
            (byte >> 1, byte & 1 != 0)
        } else {
            (byte & 0x7F, byte & 0x80 != 0)
        }
    }

    fn decode(self, bytes: &[u8]) -> i128 {
        let values: Vec<u8> = bytes.iter().map(|&b| self.group_value(b).0).collect();
        let ordered: Vec<u8> = if self.order.is_little_endian() {
            values
        } else {
            values.into_iter().rev().collect()
        };

        let mut magnitude: u128 = 0;
        for (i, &v) in ordered.iter().enumerate() {
            magnitude |= (v as u128) << (7 * i);
        }

        if self.signed {
            let sign_negative = magnitude & 1 != 0;
            let unsigned = magnitude >> 1;
            if sign_negative {
                -(unsigned as i128)
            } else {
                unsigned as i128
            }
        } else {
            magnitude as i128
        }
    }
}

impl AtomProtocol for VarIntAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let n = value
            .as_int()
            .ok_or_else(|| type_mismatch(state, layer, "int", value))?;
        let buf = self.encode(n);
        state.write_bytes(layer, &buf)?;
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let mut bytes = Vec::new();
        loop {
            let byte = state.read_exact(layer, 1)?[0];
            let (_, continues) = self.group_value(byte);
            bytes.push(byte);
            if !continues {
                break;
            }
        }
        Ok(Value::Int(self.decode(&bytes)))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        Err(Error::DynamicSize { path: state.path_of(layer).to_owned() })
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Int
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.order = order;
    }
}

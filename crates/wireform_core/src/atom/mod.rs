//! The atom capability protocol and the closed set of built-in atom variants that implement it.
//!
//! [`AtomProtocol`] is a single `pack`/`unpack`/`size`/`type_tag` interface every atom satisfies.
//! [`Atom`] is a sum type over the built-ins, with [`Atom::Custom`] as a `dyn AtomProtocol`
//! trait-object escape hatch for anything that doesn't fit a built-in shape.

pub mod combinator;
pub mod primitive;
pub mod string;
pub mod struct_atom;

use std::fmt;
use std::rc::Rc;

use crate::endian::Endian;
use crate::error::Result;
use crate::layer::LayerId;
use crate::length::LengthSpec;
use crate::state::State;
use crate::value::Value;

pub use combinator::{
    CaseKey, CaseSelector, CaseTarget, Cases, CondSpec, ConditionAtom, ConstAtom, ComputedAtom,
    ComputedValue, EnumAtom, LazyAtom, OffsetAtom, OffsetSpec, RepeatedAtom, SwitchAtom, SwitchKey,
};
pub use primitive::{BoolAtom, BytesAtom, CharAtom, FloatAtom, IntAtom, PaddingAtom, VarIntAtom};
pub use string::{CStringAtom, Encoding, PStringAtom};
pub use struct_atom::{Field, StructAtom};

/// Declared host-language type of an atom's produced values. Combinators whose shape depends on
/// runtime context (`Switch`, `Lazy` without a resolved child) report `Dynamic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    None,
    Bool,
    Int,
    Float,
    Bytes,
    Str,
    Seq,
    Map,
    Dynamic,
}

/// The uniform capability protocol every atom implements.
pub trait AtomProtocol: fmt::Debug {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()>;
    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value>;
    /// Static or context-dependent byte size. Returns `Error::DynamicSize` when the size can only
    /// be known from runtime data.
    fn size(&self, state: &State, layer: LayerId) -> Result<u64>;
    fn type_tag(&self) -> TypeTag;

    /// Optional bulk form. Returning `Ok(false)` (the default) tells the engine to fall back to a
    /// per-element loop with a fresh child layer per index.
    fn pack_many(
        &self,
        _values: &[Value],
        _state: &mut State,
        _layer: LayerId,
        _length: &LengthSpec,
    ) -> Result<bool> {
        Ok(false)
    }

    fn unpack_many(
        &self,
        _state: &mut State,
        _layer: LayerId,
        _length: &LengthSpec,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Propagates a byte order override to this atom and any sub-atoms it owns. The default does
    /// nothing; atoms with an endian-sensitive encoding, or combinators with children, override
    /// it.
    fn set_byteorder(&mut self, _order: Endian) {}
}

/// The composable value users build schemas out of. Each variant wraps a small struct that
/// implements [`AtomProtocol`] on its own; this enum only does dispatch.
#[derive(Debug, Clone)]
pub enum Atom {
    Bool(BoolAtom),
    Char(CharAtom),
    Int(IntAtom),
    Float(FloatAtom),
    Bytes(BytesAtom),
    Padding(PaddingAtom),
    VarInt(VarIntAtom),
    CString(CStringAtom),
    PString(Box<PStringAtom>),
    Const(Box<ConstAtom>),
    Enum(Box<EnumAtom>),
    Repeated(Box<RepeatedAtom>),
    Condition(Box<ConditionAtom>),
    Switch(Box<SwitchAtom>),
    Offset(Box<OffsetAtom>),
    Lazy(LazyAtom),
    Computed(ComputedAtom),
    Struct(Box<StructAtom>),
    /// User-supplied atom that doesn't fit a built-in shape.
    Custom(Rc<dyn AtomProtocol>),
}

macro_rules! dispatch {
    ($self:expr, $atom:ident => $body:expr) => {
        match $self {
            Atom::Bool($atom) => $body,
            Atom::Char($atom) => $body,
            Atom::Int($atom) => $body,
            Atom::Float($atom) => $body,
            Atom::Bytes($atom) => $body,
            Atom::Padding($atom) => $body,
            Atom::VarInt($atom) => $body,
            Atom::CString($atom) => $body,
            Atom::PString($atom) => $body,
            Atom::Const($atom) => $body,
            Atom::Enum($atom) => $body,
            Atom::Repeated($atom) => $body,
            Atom::Condition($atom) => $body,
            Atom::Switch($atom) => $body,
            Atom::Offset($atom) => $body,
            Atom::Lazy($atom) => $body,
            Atom::Computed($atom) => $body,
            Atom::Struct($atom) => $body,
            Atom::Custom($atom) => $body,
        }
    };
}

impl AtomProtocol for Atom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        dispatch!(self, a => a.pack(value, state, layer))
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        dispatch!(self, a => a.unpack(state, layer))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        dispatch!(self, a => a.size(state, layer))
    }

    fn type_tag(&self) -> TypeTag {
        dispatch!(self, a => a.type_tag())
    }

    fn pack_many(
        &self,
        values: &[Value],
        state: &mut State,
        layer: LayerId,
        length: &LengthSpec,
    ) -> Result<bool> {
        dispatch!(self, a => a.pack_many(values, state, layer, length))
    }

    fn unpack_many(
        &self,
        state: &mut State,
        layer: LayerId,
        length: &LengthSpec,
    ) -> Result<Option<Value>> {
        dispatch!(self, a => a.unpack_many(state, layer, length))
    }

    fn set_byteorder(&mut self, order: Endian) {
        match self {
            Atom::Bool(a) => a.set_byteorder(order),
            Atom::Char(a) => a.set_byteorder(order),
            Atom::Int(a) => a.set_byteorder(order),
            Atom::Float(a) => a.set_byteorder(order),
            Atom::Bytes(a) => a.set_byteorder(order),
            Atom::Padding(a) => a.set_byteorder(order),
            Atom::VarInt(a) => a.set_byteorder(order),
            Atom::CString(a) => a.set_byteorder(order),
            Atom::PString(a) => a.set_byteorder(order),
            Atom::Const(a) => a.set_byteorder(order),
            Atom::Enum(a) => a.set_byteorder(order),
            Atom::Repeated(a) => a.set_byteorder(order),
            Atom::Condition(a) => a.set_byteorder(order),
            Atom::Switch(a) => a.set_byteorder(order),
            Atom::Offset(a) => a.set_byteorder(order),
            Atom::Lazy(a) => a.set_byteorder(order),
            Atom::Computed(a) => a.set_byteorder(order),
            Atom::Struct(a) => a.set_byteorder(order),
            Atom::Custom(_) => {}
        }
    }
}

impl Atom {
    /// Convenience for building a [`Atom::Custom`] from any [`AtomProtocol`] implementation.
    pub fn custom(atom: impl AtomProtocol + 'static) -> Self {
        Atom::Custom(Rc::new(atom))
    }
}

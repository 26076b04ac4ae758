//! The combinators that give atoms their structure: constants, enums, repetition, conditionals,
//! tagged unions, offset indirection, lazy recursion and purely derived values.

use std::cell::RefCell;
use std::rc::Rc;

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::layer::LayerId;
use crate::length::{eval_length_pack, eval_length_unpack, LengthSpec};
use crate::state::State;
use crate::value::Value;

use super::{Atom, AtomProtocol, TypeTag};

/// Wraps an atom with a fixed expected value; a mismatch on either pack or unpack is an error
/// rather than silently accepted or silently overwritten.
#[derive(Debug, Clone)]
pub struct ConstAtom {
    pub inner: Atom,
    pub expected: Value,
}

impl ConstAtom {
    pub fn new(inner: Atom, expected: Value) -> Self {
        Self { inner, expected }
    }
}

impl AtomProtocol for ConstAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        if *value != self.expected {
            return Err(Error::InvalidValue {
                path: state.path_of(layer).to_owned(),
                message: format!("expected constant {}, got {}", self.expected, value),
            });
        }
        self.inner.pack(value, state, layer)
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let value = self.inner.unpack(state, layer)?;
        if value != self.expected {
            return Err(Error::InvalidValue {
                path: state.path_of(layer).to_owned(),
                message: format!("expected constant {}, got {}", self.expected, value),
            });
        }
        Ok(value)
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        self.inner.size(state, layer)
    }

    fn type_tag(&self) -> TypeTag {
        self.inner.type_tag()
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.inner.set_byteorder(order);
    }
}

/// Maps a raw value read/written by `inner` to a symbolic name and back. An unmapped raw value on
/// unpack, or an unmapped name on pack, falls back to `default` if one was configured.
#[derive(Debug, Clone)]
pub struct EnumAtom {
    pub inner: Atom,
    pub mapping: Vec<(Value, Value)>,
    pub default: Option<Value>,
}

impl EnumAtom {
    pub fn new(inner: Atom, mapping: Vec<(Value, Value)>) -> Self {
        Self { inner, mapping, default: None }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

impl AtomProtocol for EnumAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        match self.mapping.iter().find(|(_, name)| name == value) {
            Some((raw, _)) => self.inner.pack(raw, state, layer),
            // Not a known member name - pass it straight through, letting `inner` reject it if
            // it isn't a plain value `inner` can pack on its own.
            None => self.inner.pack(value, state, layer),
        }
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let raw = self.inner.unpack(state, layer)?;
        match self.mapping.iter().find(|(r, _)| *r == raw) {
            Some((_, name)) => Ok(name.clone()),
            // Unmapped and no default configured - hand back the raw integer rather than error.
            None => Ok(self.default.clone().unwrap_or(raw)),
        }
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        self.inner.size(state, layer)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Dynamic
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.inner.set_byteorder(order);
    }
}

/// Packs/unpacks a sequence of `inner` elements, with the element count or byte span governed by
/// `length`. Tries `inner.pack_many`/`unpack_many` before falling back to a per-element loop, each
/// iteration under its own child layer named by index.
#[derive(Debug, Clone)]
pub struct RepeatedAtom {
    pub inner: Atom,
    pub length: LengthSpec,
}

impl RepeatedAtom {
    pub fn new(inner: Atom, length: LengthSpec) -> Self {
        Self { inner, length }
    }
}

impl AtomProtocol for RepeatedAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let items = value.as_seq().ok_or_else(|| Error::TypeMismatch {
            path: state.path_of(layer).to_owned(),
            expected: "seq",
            value: value.to_string(),
        })?;

        eval_length_pack(&self.length, items.len() as i64, state, layer)?;

        if self
            .inner
            .pack_many(items, state, layer, &self.length)?
        {
            return Ok(());
        }

        for (i, item) in items.iter().enumerate() {
            let child = state.push_child(layer, &i.to_string());
            let result = self.inner.pack(item, state, child);
            state.pop_child(child);
            result?;
        }
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        if let Some(bulk) = self.inner.unpack_many(state, layer, &self.length)? {
            return Ok(bulk);
        }

        let evaluated = eval_length_unpack(&self.length, state, layer)?;
        let mut items = Vec::new();

        if evaluated.greedy {
            loop {
                let child = state.push_child(layer, &items.len().to_string());
                let result = self.inner.unpack(state, child);
                state.pop_child(child);
                match result {
                    Ok(value) => items.push(value),
                    Err(e) if e.is_eof_like() => {
                        log::trace!("greedy repeat stopped after {} elements: {e}", items.len());
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        } else {
            for i in 0..evaluated.n {
                let child = state.push_child(layer, &i.to_string());
                let result = self.inner.unpack(state, child);
                state.pop_child(child);
                items.push(result?);
            }
        }

        Ok(Value::Seq(items))
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        match self.length {
            LengthSpec::Fixed(n) => Ok(n as u64 * self.inner.size(state, layer)?),
            _ => Err(Error::DynamicSize { path: state.path_of(layer).to_owned() }),
        }
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Seq
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.inner.set_byteorder(order);
    }
}

/// Whether to evaluate a condition once (a constant) or per-call (a context-dependent callable).
#[derive(Debug, Clone)]
pub enum CondSpec {
    Literal(bool),
    Callable(Expr),
}

impl CondSpec {
    pub(crate) fn evaluate(&self, state: &State, layer: LayerId) -> Result<bool> {
        match self {
            CondSpec::Literal(b) => Ok(*b),
            CondSpec::Callable(expr) => Ok(expr.evaluate(state, layer)?.truthy()),
        }
    }
}

/// Packs/unpacks `inner` only when `condition` holds; otherwise the field contributes no bytes
/// and resolves to `Value::None`.
#[derive(Debug, Clone)]
pub struct ConditionAtom {
    pub inner: Atom,
    pub condition: CondSpec,
}

impl ConditionAtom {
    pub fn new(inner: Atom, condition: CondSpec) -> Self {
        Self { inner, condition }
    }
}

impl AtomProtocol for ConditionAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        if self.condition.evaluate(state, layer)? {
            self.inner.pack(value, state, layer)
        } else {
            Ok(())
        }
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        if self.condition.evaluate(state, layer)? {
            self.inner.unpack(state, layer)
        } else {
            Ok(Value::None)
        }
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        if self.condition.evaluate(state, layer)? {
            self.inner.size(state, layer)
        } else {
            Ok(0)
        }
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Dynamic
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.inner.set_byteorder(order);
    }
}

/// How a [`SwitchAtom`] learns which case to pick. `Atom` reads a fresh discriminant straight off
/// the stream (unpack only - there's no value to derive it from on pack); `Selector` evaluates a
/// callable against already-resolved context, which works for both directions.
#[derive(Debug, Clone)]
pub enum SwitchKey {
    Atom(Box<Atom>),
    Selector(Expr),
}

pub type CaseKey = Value;

/// What a matched case resolves to: a sub-atom to run, or "none", meaning the discriminant value
/// itself is the answer and no further atom runs.
#[derive(Debug, Clone)]
pub enum CaseTarget {
    Atom(Box<Atom>),
    None,
}

impl CaseTarget {
    pub fn atom(atom: Atom) -> Self {
        CaseTarget::Atom(Box::new(atom))
    }
}

/// A callable case table: given the active state/layer, picks the target directly rather than
/// matching the discriminant against a list. Used for switches whose branching depends on more
/// context than a single looked-up value.
pub type CaseSelector = Rc<dyn Fn(&State, LayerId) -> Result<CaseTarget>>;

/// The table a [`SwitchAtom`] consults once it has a discriminant.
#[derive(Clone)]
pub enum Cases {
    List(Vec<(CaseKey, CaseTarget)>),
    Callable(CaseSelector),
}

impl Cases {
    pub fn list(cases: Vec<(CaseKey, Atom)>) -> Self {
        Cases::List(cases.into_iter().map(|(k, a)| (k, CaseTarget::atom(a))).collect())
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&State, LayerId) -> Result<CaseTarget> + 'static,
    {
        Cases::Callable(Rc::new(f))
    }
}

impl std::fmt::Debug for Cases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cases::List(list) => f.debug_tuple("List").field(list).finish(),
            Cases::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// A tagged union: the atom used to pack/unpack depends on a runtime discriminant rather than
/// being fixed at schema-construction time.
#[derive(Debug, Clone)]
pub struct SwitchAtom {
    pub key: SwitchKey,
    pub cases: Cases,
    pub default: Option<Box<Atom>>,
}

impl SwitchAtom {
    pub fn new(key: SwitchKey, cases: Cases) -> Self {
        Self { key, cases, default: None }
    }

    pub fn with_default(mut self, default: Atom) -> Self {
        self.default = Some(Box::new(default));
        self
    }

    fn pick(&self, discriminant: &Value, state: &State, layer: LayerId) -> Result<CaseTarget> {
        match &self.cases {
            Cases::Callable(selector) => selector(state, layer),
            Cases::List(list) => {
                if let Some((_, target)) = list.iter().find(|(key, _)| key == discriminant) {
                    return Ok(target.clone());
                }
                match &self.default {
                    Some(atom) => Ok(CaseTarget::Atom(atom.clone())),
                    None => Err(Error::InvalidValue {
                        path: state.path_of(layer).to_owned(),
                        message: format!("no switch case matches {discriminant}"),
                    }),
                }
            }
        }
    }
}

impl AtomProtocol for SwitchAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let discriminant = match &self.key {
            SwitchKey::Selector(expr) => expr.evaluate(state, layer)?,
            SwitchKey::Atom(_) => {
                return Err(Error::NotImplemented {
                    path: state.path_of(layer).to_owned(),
                    capability: "pack via an atom-keyed switch (use a selector instead)",
                })
            }
        };
        match self.pick(&discriminant, state, layer)? {
            CaseTarget::Atom(atom) => atom.pack(value, state, layer),
            // The discriminant already carries the data; there's nothing further to write.
            CaseTarget::None => Ok(()),
        }
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let discriminant = match &self.key {
            SwitchKey::Selector(expr) => expr.evaluate(state, layer)?,
            SwitchKey::Atom(atom) => atom.unpack(state, layer)?,
        };
        match self.pick(&discriminant, state, layer)? {
            CaseTarget::Atom(atom) => atom.unpack(state, layer),
            CaseTarget::None => Ok(discriminant),
        }
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        Err(Error::DynamicSize { path: state.path_of(layer).to_owned() })
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Dynamic
    }

    fn set_byteorder(&mut self, order: Endian) {
        if let SwitchKey::Atom(atom) = &mut self.key {
            atom.set_byteorder(order);
        }
        if let Cases::List(list) = &mut self.cases {
            for (_, target) in list {
                if let CaseTarget::Atom(atom) = target {
                    atom.set_byteorder(order);
                }
            }
        }
        if let Some(default) = &mut self.default {
            default.set_byteorder(order);
        }
    }
}

/// Where to place `inner`'s data: an absolute stream position, or one derived from a callable
/// evaluated against the active context (e.g. a previously-parsed offset field).
#[derive(Debug, Clone)]
pub enum OffsetSpec {
    Absolute(u64),
    Callable(Expr),
}

impl OffsetSpec {
    fn resolve(&self, state: &State, layer: LayerId) -> Result<u64> {
        match self {
            OffsetSpec::Absolute(n) => Ok(*n),
            OffsetSpec::Callable(expr) => {
                let value = expr.evaluate(state, layer)?;
                value.as_int().map(|n| n as u64).ok_or_else(|| Error::TypeMismatch {
                    path: state.path_of(layer).to_owned(),
                    expected: "int",
                    value: value.to_string(),
                })
            }
        }
    }
}

/// Seeks to `offset`, packs/unpacks `inner` there, then restores the stream position the caller
/// was at before entering this atom. Doesn't advance the enclosing struct's cursor - the data it
/// reaches is out of line.
#[derive(Debug, Clone)]
pub struct OffsetAtom {
    pub inner: Atom,
    pub offset: OffsetSpec,
}

impl OffsetAtom {
    pub fn new(inner: Atom, offset: OffsetSpec) -> Self {
        Self { inner, offset }
    }
}

impl AtomProtocol for OffsetAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        let target = self.offset.resolve(state, layer)?;
        let saved = state.tell(layer)?;
        state.seek_to(layer, target as i64, crate::stream::Whence::Start)?;
        let result = self.inner.pack(value, state, layer);
        state.seek_to(layer, saved as i64, crate::stream::Whence::Start)?;
        result
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        let target = self.offset.resolve(state, layer)?;
        let saved = state.tell(layer)?;
        state.seek_to(layer, target as i64, crate::stream::Whence::Start)?;
        let result = self.inner.unpack(state, layer);
        state.seek_to(layer, saved as i64, crate::stream::Whence::Start)?;
        result
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(0)
    }

    fn type_tag(&self) -> TypeTag {
        self.inner.type_tag()
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.inner.set_byteorder(order);
    }
}

/// Defers building its inner atom until pack/unpack/size time. This is the mechanism
/// self-referential schemas use to avoid constructing an infinitely deep atom tree up front.
///
/// The built atom is cached after the first resolution and reused on later calls, unless
/// `always_lazy` is set, in which case every call rebuilds it from scratch (for a builder whose
/// result legitimately varies call to call, not just at construction time). `set_byteorder`
/// stores the override and drops any cached atom, so the next resolution rebuilds with it applied
/// - this happens regardless of `always_lazy`, since a byteorder change has to reach an
/// `always_lazy` builder's output too.
#[derive(Clone)]
pub struct LazyAtom {
    builder: Rc<dyn Fn() -> Atom>,
    always_lazy: bool,
    byteorder: Option<Endian>,
    cache: RefCell<Option<Box<Atom>>>,
}

impl LazyAtom {
    pub fn new(builder: impl Fn() -> Atom + 'static) -> Self {
        Self {
            builder: Rc::new(builder),
            always_lazy: false,
            byteorder: None,
            cache: RefCell::new(None),
        }
    }

    pub fn always_lazy(mut self) -> Self {
        self.always_lazy = true;
        self
    }

    fn resolve(&self) -> Atom {
        if !self.always_lazy {
            if let Some(atom) = self.cache.borrow().as_ref() {
                return (**atom).clone();
            }
        }
        let mut atom = (self.builder)();
        if let Some(order) = self.byteorder {
            atom.set_byteorder(order);
        }
        if !self.always_lazy {
            *self.cache.borrow_mut() = Some(Box::new(atom.clone()));
        }
        atom
    }
}

impl std::fmt::Debug for LazyAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LazyAtom(..)")
    }
}

impl AtomProtocol for LazyAtom {
    fn pack(&self, value: &Value, state: &mut State, layer: LayerId) -> Result<()> {
        self.resolve().pack(value, state, layer)
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        self.resolve().unpack(state, layer)
    }

    fn size(&self, state: &State, layer: LayerId) -> Result<u64> {
        self.resolve().size(state, layer)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Dynamic
    }

    fn set_byteorder(&mut self, order: Endian) {
        self.byteorder = Some(order);
        *self.cache.borrow_mut() = None;
    }
}

/// Either a constant or a callable evaluated fresh each time.
#[derive(Debug, Clone)]
pub enum ComputedValue {
    Literal(Value),
    Expr(Expr),
}

/// A value derived purely from context, occupying no stream space. Unpack evaluates and returns
/// it; pack is a no-op, since there's nothing to write.
#[derive(Debug, Clone)]
pub struct ComputedAtom {
    pub value: ComputedValue,
}

impl ComputedAtom {
    pub fn new(value: ComputedValue) -> Self {
        Self { value }
    }

    fn evaluate(&self, state: &State, layer: LayerId) -> Result<Value> {
        match &self.value {
            ComputedValue::Literal(v) => Ok(v.clone()),
            ComputedValue::Expr(expr) => expr.evaluate(state, layer),
        }
    }
}

impl AtomProtocol for ComputedAtom {
    fn pack(&self, _value: &Value, _state: &mut State, _layer: LayerId) -> Result<()> {
        Ok(())
    }

    fn unpack(&self, state: &mut State, layer: LayerId) -> Result<Value> {
        self.evaluate(state, layer)
    }

    fn size(&self, _state: &State, _layer: LayerId) -> Result<u64> {
        Ok(0)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::Dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::primitive::{BoolAtom, IntAtom};
    use crate::context::Context;
    use crate::stream::memory_stream;

    fn new_state() -> State {
        State::new(Box::new(memory_stream()), Context::new())
    }

    #[test]
    fn const_atom_rejects_mismatched_pack() {
        let mut state = new_state();
        let layer = state.root();
        let atom = ConstAtom::new(Atom::Int(IntAtom::new(8, false, true)), Value::Int(7));
        assert!(atom.pack(&Value::Int(9), &mut state, layer).is_err());
        assert!(atom.pack(&Value::Int(7), &mut state, layer).is_ok());
    }

    #[test]
    fn enum_atom_maps_raw_to_name_and_back() {
        let mut state = new_state();
        let layer = state.root();
        let atom = EnumAtom::new(
            Atom::Int(IntAtom::new(8, false, true)),
            vec![(Value::Int(0), Value::Str("red".into())), (Value::Int(1), Value::Str("blue".into()))],
        );
        atom.pack(&Value::Str("blue".into()), &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("blue".into())
        );
    }

    #[test]
    fn enum_atom_falls_back_to_default_on_unknown_raw() {
        let mut state = new_state();
        let layer = state.root();
        state.write_bytes(layer, &[99]).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        let atom = EnumAtom::new(Atom::Int(IntAtom::new(8, false, true)), vec![])
            .with_default(Value::Str("unknown".into()));
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Str("unknown".into())
        );
    }

    #[test]
    fn enum_atom_returns_raw_int_on_unknown_raw_without_default() {
        let mut state = new_state();
        let layer = state.root();
        state.write_bytes(layer, &[99]).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        let atom = EnumAtom::new(Atom::Int(IntAtom::new(8, false, true)), vec![]);
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), Value::Int(99));
    }

    #[test]
    fn enum_atom_pack_passes_plain_value_through_when_unmapped() {
        let mut state = new_state();
        let layer = state.root();
        let atom = EnumAtom::new(
            Atom::Int(IntAtom::new(8, false, true)),
            vec![(Value::Int(0), Value::Str("red".into()))],
        );
        atom.pack(&Value::Int(42), &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(state.read_exact(layer, 1).unwrap(), vec![42]);
    }

    #[test]
    fn repeated_atom_with_fixed_length_round_trips() {
        let mut state = new_state();
        let layer = state.root();
        let atom = RepeatedAtom::new(
            Atom::Int(IntAtom::new(8, false, true)),
            LengthSpec::fixed(3),
        );
        let seq = Value::Seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        atom.pack(&seq, &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), seq);
    }

    #[test]
    fn repeated_atom_greedy_stops_at_eof() {
        let mut state = new_state();
        let layer = state.root();
        state.write_bytes(layer, &[1, 2, 3]).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        let atom = RepeatedAtom::new(Atom::Int(IntAtom::new(8, false, true)), LengthSpec::Greedy);
        assert_eq!(
            atom.unpack(&mut state, layer).unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn condition_atom_skips_inner_when_false() {
        let mut state = new_state();
        let layer = state.root();
        let atom = ConditionAtom::new(
            Atom::Bool(BoolAtom),
            CondSpec::Literal(false),
        );
        atom.pack(&Value::Bool(true), &mut state, layer).unwrap();
        assert_eq!(state.tell(layer).unwrap(), 0);
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), Value::None);
    }

    #[test]
    fn switch_atom_picks_case_by_selector() {
        let mut globals = Context::new();
        globals.set("kind", 1i64);
        let mut state = State::new(Box::new(memory_stream()), globals);
        let layer = state.root();

        let atom = SwitchAtom::new(
            SwitchKey::Selector(Expr::path("kind")),
            Cases::list(vec![
                (Value::Int(0), Atom::Int(IntAtom::new(8, false, true))),
                (Value::Int(1), Atom::Int(IntAtom::new(16, false, true))),
            ]),
        );
        atom.pack(&Value::Int(300), &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), Value::Int(300));
    }

    #[test]
    fn switch_atom_none_case_passes_the_discriminant_through() {
        let mut globals = Context::new();
        globals.set("kind", 7i64);
        let mut state = State::new(Box::new(memory_stream()), globals);
        let layer = state.root();

        let atom = SwitchAtom::new(
            SwitchKey::Selector(Expr::path("kind")),
            Cases::List(vec![(Value::Int(7), CaseTarget::None)]),
        );
        atom.pack(&Value::Int(999), &mut state, layer).unwrap();
        assert_eq!(state.tell(layer).unwrap(), 0);
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), Value::Int(7));
    }

    #[test]
    fn switch_atom_callable_cases_ignore_the_discriminant_lookup() {
        let mut state = new_state();
        let layer = state.root();

        let atom = SwitchAtom::new(
            SwitchKey::Selector(Expr::Literal(Value::Int(0))),
            Cases::callable(|_state, _layer| {
                Ok(CaseTarget::atom(Atom::Int(IntAtom::new(8, false, true))))
            }),
        );
        atom.pack(&Value::Int(42), &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), Value::Int(42));
    }

    #[test]
    fn offset_atom_restores_stream_position() {
        let mut state = new_state();
        let layer = state.root();
        state.write_bytes(layer, &[0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        state.seek_to(layer, 2, crate::stream::Whence::Start).unwrap();

        let atom = OffsetAtom::new(
            Atom::Int(IntAtom::new(8, false, true)),
            OffsetSpec::Absolute(6),
        );
        atom.pack(&Value::Int(42), &mut state, layer).unwrap();
        assert_eq!(state.tell(layer).unwrap(), 2);

        state.seek_to(layer, 6, crate::stream::Whence::Start).unwrap();
        assert_eq!(state.read_exact(layer, 1).unwrap(), vec![42]);
    }

    #[test]
    fn lazy_atom_caches_the_built_atom_by_default() {
        let calls = Rc::new(RefCell::new(0));
        let counted = calls.clone();
        let atom = LazyAtom::new(move || {
            *counted.borrow_mut() += 1;
            Atom::Int(IntAtom::new(8, false, true))
        });

        let mut state = new_state();
        let layer = state.root();
        atom.pack(&Value::Int(1), &mut state, layer).unwrap();
        atom.pack(&Value::Int(2), &mut state, layer).unwrap();
        atom.size(&state, layer).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn lazy_atom_with_always_lazy_rebuilds_every_call() {
        let calls = Rc::new(RefCell::new(0));
        let counted = calls.clone();
        let atom = LazyAtom::new(move || {
            *counted.borrow_mut() += 1;
            Atom::Int(IntAtom::new(8, false, true))
        })
        .always_lazy();

        let mut state = new_state();
        let layer = state.root();
        atom.pack(&Value::Int(1), &mut state, layer).unwrap();
        atom.pack(&Value::Int(2), &mut state, layer).unwrap();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn lazy_atom_set_byteorder_reaches_the_resolved_child() {
        let mut atom = LazyAtom::new(|| Atom::Int(IntAtom::new(16, false, true)));
        // Force the default little-endian build into the cache first.
        let mut state = new_state();
        let layer = state.root();
        atom.pack(&Value::Int(1), &mut state, layer).unwrap();

        atom.set_byteorder(Endian::Big);
        let mut state = new_state();
        let layer = state.root();
        atom.pack(&Value::Int(0x1234), &mut state, layer).unwrap();
        state.seek_to(layer, 0, crate::stream::Whence::Start).unwrap();
        assert_eq!(state.read_exact(layer, 2).unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn computed_atom_never_touches_the_stream() {
        let mut state = new_state();
        let layer = state.root();
        let atom = ComputedAtom::new(ComputedValue::Literal(Value::Int(5)));
        atom.pack(&Value::Int(999), &mut state, layer).unwrap();
        assert_eq!(state.tell(layer).unwrap(), 0);
        assert_eq!(atom.unpack(&mut state, layer).unwrap(), Value::Int(5));
    }
}

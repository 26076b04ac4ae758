//! A declarative binary serialization engine: schemas are built out of composable [`atom::Atom`]
//! values, then driven against a byte stream by [`driver::pack`], [`driver::unpack`] and
//! [`driver::sizeof`].
//!
//! The moving parts:
//! - [`value::Value`] is the dynamic data exchanged between a stream and a schema.
//! - [`atom`] holds the atom sum type and the built-in variants (primitives, strings,
//!   combinators, structs).
//! - [`expr::Expr`] is the deferred-evaluation expression tree used for lengths, conditions,
//!   switch selectors and computed fields.
//! - [`state::State`]/[`layer`] track the stream, the global context and the per-level parsing
//!   context through a single pack/unpack/sizeof call.

pub mod atom;
pub mod context;
pub mod driver;
pub mod endian;
pub mod error;
pub mod expr;
pub mod layer;
pub mod length;
pub mod state;
pub mod stream;
pub mod value;

pub use atom::{Atom, AtomProtocol};
pub use context::Context;
pub use driver::{pack, sizeof, unpack};
pub use endian::Endian;
pub use error::{Error, Result};
pub use expr::Expr;
pub use value::Value;
pub use wireform_proc::{atom_enum, StructSchema};

//! Internal implementation of `wireform_core`'s derive macros.

mod m_enum_mapping;
mod m_struct_schema;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, ItemEnum};

/// Builds a `schema()` associated function from a struct's field attributes.
///
/// Every field must carry a `#[atom(EXPR)]` attribute, where `EXPR` is any expression producing
/// a `wireform_core::Atom`. Field declaration order becomes wire order.
///
/// ```ignore
/// #[derive(StructSchema)]
/// struct Header {
///     #[atom(Atom::Int(IntAtom::new(32, false, true)))]
///     magic: u32,
///     #[atom(Atom::Int(IntAtom::new(16, false, true)))]
///     version: u16,
/// }
/// ```
#[proc_macro_derive(StructSchema, attributes(atom))]
pub fn struct_schema_derive(input: TokenStream) -> TokenStream {
    match m_struct_schema::derive_impl(parse_macro_input!(input as DeriveInput)) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Adds `TryFrom<REPR>`/`Into<REPR>` to a fieldless enum and an `enum_mapping()` associated
/// function pairing each variant's discriminant with its name as a `wireform_core::Value`, ready
/// to hand to `EnumAtom::new`.
///
/// ```ignore
/// #[atom_enum(u8)]
/// enum Kind {
///     Request = 0,
///     Response = 1,
/// }
/// ```
#[proc_macro_attribute]
pub fn atom_enum(attr: TokenStream, item: TokenStream) -> TokenStream {
    let repr = parse_macro_input!(attr as syn::Type);
    let item = parse_macro_input!(item as ItemEnum);
    match m_enum_mapping::expand(repr, item) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DataStruct, DeriveInput, Expr, Ident};

pub fn derive_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = extract_field_metadata(match &input.data {
        syn::Data::Struct(s) => s,
        _ => return Err(syn::Error::new_spanned(&input, "expected a struct")),
    })?;

    let field_entries = fields.iter().map(|field| {
        let name = &field.name;
        let atom_expr = &field.atom_expr;
        quote! {
            ::wireform_core::atom::Field::new(#name, #atom_expr)
        }
    });

    Ok(quote! {
        impl #name {
            /// The wire schema for this struct, built from its `#[atom(..)]` field attributes.
            pub fn schema() -> ::wireform_core::Atom {
                ::wireform_core::Atom::Struct(::std::boxed::Box::new(
                    ::wireform_core::atom::StructAtom::new(vec![
                        #(#field_entries),*
                    ])
                ))
            }
        }
    })
}

struct FieldMeta {
    name: String,
    atom_expr: Expr,
}

/// Walks every field, requiring exactly one `#[atom(EXPR)]` attribute on each.
fn extract_field_metadata(st: &DataStruct) -> syn::Result<Vec<FieldMeta>> {
    let mut result = Vec::with_capacity(st.fields.len());

    for field in &st.fields {
        let field_error = |msg: &str| Err(syn::Error::new_spanned(field, msg));

        let Some(field_ident) = &field.ident else {
            return field_error("tuple structs are not supported");
        };

        let mut atom_expr = None;
        for attribute in &field.attrs {
            if attribute.path.is_ident("atom") {
                if atom_expr.is_some() {
                    return field_error("duplicate #[atom(..)] attribute");
                }
                atom_expr = Some(attribute.parse_args::<Expr>()?);
            }
        }

        let atom_expr = match atom_expr {
            Some(e) => e,
            None => return field_error("missing #[atom(..)] attribute"),
        };

        result.push(FieldMeta {
            name: field_ident_to_wire_name(field_ident),
            atom_expr,
        });
    }

    Ok(result)
}

fn field_ident_to_wire_name(ident: &Ident) -> String {
    ident.to_string()
}

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Expr, ItemEnum, Type};

pub fn expand(repr: Type, item: ItemEnum) -> syn::Result<TokenStream2> {
    for variant in &item.variants {
        if !variant.fields.is_empty() {
            return Err(syn::Error::new_spanned(
                variant,
                "atom_enum only supports fieldless variants",
            ));
        }
    }

    let enum_name = &item.ident;

    let discriminant_consts = item.variants.iter().map(|variant| {
        let variant_name = &variant.ident;
        let const_name = quote::format_ident!("{}_DISCRIMINANT", variant_name);
        quote! {
            const #const_name: #repr = #enum_name::#variant_name as #repr;
        }
    });

    let try_from_arms = item.variants.iter().map(|variant| {
        let variant_name = &variant.ident;
        let const_name = quote::format_ident!("{}_DISCRIMINANT", variant_name);
        quote! {
            #const_name => Ok(#enum_name::#variant_name),
        }
    });

    let mapping_entries = item.variants.iter().map(|variant| {
        let variant_name = &variant.ident;
        let literal = discriminant_literal(&variant.discriminant);
        let name_str = variant_name.to_string();
        quote! {
            (::wireform_core::Value::Int((#literal) as i128), ::wireform_core::Value::Str(#name_str.to_owned()))
        }
    });

    Ok(quote! {
        #[repr(#repr)]
        #item

        impl #enum_name {
            /// Pairs each variant's discriminant with its name, ready for `EnumAtom::new`.
            pub fn enum_mapping() -> ::std::vec::Vec<(::wireform_core::Value, ::wireform_core::Value)> {
                vec![#(#mapping_entries),*]
            }
        }

        impl ::std::convert::TryFrom<#repr> for #enum_name {
            type Error = #repr;

            fn try_from(value: #repr) -> ::std::result::Result<Self, Self::Error> {
                #(#discriminant_consts)*
                match value {
                    #(#try_from_arms)*
                    other => Err(other),
                }
            }
        }

        impl ::std::convert::From<#enum_name> for #repr {
            fn from(value: #enum_name) -> #repr {
                value as #repr
            }
        }
    })
}

/// Variants without an explicit `= N` can't be turned into a literal without re-running C-style
/// discriminant inference; `atom_enum` requires every variant to specify one explicitly.
fn discriminant_literal(discriminant: &Option<(syn::token::Eq, Expr)>) -> TokenStream2 {
    match discriminant {
        Some((_, expr)) => quote! { #expr },
        None => quote! {
            compile_error!("atom_enum requires every variant to have an explicit discriminant")
        },
    }
}

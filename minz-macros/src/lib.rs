//! `#[derive(EnumFromStr)]` and `#[derive(MnemonicName)]` for the closed,
//! fieldless enums that need to round-trip through text: IR opcodes in a
//! `.mir` dump, physical Z80 register names, attribute keys.
//!
//! Directly generalized from the teacher's `util-derive` crate: same
//! `EnumFromStr` shape, and `MnemonicName` in place of `InteropGetName`
//! (a stable name string instead of a NUL-terminated byte string for
//! C FFI, since there is no interop boundary here).

use proc_macro::TokenStream;
use quote::quote;

fn get_enum_variants(
    input: &syn::DeriveInput,
) -> &syn::punctuated::Punctuated<syn::Variant, syn::token::Comma> {
    let variants = match &input.data {
        syn::Data::Enum(enum_item) => &enum_item.variants,
        _ => panic!("Input must be an enum."),
    };

    assert!(
        variants.iter().all(|v| v.fields.is_empty()),
        "All variants must have no fields."
    );

    variants
}

#[proc_macro_derive(MnemonicName)]
pub fn mnemonic_name_derive(input: TokenStream) -> TokenStream {
    let syn_item: syn::DeriveInput = syn::parse(input).unwrap();
    let name = &syn_item.ident;
    let variants = get_enum_variants(&syn_item);

    let identifiers = variants.iter().map(|v| &v.ident);
    let literals = variants.iter().map(|v| v.ident.to_string());

    let expanded = quote! {
        impl ::minz_support::MnemonicName for #name {
            fn mnemonic(&self) -> &'static str {
                match self {
                    #( #name::#identifiers => #literals, )*
                }
            }
        }
    };
    expanded.into()
}

#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str_derive(input: TokenStream) -> TokenStream {
    let syn_item: syn::DeriveInput = syn::parse(input).unwrap();
    let name = &syn_item.ident;
    let name_str = name.to_string();
    let variants = get_enum_variants(&syn_item);
    let literals = variants.iter().map(|v| v.ident.to_string());
    let identifiers = variants.iter().map(|v| &v.ident);

    let expanded = quote! {
        impl ::minz_support::EnumFromStr for #name {
            fn from_str(s: &str) -> Result<#name, ::minz_support::ParseEnumError> {
                match s {
                    #( #literals => Ok(#name::#identifiers), )*
                    _ => Err(::minz_support::ParseEnumError {
                        value: s.to_string(),
                        enum_name: #name_str,
                    }),
                }
            }
        }

        impl ::core::str::FromStr for #name {
            type Err = ::minz_support::ParseEnumError;

            fn from_str(s: &str) -> Result<#name, ::minz_support::ParseEnumError> {
                ::minz_support::EnumFromStr::from_str(s)
            }
        }
    };

    expanded.into()
}

//! Derive macros for Strata ECS components.
//!
//! `#[derive(Component)]` implements `strata_ecs::Component` with the id
//! given in the `#[component(id = N)]` attribute:
//!
//! ```ignore
//! #[derive(Component, Clone, Copy)]
//! #[component(id = 1)]
//! struct Position { x: f32, y: f32 }
//! ```
//!
//! Ids are checked at compile time: every component needs one, and it must
//! be below the tag range (2048). Ids at or above that are tags, which carry
//! no data and are never declared as types.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, LitInt, spanned::Spanned};

/// First id of the tag range. Must equal `strata_ecs::TAG_BASE`.
const TAG_BASE: u32 = 2048;

/// Derive macro for ECS components.
///
/// # Examples
///
/// ```ignore
/// #[derive(Component)]
/// #[component(id = 7)]
/// struct Health(u32);
///
/// #[derive(Component)]
/// #[component(id = 8)]
/// enum Team { Red, Blue }
/// ```
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if matches!(input.data, syn::Data::Union(_)) {
        return Err(syn::Error::new(
            input.span(),
            "unions cannot derive Component. Use a struct or enum instead.",
        ));
    }

    let id = component_id(input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::strata_ecs::Component for #name #ty_generics #where_clause {
            const ID: ::strata_ecs::ComponentId = ::strata_ecs::ComponentId::from_raw(#id);
        }
    })
}

/// Read the id from `#[component(id = N)]`.
fn component_id(input: &DeriveInput) -> syn::Result<u32> {
    let mut found = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("component")) {
        let mut id = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                let lit: LitInt = meta.value()?.parse()?;
                let value: u32 = lit.base10_parse()?;
                if value >= TAG_BASE {
                    return Err(syn::Error::new(
                        lit.span(),
                        format!(
                            "component id {value} is in the tag range.\n\
                             Component ids must be below {TAG_BASE}; ids from {TAG_BASE} up are \
                             tags, which carry no data. Use world.add_tag() for markers"
                        ),
                    ));
                }
                id = Some(value);
                Ok(())
            } else {
                Err(meta.error("unknown component attribute, expected `id = N`"))
            }
        })?;

        if let Some(value) = id {
            if found.is_some() {
                return Err(syn::Error::new_spanned(attr, "duplicate component id"));
            }
            found = Some(value);
        }
    }

    found.ok_or_else(|| {
        syn::Error::new(
            input.ident.span(),
            format!("missing component id. Add #[component(id = N)] with N below {TAG_BASE}"),
        )
    })
}

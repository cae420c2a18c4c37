//! Derive macros for invoke-di
//!
//! - `#[derive(Injectable)]` - Mark a type as storable in a `Registry`
//! - `#[derive(Inject)]` - Generate `from_registry()` that resolves fields by type
//!
//! # Example
//!
//! ```rust,ignore
//! use invoke_di::{Inject, Injectable, Registry};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Injectable)]
//! struct Database {
//!     url: String,
//! }
//!
//! #[derive(Clone, Injectable, Inject)]
//! struct UserService {
//!     #[inject]
//!     db: Database,
//!     #[inject(optional)]
//!     cache: Option<Arc<Cache>>,
//!     // Non-injected fields use Default
//!     request_count: u64,
//! }
//!
//! let registry = Registry::new();
//! registry.provide_value(Database { url: "postgres://localhost".into() }, &[])?;
//!
//! // Registry is itself injectable, so from_registry works as a factory
//! registry.provide(|r: Registry| UserService::from_registry(&r), &[])?;
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type, parse_macro_input,
};

/// Derive `invoke_di::Injectable` with the default (non-sequence) behavior.
///
/// The type must also be `Clone + Send + Sync + 'static`.
#[proc_macro_derive(Injectable)]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::invoke_di::Injectable for #name #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}

/// Derive a `from_registry()` constructor.
///
/// # Attributes
///
/// - `#[inject]` - Resolve the field by its own type. Fails if nothing provides it.
/// - `#[inject(optional)]` - Field must be `Option<T>`; `None` if `T` can't be resolved.
///
/// Fields without `#[inject]` use `Default::default()`.
///
/// # Generated Methods
///
/// - `from_registry(registry: &Registry) -> invoke_di::Result<Self>`
///
/// Fields are resolved in declaration order, so with round-robin providers
/// two fields of the same type receive consecutive elements.
#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "Inject can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Inject can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut field_inits = Vec::with_capacity(fields.len());

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;

        let init = match find_inject_attr(&field.attrs) {
            Ok(Some(InjectAttr::Required)) => quote! {
                #field_name: registry.get::<#field_type>()?
            },
            Ok(Some(InjectAttr::Optional)) => match option_inner_type(field_type) {
                Some(inner) => quote! {
                    #field_name: registry.try_get::<#inner>()
                },
                None => {
                    return syn::Error::new_spanned(
                        field_type,
                        "Fields marked with #[inject(optional)] must have type Option<T>",
                    )
                    .to_compile_error()
                    .into();
                }
            },
            Ok(None) => quote! {
                #field_name: ::std::default::Default::default()
            },
            Err(err) => return err.to_compile_error().into(),
        };
        field_inits.push(init);
    }

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            /// Build an instance with its `#[inject]` fields resolved from `registry`.
            pub fn from_registry(
                registry: &::invoke_di::Registry
            ) -> ::invoke_di::Result<Self> {
                Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    };

    TokenStream::from(expanded)
}

enum InjectAttr {
    Required,
    Optional,
}

/// Find and parse the #[inject] attribute
fn find_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("inject")) else {
        return Ok(None);
    };

    if attr.meta.require_path_only().is_ok() {
        return Ok(Some(InjectAttr::Required));
    }

    let arg = attr.parse_args::<syn::Ident>()?;
    if arg == "optional" {
        Ok(Some(InjectAttr::Optional))
    } else {
        Err(syn::Error::new_spanned(
            arg,
            "unknown inject option, expected `optional`",
        ))
    }
}

/// Extract T from Option<T>
fn option_inner_type(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

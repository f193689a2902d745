//! Plain `repr(C)` structs and fieldless enums.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, Expr, Fields, ItemEnum, ItemStruct, Result, Type};

fn type_name(ty: &Type) -> Result<String> {
    match ty {
        Type::Path(p) => p
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .ok_or_else(|| Error::new_spanned(ty, "empty type path")),
        _ => Err(Error::new_spanned(ty, "expected a named type or an array of one")),
    }
}

pub(crate) fn expand_struct(s: &ItemStruct, padding_to: Option<&Expr>) -> Result<TokenStream> {
    let name = &s.ident;
    let name_s = name.to_string();
    let Fields::Named(named) = &s.fields else {
        return Err(Error::new(name.span(), "desc_gen structs need named fields"));
    };
    let fields = named
        .named
        .iter()
        .map(|f| {
            let f_name = f.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
            let (ty, len) = match &f.ty {
                Type::Array(a) => (type_name(&a.elem)?, {
                    let len = &a.len;
                    quote! { Some(#len) }
                }),
                ty => (type_name(ty)?, quote! { None }),
            };
            Ok(quote! {
                ::oct_inl_ipsec_generator::StructField { name: #f_name, ty: #ty, len: #len }
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let padding_to = match padding_to {
        Some(e) => quote! { Some(#e) },
        None => quote! { None },
    };
    Ok(quote! {
        impl #name {
            pub const DESC_FIELDS: &'static [::oct_inl_ipsec_generator::StructField] = &[#(#fields),*];

            pub fn fields() -> std::slice::Iter<'static, ::oct_inl_ipsec_generator::StructField> {
                Self::DESC_FIELDS.iter()
            }
        }

        impl ::oct_inl_ipsec_generator::GenHeader for #name {
            const NAME: &'static str = #name_s;

            fn gen_c_header<W: std::io::Write>(out: &mut W) -> std::io::Result<()> {
                ::oct_inl_ipsec_generator::render_c_struct(
                    out,
                    Self::NAME,
                    Self::DESC_FIELDS,
                    std::mem::size_of::<Self>(),
                    #padding_to,
                )
            }
        }
    })
}

pub(crate) fn expand_enum(e: &ItemEnum) -> Result<TokenStream> {
    let name = &e.ident;
    let name_s = name.to_string();
    if e.variants.is_empty() {
        return Err(Error::new(name.span(), "desc_gen enums need variants"));
    }
    let variants = e
        .variants
        .iter()
        .map(|v| {
            if !matches!(v.fields, Fields::Unit) {
                return Err(Error::new(v.ident.span(), "desc_gen enums must be fieldless"));
            }
            let ident = &v.ident;
            let v_name = ident.to_string();
            Ok(quote! {
                ::oct_inl_ipsec_generator::EnumVariant { name: #v_name, value: #name::#ident as usize }
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(quote! {
        impl #name {
            pub const DESC_VARIANTS: &'static [::oct_inl_ipsec_generator::EnumVariant] = &[#(#variants),*];

            pub fn variants() -> std::slice::Iter<'static, ::oct_inl_ipsec_generator::EnumVariant> {
                Self::DESC_VARIANTS.iter()
            }
        }

        impl ::oct_inl_ipsec_generator::GenHeader for #name {
            const NAME: &'static str = #name_s;

            fn gen_c_header<W: std::io::Write>(out: &mut W) -> std::io::Result<()> {
                ::oct_inl_ipsec_generator::render_c_enum(out, Self::NAME, Self::DESC_VARIANTS)
            }
        }
    })
}

//! `bitfield!` bodies: `struct Name([W]);`, optional `impl ..;` lines, the
//! default word type, then `name, setter: msb, lsb;` ranges.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::ParseStream;
use syn::punctuated::Punctuated;
use syn::{Error, Ident, ItemStruct, LitInt, Result, Token};

pub(crate) struct Word {
    name: Ident,
    word_ty: Ident,
    ranges: Punctuated<BitRange, Token![;]>,
}

struct BitRange {
    name: Ident,
    msb: usize,
    lsb: usize,
}

impl Word {
    pub(crate) fn parse(input: ParseStream) -> Result<Self> {
        let st: ItemStruct = input.parse()?;
        while input.peek(Token![impl]) {
            input.parse::<Token![impl]>()?;
            input.parse::<Ident>()?;
            input.parse::<Token![;]>()?;
        }
        let word_ty: Ident = input.parse()?;
        input.parse::<Token![;]>()?;
        let ranges = Punctuated::parse_terminated_with(input, BitRange::parse)?;
        Ok(Word {
            name: st.ident,
            word_ty,
            ranges,
        })
    }

    pub(crate) fn expand(&self) -> Result<TokenStream> {
        let name = &self.name;
        let name_s = name.to_string();
        let word_ty = &self.word_ty;
        let mut last: Option<&BitRange> = None;
        for r in self.ranges.iter() {
            if let Some(prev) = last {
                if r.lsb <= prev.msb {
                    return Err(Error::new(
                        r.name.span(),
                        format!("{} overlaps or precedes {}", r.name, prev.name),
                    ));
                }
            }
            last = Some(r);
        }
        let fields = self.ranges.iter().map(|r| {
            let f_name = r.name.to_string();
            let (msb, lsb) = (r.msb, r.lsb);
            quote! {
                ::oct_inl_ipsec_generator::DescField { name: #f_name, lsb: #lsb, msb: #msb }
            }
        });
        Ok(quote! {
            impl<T: AsRef<[#word_ty]>> #name<T> {
                pub const DESC_FIELDS: &'static [::oct_inl_ipsec_generator::DescField] = &[#(#fields),*];

                pub fn fields() -> std::slice::Iter<'static, ::oct_inl_ipsec_generator::DescField> {
                    Self::DESC_FIELDS.iter()
                }
            }

            impl<T: AsRef<[#word_ty]>> ::oct_inl_ipsec_generator::GenHeader for #name<T> {
                const NAME: &'static str = #name_s;

                fn gen_c_header<W: std::io::Write>(out: &mut W) -> std::io::Result<()> {
                    let word_sz = std::mem::size_of::<#word_ty>();
                    ::oct_inl_ipsec_generator::render_c_bitfield(
                        out,
                        Self::NAME,
                        word_sz * 8,
                        std::mem::size_of::<Self>() / word_sz,
                        Self::DESC_FIELDS,
                    )
                }
            }
        })
    }
}

impl BitRange {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(Token![pub]) {
            input.parse::<Token![pub]>()?;
        }
        let name: Ident = input.parse()?;
        input.parse::<Token![,]>()?;
        input.parse::<Ident>()?;
        input.parse::<Token![:]>()?;
        let msb_lit: LitInt = input.parse()?;
        input.parse::<Token![,]>()?;
        let lsb_lit: LitInt = input.parse()?;
        let (msb, lsb) = (msb_lit.base10_parse()?, lsb_lit.base10_parse()?);
        if msb < lsb {
            return Err(Error::new(
                msb_lit.span(),
                format!("{}: msb {} below lsb {}", name, msb, lsb),
            ));
        }
        Ok(BitRange { name, msb, lsb })
    }
}

use proc_macro2::TokenStream;
use syn::parse::{ParseStream, Parser};
use syn::{Error, Expr, Ident, Item, Result, Token};

pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> Result<TokenStream> {
    let padding_to = parse_padding_to(attr)?;
    match syn::parse2::<Item>(item)? {
        Item::Macro(m) => {
            reject_padding(&padding_to, "bitfield words")?;
            m.mac.parse_body_with(crate::bits::Word::parse)?.expand()
        }
        Item::Enum(e) => {
            reject_padding(&padding_to, "enums")?;
            crate::layout::expand_enum(&e)
        }
        Item::Struct(s) => crate::layout::expand_struct(&s, padding_to.as_ref()),
        other => Err(Error::new_spanned(
            other,
            "desc_gen expects a bitfield! invocation, an enum or a struct",
        )),
    }
}

fn parse_padding_to(attr: TokenStream) -> Result<Option<Expr>> {
    if attr.is_empty() {
        return Ok(None);
    }
    let parser = |input: ParseStream| {
        let key: Ident = input.parse()?;
        if key != "padding_to" {
            return Err(Error::new(key.span(), "unknown desc_gen option"));
        }
        input.parse::<Token![=]>()?;
        input.parse::<Expr>()
    };
    parser.parse2(attr).map(Some)
}

fn reject_padding(padding_to: &Option<Expr>, what: &str) -> Result<()> {
    match padding_to {
        Some(e) => Err(Error::new_spanned(
            e,
            format!("padding_to is not supported on {}", what),
        )),
        None => Ok(()),
    }
}

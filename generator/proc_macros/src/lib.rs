mod bits;
mod desc;
mod layout;

/// Attaches C header generation to a `bitfield!` word, a fieldless enum or
/// a `repr(C)` struct. Structs accept `padding_to = <const expr>`.
#[proc_macro_attribute]
pub fn desc_gen(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let item = proc_macro2::TokenStream::from(item);
    let generated = desc::expand(attr.into(), item.clone()).unwrap_or_else(|e| e.to_compile_error());
    proc_macro::TokenStream::from(quote::quote! {
        #item
        #generated
    })
}

//! `#[rest_api]`: turns an annotated trait into metadata records and a
//! generated `<Trait>Client<T>` backed by `restwire_core::RestClient`.
//!
//! Method attributes: `#[get("/path")]` (and `post`, `put`, `delete`,
//! `patch`, `head`, `options`), `#[http("VERB", "/path")]`,
//! `#[headers("Name: value", ...)]`, `#[multipart]` /
//! `#[multipart(boundary = "...")]`. `#[headers(...)]` on the trait applies
//! to every method.
//!
//! Parameter attributes: `#[body]` / `#[body(url_encoded | serialized, buffered)]`,
//! `#[query(format = "csv", prefix = "p", delimiter = ".")]`, `#[alias("name")]`,
//! `#[header("Name")]`, `#[header_collection]`, `#[authorize("Scheme")]`,
//! `#[property("key")]`.
use proc_macro::TokenStream;

mod codegen;
mod emit_helpers;
mod ir;
mod parse;

#[proc_macro_attribute]
pub fn rest_api(args: TokenStream, input: TokenStream) -> TokenStream {
    if let Err(e) = parse::no_args(args.into()) {
        return e.to_compile_error().into();
    }
    let item = syn::parse_macro_input!(input as syn::ItemTrait);
    match parse::parse_trait(item)
        .and_then(ir::lower)
        .map(codegen::emit)
    {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

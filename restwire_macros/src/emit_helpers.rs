// restwire_macros/src/emit_helpers.rs
//! Metadata records rebuilt as constructor expressions in generated code.

use http::Method;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use restwire_descriptor::meta::{
    BodySerialization, CollectionFormat, GenericConstraint, GenericParamRecord, InterfaceRecord,
    MethodAnnotation, MethodRecord, OutputType, ParameterAnnotation, ParameterRecord,
    ReturnRecord, ReturnWrapper, TypeKind, TypeRef,
};
use syn::LitStr;

pub fn lit_str(s: &str) -> LitStr {
    LitStr::new(s, Span::call_site())
}

fn string(s: &str) -> TokenStream2 {
    let l = lit_str(s);
    quote! { ::std::string::String::from(#l) }
}

fn opt<T>(v: &Option<T>, f: impl Fn(&T) -> TokenStream2) -> TokenStream2 {
    match v {
        Some(x) => {
            let x = f(x);
            quote! { ::core::option::Option::Some(#x) }
        }
        None => quote! { ::core::option::Option::None },
    }
}

fn meta() -> TokenStream2 {
    quote! { ::restwire_core::internal }
}

pub fn emit_method_verb(m: &Method) -> TokenStream2 {
    let meta = meta();
    let standard = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
        Method::CONNECT,
    ];
    match standard.iter().find(|s| *s == m) {
        Some(s) => {
            let c = syn::Ident::new(s.as_str(), Span::call_site());
            quote! { #meta::Method::#c }
        }
        None => {
            let b = syn::LitByteStr::new(m.as_str().as_bytes(), Span::call_site());
            quote! { #meta::Method::from_bytes(#b).unwrap_or_default() }
        }
    }
}

fn emit_kind(k: &TypeKind) -> TokenStream2 {
    let meta = meta();
    match k {
        TypeKind::String => quote! { #meta::TypeKind::String },
        TypeKind::Scalar => quote! { #meta::TypeKind::Scalar },
        TypeKind::Structured => quote! { #meta::TypeKind::Structured },
        TypeKind::Map { string_values } => {
            quote! { #meta::TypeKind::Map { string_values: #string_values } }
        }
        TypeKind::Sequence => quote! { #meta::TypeKind::Sequence },
        TypeKind::Bytes => quote! { #meta::TypeKind::Bytes },
        TypeKind::Stream => quote! { #meta::TypeKind::Stream },
        TypeKind::Cancellation => quote! { #meta::TypeKind::Cancellation },
        TypeKind::Generic => quote! { #meta::TypeKind::Generic },
    }
}

pub fn emit_type_ref(t: &TypeRef) -> TokenStream2 {
    let meta = meta();
    let name = lit_str(&t.name);
    let kind = emit_kind(&t.kind);
    let nullable = t.nullable;
    let generic = t.generic;
    quote! {
        #meta::TypeRef::new(#name, #kind).nullable(#nullable).generic(#generic)
    }
}

fn emit_collection_format(f: &CollectionFormat) -> TokenStream2 {
    let meta = meta();
    match f {
        CollectionFormat::Csv => quote! { #meta::CollectionFormat::Csv },
        CollectionFormat::Ssv => quote! { #meta::CollectionFormat::Ssv },
        CollectionFormat::Tsv => quote! { #meta::CollectionFormat::Tsv },
        CollectionFormat::Pipes => quote! { #meta::CollectionFormat::Pipes },
        CollectionFormat::Multi => quote! { #meta::CollectionFormat::Multi },
    }
}

fn emit_serialization(s: &BodySerialization) -> TokenStream2 {
    let meta = meta();
    match s {
        BodySerialization::Default => quote! { #meta::BodySerialization::Default },
        BodySerialization::UrlEncoded => quote! { #meta::BodySerialization::UrlEncoded },
        BodySerialization::Serialized => quote! { #meta::BodySerialization::Serialized },
    }
}

fn emit_param_annotation(a: &ParameterAnnotation) -> TokenStream2 {
    let meta = meta();
    match a {
        ParameterAnnotation::Body {
            serialization,
            buffered,
        } => {
            let serialization = opt(serialization, emit_serialization);
            let buffered = opt(buffered, |b| quote! { #b });
            quote! {
                #meta::ParameterAnnotation::Body {
                    serialization: #serialization,
                    buffered: #buffered,
                }
            }
        }
        ParameterAnnotation::Query(q) => {
            let format = opt(&q.format, emit_collection_format);
            let prefix = opt(&q.prefix, |s| string(s));
            let delimiter = opt(&q.delimiter, |s| string(s));
            quote! {
                #meta::ParameterAnnotation::Query(#meta::QueryOptions {
                    format: #format,
                    prefix: #prefix,
                    delimiter: #delimiter,
                })
            }
        }
        ParameterAnnotation::Alias(s) => {
            let s = string(s);
            quote! { #meta::ParameterAnnotation::Alias(#s) }
        }
        ParameterAnnotation::Header(s) => {
            let s = string(s);
            quote! { #meta::ParameterAnnotation::Header(#s) }
        }
        ParameterAnnotation::HeaderCollection => {
            quote! { #meta::ParameterAnnotation::HeaderCollection }
        }
        ParameterAnnotation::Authorize { scheme } => {
            let scheme = string(scheme);
            quote! { #meta::ParameterAnnotation::Authorize { scheme: #scheme } }
        }
        ParameterAnnotation::Property { key } => {
            let key = opt(key, |s| string(s));
            quote! { #meta::ParameterAnnotation::Property { key: #key } }
        }
    }
}

fn emit_param(p: &ParameterRecord) -> TokenStream2 {
    let meta = meta();
    let name = lit_str(&p.name);
    let ty = emit_type_ref(&p.ty);
    let annotations = p.annotations.iter().map(emit_param_annotation);
    quote! {
        #meta::ParameterRecord::new(#name, #ty)
            #( .annotate(#annotations) )*
    }
}

fn emit_output(o: &OutputType) -> TokenStream2 {
    let meta = meta();
    match o {
        OutputType::Unit => quote! { #meta::OutputType::Unit },
        OutputType::Envelope(inner) => {
            let inner = emit_output(inner);
            quote! { #meta::OutputType::Envelope(::std::boxed::Box::new(#inner)) }
        }
        OutputType::RawResponse => quote! { #meta::OutputType::RawResponse },
        OutputType::RawContent => quote! { #meta::OutputType::RawContent },
        OutputType::Stream => quote! { #meta::OutputType::Stream },
        OutputType::Text => quote! { #meta::OutputType::Text },
        OutputType::Value(t) => {
            let t = emit_type_ref(t);
            quote! { #meta::OutputType::Value(#t) }
        }
    }
}

fn emit_return(r: &ReturnRecord) -> TokenStream2 {
    let meta = meta();
    let output = emit_output(&r.output);
    match r.wrapper {
        ReturnWrapper::Future => quote! { #meta::ReturnRecord::future(#output) },
        ReturnWrapper::Deferred => quote! { #meta::ReturnRecord::deferred(#output) },
        ReturnWrapper::Plain => quote! { #meta::ReturnRecord::plain(#output) },
    }
}

fn emit_constraint(c: &GenericConstraint) -> TokenStream2 {
    let meta = meta();
    match c {
        GenericConstraint::ReferenceType => quote! { #meta::GenericConstraint::ReferenceType },
        GenericConstraint::ValueType => quote! { #meta::GenericConstraint::ValueType },
        GenericConstraint::NotNull => quote! { #meta::GenericConstraint::NotNull },
        GenericConstraint::Unmanaged => quote! { #meta::GenericConstraint::Unmanaged },
        GenericConstraint::DefaultConstructible => {
            quote! { #meta::GenericConstraint::DefaultConstructible }
        }
        GenericConstraint::Bound(b) => {
            let b = string(b);
            quote! { #meta::GenericConstraint::Bound(#b) }
        }
    }
}

fn emit_generic(g: &GenericParamRecord) -> TokenStream2 {
    let meta = meta();
    let name = lit_str(&g.name);
    let constraints = g.constraints.iter().map(emit_constraint);
    quote! {
        #meta::GenericParamRecord::new(#name) #( .constraint(#constraints) )*
    }
}

fn emit_method_annotation(a: &MethodAnnotation) -> TokenStream2 {
    let meta = meta();
    match a {
        MethodAnnotation::Http { method, path } => {
            let method = emit_method_verb(method);
            let path = string(path);
            quote! { #meta::MethodAnnotation::Http { method: #method, path: #path } }
        }
        MethodAnnotation::Headers(lines) => {
            let lines = lines.iter().map(|l| string(l));
            quote! { #meta::MethodAnnotation::Headers(::std::vec![#(#lines),*]) }
        }
        MethodAnnotation::Multipart { boundary } => {
            let boundary = opt(boundary, |s| string(s));
            quote! { #meta::MethodAnnotation::Multipart { boundary: #boundary } }
        }
    }
}

fn emit_method(m: &MethodRecord) -> TokenStream2 {
    let meta = meta();
    let name = lit_str(&m.name);
    let generics = m.generics.iter().map(emit_generic);
    let params = m.params.iter().map(emit_param);
    let returns = emit_return(&m.returns);
    let annotations = m.annotations.iter().map(emit_method_annotation);
    quote! {
        #meta::MethodRecord::new(#name)
            #( .generic(#generics) )*
            #( .param(#params) )*
            .returns(#returns)
            #( .annotate(#annotations) )*
    }
}

pub fn emit_interface(i: &InterfaceRecord) -> TokenStream2 {
    let meta = meta();
    let name = lit_str(&i.name);
    let headers = i.headers.iter().map(|h| lit_str(h));
    let bases = i.bases.iter().map(emit_interface);
    let methods = i.methods.iter().map(emit_method);
    quote! {
        #meta::InterfaceRecord::new(#name)
            #( .header(#headers) )*
            #( .base(#bases) )*
            #( .method(#methods) )*
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn custom_verbs_are_rebuilt_from_bytes() {
        let ts = emit_method_verb(&Method::from_bytes(b"PURGE").unwrap()).to_string();
        assert!(ts.contains("from_bytes"));
        assert!(ts.contains("b\"PURGE\""));
        let ts = emit_method_verb(&Method::GET).to_string();
        assert!(ts.ends_with("Method :: GET"));
    }

    #[test]
    fn interface_constructor_mentions_every_part() {
        let i = InterfaceRecord::new("Users")
            .header("User-Agent: restwire")
            .method(
                MethodRecord::new("get")
                    .http(Method::GET, "/users/{id}")
                    .param(ParameterRecord::new("id", TypeRef::scalar("u32"))),
            );
        let ts = emit_interface(&i).to_string();
        assert!(ts.contains("\"Users\""));
        assert!(ts.contains("\"User-Agent: restwire\""));
        assert!(ts.contains("\"/users/{id}\""));
        assert!(ts.contains("TypeKind :: Scalar"));
    }
}

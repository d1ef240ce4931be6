// restwire_macros/src/parse.rs
use http::Method;
use proc_macro2::Span;
use restwire_descriptor::meta::{
    BodySerialization, CollectionFormat, MethodAnnotation, ParameterAnnotation, QueryOptions,
};
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Attribute, Block, FnArg, Ident, ItemTrait, LitBool, LitStr, Meta, Pat, Result, Signature,
    Token, TraitItem, Type,
};

fn verb(attr: &Attribute) -> Option<Method> {
    let ident = attr.path().get_ident()?.to_string();
    Some(match ident.as_str() {
        "get" => Method::GET,
        "post" => Method::POST,
        "put" => Method::PUT,
        "delete" => Method::DELETE,
        "patch" => Method::PATCH,
        "head" => Method::HEAD,
        "options" => Method::OPTIONS,
        _ => return None,
    })
}

const METHOD_ATTRS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "http", "headers", "multipart",
];

const PARAM_ATTRS: &[&str] = &[
    "body",
    "query",
    "alias",
    "header",
    "header_collection",
    "authorize",
    "property",
];

/// A `#[rest_api]` trait with every restwire attribute taken off.
pub struct ApiTrait {
    pub item: ItemTrait,
    pub headers: Vec<String>,
    pub methods: Vec<ApiFn>,
}

pub struct ApiFn {
    pub sig: Signature,
    pub default: Option<Block>,
    /// Verb and path of the endpoint, if the method declares one.
    pub http: Option<(Method, String)>,
    pub annotations: Vec<MethodAnnotation>,
    pub params: Vec<ApiParam>,
    pub span: Span,
}

pub struct ApiParam {
    pub ident: Ident,
    pub ty: Type,
    pub annotations: Vec<ParameterAnnotation>,
}

pub fn parse_trait(mut item: ItemTrait) -> Result<ApiTrait> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new(
            item.generics.span(),
            "#[rest_api] traits cannot be generic; put type parameters on the methods",
        ));
    }
    if !item.supertraits.is_empty() {
        return Err(syn::Error::new(
            item.supertraits.span(),
            "#[rest_api] traits cannot declare supertraits",
        ));
    }

    let headers = take_headers(&mut item.attrs)?;

    let mut methods = Vec::new();
    for ti in item.items.iter_mut() {
        let TraitItem::Fn(f) = ti else {
            return Err(syn::Error::new(
                ti.span(),
                "#[rest_api] traits may only contain methods",
            ));
        };
        let span = f.sig.ident.span();
        let (http, annotations) = take_method_attrs(&mut f.attrs)?;
        let params = take_params(&mut f.sig)?;
        methods.push(ApiFn {
            sig: f.sig.clone(),
            default: f.default.clone(),
            http,
            annotations,
            params,
            span,
        });
    }

    Ok(ApiTrait {
        item,
        headers,
        methods,
    })
}

fn is_one_of(attr: &Attribute, names: &[&str]) -> bool {
    names.iter().any(|n| attr.path().is_ident(n))
}

/// Split `attrs` into ours (returned) and foreign ones (left in place).
fn drain_attrs(attrs: &mut Vec<Attribute>, names: &[&str]) -> Vec<Attribute> {
    let (ours, rest): (Vec<_>, Vec<_>) = attrs.drain(..).partition(|a| is_one_of(a, names));
    *attrs = rest;
    ours
}

fn header_lines(attr: &Attribute) -> Result<Vec<String>> {
    let lines = attr.parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?;
    Ok(lines.into_iter().map(|l| l.value()).collect())
}

fn take_headers(attrs: &mut Vec<Attribute>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for attr in drain_attrs(attrs, &["headers"]) {
        out.extend(header_lines(&attr)?);
    }
    Ok(out)
}

fn take_method_attrs(
    attrs: &mut Vec<Attribute>,
) -> Result<(Option<(Method, String)>, Vec<MethodAnnotation>)> {
    let mut http: Option<(Method, String)> = None;
    let mut annotations = Vec::new();

    for attr in drain_attrs(attrs, METHOD_ATTRS) {
        let path = attr.path();
        let found = if let Some(m) = verb(&attr) {
            let p: LitStr = attr.parse_args()?;
            Some((m, p.value()))
        } else if path.is_ident("http") {
            let (verb, p) = attr.parse_args_with(|input: syn::parse::ParseStream<'_>| {
                let verb: LitStr = input.parse()?;
                input.parse::<Token![,]>()?;
                let p: LitStr = input.parse()?;
                Ok((verb, p))
            })?;
            let m = Method::from_bytes(verb.value().as_bytes())
                .map_err(|_| syn::Error::new(verb.span(), "invalid HTTP method"))?;
            Some((m, p.value()))
        } else if path.is_ident("headers") {
            annotations.push(MethodAnnotation::Headers(header_lines(&attr)?));
            None
        } else {
            let mut boundary = None;
            if let Meta::List(_) = &attr.meta {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("boundary") {
                        boundary = Some(meta.value()?.parse::<LitStr>()?.value());
                        Ok(())
                    } else {
                        Err(meta.error("expected `boundary = \"...\"`"))
                    }
                })?;
            }
            annotations.push(MethodAnnotation::Multipart { boundary });
            None
        };

        if let Some(v) = found {
            if http.is_some() {
                return Err(syn::Error::new(
                    attr.span(),
                    "duplicate HTTP verb attribute",
                ));
            }
            http = Some(v);
        }
    }

    Ok((http, annotations))
}

fn take_params(sig: &mut Signature) -> Result<Vec<ApiParam>> {
    let mut out = Vec::new();
    let mut receiver = false;
    for arg in sig.inputs.iter_mut() {
        match arg {
            FnArg::Receiver(r) => {
                if r.reference.is_none() || r.mutability.is_some() {
                    return Err(syn::Error::new(r.span(), "endpoint methods take `&self`"));
                }
                receiver = true;
            }
            FnArg::Typed(pt) => {
                let Pat::Ident(pi) = &*pt.pat else {
                    return Err(syn::Error::new(
                        pt.pat.span(),
                        "endpoint parameters must be plain identifiers",
                    ));
                };
                let ident = pi.ident.clone();
                let mut annotations = Vec::new();
                for attr in drain_attrs(&mut pt.attrs, PARAM_ATTRS) {
                    annotations.push(param_annotation(&attr)?);
                }
                out.push(ApiParam {
                    ident,
                    ty: (*pt.ty).clone(),
                    annotations,
                });
            }
        }
    }
    if !receiver {
        return Err(syn::Error::new(sig.span(), "endpoint methods take `&self`"));
    }
    Ok(out)
}

fn opt_lit(attr: &Attribute) -> Result<Option<String>> {
    match &attr.meta {
        Meta::Path(_) => Ok(None),
        _ => Ok(Some(attr.parse_args::<LitStr>()?.value())),
    }
}

fn required_lit(attr: &Attribute) -> Result<String> {
    Ok(attr.parse_args::<LitStr>()?.value())
}

fn param_annotation(attr: &Attribute) -> Result<ParameterAnnotation> {
    let path = attr.path();
    if path.is_ident("body") {
        let mut serialization = None;
        let mut buffered = None;
        if let Meta::List(_) = &attr.meta {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("url_encoded") || meta.path.is_ident("urlencoded") {
                    serialization = Some(BodySerialization::UrlEncoded);
                } else if meta.path.is_ident("serialized") {
                    serialization = Some(BodySerialization::Serialized);
                } else if meta.path.is_ident("default") {
                    serialization = Some(BodySerialization::Default);
                } else if meta.path.is_ident("buffered") {
                    buffered = Some(if meta.input.peek(Token![=]) {
                        meta.value()?.parse::<LitBool>()?.value
                    } else {
                        true
                    });
                } else {
                    return Err(meta.error(
                        "expected `url_encoded`, `serialized`, `default` or `buffered`",
                    ));
                }
                Ok(())
            })?;
        }
        return Ok(ParameterAnnotation::Body {
            serialization,
            buffered,
        });
    }
    if path.is_ident("query") {
        let mut opts = QueryOptions::default();
        if let Meta::List(_) = &attr.meta {
            attr.parse_nested_meta(|meta| {
                let v: LitStr = meta.value()?.parse()?;
                if meta.path.is_ident("format") {
                    opts.format = Some(collection_format(&v)?);
                } else if meta.path.is_ident("prefix") {
                    opts.prefix = Some(v.value());
                } else if meta.path.is_ident("delimiter") {
                    opts.delimiter = Some(v.value());
                } else {
                    return Err(meta.error("expected `format`, `prefix` or `delimiter`"));
                }
                Ok(())
            })?;
        }
        return Ok(ParameterAnnotation::Query(opts));
    }
    if path.is_ident("alias") {
        return Ok(ParameterAnnotation::Alias(required_lit(attr)?));
    }
    if path.is_ident("header") {
        return Ok(ParameterAnnotation::Header(required_lit(attr)?));
    }
    if path.is_ident("header_collection") {
        return Ok(ParameterAnnotation::HeaderCollection);
    }
    if path.is_ident("authorize") {
        let scheme = opt_lit(attr)?.unwrap_or_else(|| "Bearer".to_string());
        return Ok(ParameterAnnotation::Authorize { scheme });
    }
    Ok(ParameterAnnotation::Property {
        key: opt_lit(attr)?,
    })
}

fn collection_format(v: &LitStr) -> Result<CollectionFormat> {
    Ok(match v.value().to_ascii_lowercase().as_str() {
        "csv" => CollectionFormat::Csv,
        "ssv" => CollectionFormat::Ssv,
        "tsv" => CollectionFormat::Tsv,
        "pipes" => CollectionFormat::Pipes,
        "multi" => CollectionFormat::Multi,
        _ => {
            return Err(syn::Error::new(
                v.span(),
                "collection format must be one of csv, ssv, tsv, pipes, multi",
            ));
        }
    })
}

/// `#[rest_api]` takes no arguments.
pub fn no_args(args: proc_macro2::TokenStream) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }
    let parser = Punctuated::<Meta, Token![,]>::parse_terminated;
    let parsed = parser.parse2(args)?;
    Err(syn::Error::new(
        parsed.span(),
        "#[rest_api] does not take arguments; use #[headers(...)] on the trait",
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_attributes_and_collects_annotations() {
        let item: ItemTrait = syn::parse_quote! {
            #[headers("User-Agent: restwire")]
            pub trait Users {
                #[get("/users/{id}")]
                #[headers("Accept: application/json")]
                async fn get(&self, id: u32, #[query(format = "csv", prefix = "f")] tags: Vec<String>) -> Result<String, ApiError>;

                #[multipart(boundary = "b")]
                #[http("PURGE", "/cache")]
                async fn purge(&self, #[alias("file")] data: Bytes) -> Result<(), ApiError>;

                fn helper(&self) -> u8 { 1 }
            }
        };
        let api = parse_trait(item).unwrap();
        assert_eq!(api.headers, vec!["User-Agent: restwire".to_string()]);
        assert!(api.item.attrs.is_empty());

        let get = &api.methods[0];
        assert_eq!(get.http, Some((Method::GET, "/users/{id}".to_string())));
        assert_eq!(
            get.annotations,
            vec![MethodAnnotation::Headers(vec!["Accept: application/json".into()])]
        );
        assert_eq!(
            get.params[1].annotations,
            vec![ParameterAnnotation::Query(QueryOptions {
                format: Some(CollectionFormat::Csv),
                prefix: Some("f".into()),
                delimiter: None,
            })]
        );

        let purge = &api.methods[1];
        assert_eq!(purge.http.as_ref().map(|(m, _)| m.as_str()), Some("PURGE"));
        assert_eq!(
            purge.annotations,
            vec![MethodAnnotation::Multipart {
                boundary: Some("b".into())
            }]
        );
        assert_eq!(
            purge.params[0].annotations,
            vec![ParameterAnnotation::Alias("file".into())]
        );

        assert!(api.methods[2].http.is_none());
        assert!(api.methods[2].default.is_some());

        let TraitItem::Fn(f) = &api.item.items[0] else {
            panic!("expected a method");
        };
        assert!(f.attrs.is_empty());
        let FnArg::Typed(pt) = &f.sig.inputs[2] else {
            panic!("expected a typed argument");
        };
        assert!(pt.attrs.is_empty());
    }

    #[test]
    fn body_and_authorize_defaults() {
        let attr: Attribute = syn::parse_quote!(#[body(url_encoded, buffered = false)]);
        assert_eq!(
            param_annotation(&attr).unwrap(),
            ParameterAnnotation::Body {
                serialization: Some(BodySerialization::UrlEncoded),
                buffered: Some(false),
            }
        );
        let attr: Attribute = syn::parse_quote!(#[authorize]);
        assert_eq!(
            param_annotation(&attr).unwrap(),
            ParameterAnnotation::Authorize {
                scheme: "Bearer".into()
            }
        );
    }

    #[test]
    fn rejects_duplicate_verbs() {
        let item: ItemTrait = syn::parse_quote! {
            trait T {
                #[get("/a")]
                #[post("/b")]
                async fn a(&self) -> Result<(), ApiError>;
            }
        };
        assert!(parse_trait(item).is_err());
    }
}

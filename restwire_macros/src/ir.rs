// restwire_macros/src/ir.rs
use crate::parse::{ApiFn, ApiTrait};
use proc_macro2::{Span, TokenStream as TokenStream2, TokenTree};
use quote::ToTokens;
use restwire_descriptor::descriptor::{build_descriptor, method_key};
use restwire_descriptor::key::MethodKey;
use restwire_descriptor::meta::{
    GenericConstraint, GenericParamRecord, InterfaceRecord, MethodRecord, OutputType,
    ParameterRecord, ReturnRecord, ReturnWrapper, TypeKind, TypeRef,
};
use syn::{
    GenericArgument, GenericParam, ItemTrait, PathArguments, ReturnType, Signature, Type,
    TypeParamBound, WherePredicate,
};

pub struct Ir {
    pub item: ItemTrait,
    pub record: InterfaceRecord,
    pub methods: Vec<IrMethod>,
}

pub struct IrMethod {
    pub sig: Signature,
    pub key: MethodKey,
    pub generic_idents: Vec<syn::Ident>,
    pub params: Vec<IrParam>,
    pub body: IrBody,
    pub span: Span,
}

pub struct IrParam {
    pub ident: syn::Ident,
    pub name: String,
    pub kind: TypeKind,
    pub nullable: bool,
    /// The (unwrapped) type is a reference.
    pub by_ref: bool,
}

/// What the generated client does for one trait method.
pub enum IrBody {
    /// Dispatch through the runtime.
    Endpoint(IrCall),
    /// No verb and a default body in the trait: leave it alone.
    Default,
    /// No verb and no default body: fail with `NotAnEndpoint`.
    NotAnEndpoint(IrWrapper),
    /// Resolution failed; the error is reported on the method.
    Invalid(syn::Error, IrWrapper),
}

#[derive(Clone)]
pub struct IrCall {
    pub wrapper: IrWrapper,
    pub envelope: bool,
    pub decoder: Decoder,
}

#[derive(Clone)]
pub enum IrWrapper {
    /// `async fn -> R`
    Async(Type),
    /// `fn -> impl Future<Output = R>`
    ImplFuture(Type),
    Deferred,
    Other,
}

#[derive(Clone)]
pub enum Decoder {
    Unit,
    Text,
    RawResponse,
    RawContent,
    Stream,
    Deserialize(Type),
}

pub fn lower(api: ApiTrait) -> syn::Result<Ir> {
    let iface_name = api.item.ident.to_string();
    let mut record = InterfaceRecord::new(iface_name.clone());
    for h in &api.headers {
        record = record.header(h.clone());
    }

    let mut lowered = Vec::new();
    for m in &api.methods {
        let (method, ir) = lower_method(&iface_name, m);
        record = record.method(method);
        lowered.push(ir);
    }

    // Resolve against the full interface so header scopes merge as at runtime.
    for (ir, method) in lowered.iter_mut().zip(record.methods.iter()) {
        let failure = match &ir.body {
            IrBody::Endpoint(call) => build_descriptor(&record, &record, method)
                .err()
                .map(|e| (e, call.wrapper.clone())),
            _ => None,
        };
        if let Some((e, wrapper)) = failure {
            let msg = format!("RW0003 {}::{}: {e}", record.name, method.name);
            ir.body = IrBody::Invalid(syn::Error::new(ir.span, msg), wrapper);
        }
    }

    Ok(Ir {
        item: api.item,
        record,
        methods: lowered,
    })
}

fn lower_method(iface: &str, m: &ApiFn) -> (MethodRecord, IrMethod) {
    let mut record = MethodRecord::new(m.sig.ident.to_string());

    let generic_idents: Vec<syn::Ident> = m
        .sig
        .generics
        .params
        .iter()
        .filter_map(|g| match g {
            GenericParam::Type(t) => Some(t.ident.clone()),
            _ => None,
        })
        .collect();
    let generic_names: Vec<String> = generic_idents.iter().map(|i| i.to_string()).collect();
    for g in &generic_idents {
        let mut gp = GenericParamRecord::new(g.to_string());
        for c in constraints(&m.sig, g) {
            gp = gp.constraint(c);
        }
        record = record.generic(gp);
    }

    let mut params = Vec::new();
    for p in &m.params {
        let ty = type_ref(&p.ty, &generic_names);
        let (by_ref, _) = unwrap_option(&p.ty);
        params.push(IrParam {
            ident: p.ident.clone(),
            name: p.ident.to_string(),
            kind: ty.kind.clone(),
            nullable: ty.nullable,
            by_ref: matches!(strip_group(by_ref), Type::Reference(_)),
        });
        let mut pr = ParameterRecord::new(p.ident.to_string(), ty);
        for a in &p.annotations {
            pr = pr.annotate(a.clone());
        }
        record = record.param(pr);
    }

    let (returns, wrapper, decoder) = lower_return(&m.sig, &generic_names);
    record = record.returns(returns.clone());

    if let Some((verb, path)) = &m.http {
        record = record.http(verb.clone(), path.clone());
    }
    for a in &m.annotations {
        record = record.annotate(a.clone());
    }

    let body = if m.http.is_some() {
        match (&wrapper, decoder) {
            (IrWrapper::Other, _) | (_, None) => IrBody::Invalid(
                syn::Error::new(
                    m.span,
                    format!(
                        "RW0003 {iface}::{}: unsupported return shape; expected `async fn -> Result<T, E>`, `fn -> impl Future<Output = Result<T, E>>` or `fn -> Deferred<T>`",
                        m.sig.ident
                    ),
                ),
                wrapper.clone(),
            ),
            (_, Some((envelope, decoder))) => IrBody::Endpoint(IrCall {
                wrapper: wrapper.clone(),
                envelope,
                decoder,
            }),
        }
    } else if m.default.is_some() {
        IrBody::Default
    } else {
        IrBody::NotAnEndpoint(wrapper.clone())
    };

    let key = method_key(iface, &record);
    (
        record,
        IrMethod {
            sig: m.sig.clone(),
            key,
            generic_idents,
            params,
            body,
            span: m.span,
        },
    )
}

fn strip_group(ty: &Type) -> &Type {
    match ty {
        Type::Group(g) => strip_group(&g.elem),
        Type::Paren(p) => strip_group(&p.elem),
        _ => ty,
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match strip_group(ty) {
        Type::Path(p) if p.qself.is_none() => p.path.segments.last(),
        _ => None,
    }
}

fn type_args(seg: &syn::PathSegment) -> Vec<&Type> {
    match &seg.arguments {
        PathArguments::AngleBracketed(a) => a
            .args
            .iter()
            .filter_map(|g| match g {
                GenericArgument::Type(t) => Some(t),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `Option<T>` peeled once: `(T, true)`; anything else `(ty, false)`.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Some(seg) = last_segment(ty)
        && seg.ident == "Option"
        && let [inner] = type_args(seg).as_slice()
    {
        return (*inner, true);
    }
    (ty, false)
}

/// Canonical display name of a type: tokens joined without spaces except
/// between words.
pub fn type_name(ty: &Type) -> String {
    let mut out = String::new();
    let mut prev_word = false;
    for tt in ty.to_token_stream() {
        push_tokens(&mut out, tt, &mut prev_word);
    }
    out
}

fn push_tokens(out: &mut String, tt: TokenTree, prev_word: &mut bool) {
    match tt {
        TokenTree::Group(g) => {
            let (open, close) = match g.delimiter() {
                proc_macro2::Delimiter::Parenthesis => ("(", ")"),
                proc_macro2::Delimiter::Bracket => ("[", "]"),
                proc_macro2::Delimiter::Brace => ("{", "}"),
                proc_macro2::Delimiter::None => ("", ""),
            };
            out.push_str(open);
            *prev_word = false;
            for inner in g.stream() {
                push_tokens(out, inner, prev_word);
            }
            out.push_str(close);
            *prev_word = false;
        }
        TokenTree::Ident(i) => {
            if *prev_word {
                out.push(' ');
            }
            out.push_str(&i.to_string());
            *prev_word = true;
        }
        TokenTree::Punct(p) => {
            out.push(p.as_char());
            // `'a` is a single word
            *prev_word = false;
            if p.as_char() == ',' {
                out.push(' ');
            }
        }
        TokenTree::Literal(l) => {
            if *prev_word {
                out.push(' ');
            }
            out.push_str(&l.to_string());
            *prev_word = true;
        }
    }
}

fn mentions(ty: &Type, generics: &[String]) -> bool {
    fn walk(ts: TokenStream2, generics: &[String]) -> bool {
        ts.into_iter().any(|tt| match tt {
            TokenTree::Ident(i) => generics.iter().any(|g| i == g),
            TokenTree::Group(g) => walk(g.stream(), generics),
            _ => false,
        })
    }
    !generics.is_empty() && walk(ty.to_token_stream(), generics)
}

const SCALARS: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "f32", "f64", "NonZeroU32", "NonZeroU64", "NonZeroUsize",
];

fn is_stringish(ty: &Type) -> bool {
    matches!(kind_of(ty, &[]), TypeKind::String)
}

fn kind_of(ty: &Type, generics: &[String]) -> TypeKind {
    match strip_group(ty) {
        Type::Reference(r) => kind_of(&r.elem, generics),
        Type::Slice(s) => {
            if last_segment(&s.elem).is_some_and(|seg| seg.ident == "u8") {
                TypeKind::Bytes
            } else {
                TypeKind::Sequence
            }
        }
        Type::Array(a) => {
            if last_segment(&a.elem).is_some_and(|seg| seg.ident == "u8") {
                TypeKind::Bytes
            } else {
                TypeKind::Sequence
            }
        }
        Type::Tuple(_) => TypeKind::Sequence,
        Type::Path(p) => {
            let Some(seg) = p.path.segments.last() else {
                return TypeKind::Structured;
            };
            let name = seg.ident.to_string();
            let args = type_args(seg);
            if p.path.segments.len() == 1 && generics.contains(&name) {
                return TypeKind::Generic;
            }
            match name.as_str() {
                "str" | "String" | "Cow" => TypeKind::String,
                n if SCALARS.contains(&n) => TypeKind::Scalar,
                "Bytes" | "BytesMut" => TypeKind::Bytes,
                "BodyStream" => TypeKind::Stream,
                "CancellationToken" => TypeKind::Cancellation,
                "Option" | "Box" | "Arc" | "Rc" => match args.as_slice() {
                    [inner] => kind_of(inner, generics),
                    _ => TypeKind::Structured,
                },
                "Vec" => match args.as_slice() {
                    [inner] if last_segment(inner).is_some_and(|s| s.ident == "u8") => {
                        TypeKind::Bytes
                    }
                    _ => TypeKind::Sequence,
                },
                "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" => TypeKind::Sequence,
                "HashMap" | "BTreeMap" | "IndexMap" => TypeKind::Map {
                    string_values: args.len() >= 2 && args[..2].iter().all(|t| is_stringish(t)),
                },
                _ => TypeKind::Structured,
            }
        }
        _ => TypeKind::Structured,
    }
}

pub fn type_ref(ty: &Type, generics: &[String]) -> TypeRef {
    let (_, nullable) = unwrap_option(ty);
    TypeRef::new(type_name(ty), kind_of(ty, generics))
        .nullable(nullable)
        .generic(mentions(ty, generics))
}

fn bound_constraint(b: &TypeParamBound) -> Option<GenericConstraint> {
    let TypeParamBound::Trait(t) = b else {
        return None;
    };
    let last = t.path.segments.last()?;
    Some(match last.ident.to_string().as_str() {
        "Default" => GenericConstraint::DefaultConstructible,
        "Copy" => GenericConstraint::ValueType,
        "Sized" => return None,
        _ => GenericConstraint::Bound(
            t.path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::"),
        ),
    })
}

fn constraints(sig: &Signature, ident: &syn::Ident) -> Vec<GenericConstraint> {
    let mut out = Vec::new();
    for g in &sig.generics.params {
        if let GenericParam::Type(t) = g
            && t.ident == *ident
        {
            out.extend(t.bounds.iter().filter_map(bound_constraint));
        }
    }
    if let Some(w) = &sig.generics.where_clause {
        for pred in &w.predicates {
            if let WherePredicate::Type(pt) = pred
                && let Type::Path(p) = &pt.bounded_ty
                && p.path.is_ident(ident)
            {
                out.extend(pt.bounds.iter().filter_map(bound_constraint));
            }
        }
    }
    out
}

/// `Result<T, E>` -> `T`.
fn result_ok(ty: &Type) -> Option<&Type> {
    let seg = last_segment(ty)?;
    if seg.ident != "Result" {
        return None;
    }
    type_args(seg).first().copied()
}

fn future_output(ty: &Type) -> Option<&Type> {
    let Type::ImplTrait(it) = strip_group(ty) else {
        return None;
    };
    it.bounds.iter().find_map(|b| {
        let TypeParamBound::Trait(t) = b else {
            return None;
        };
        let seg = t.path.segments.last()?;
        if seg.ident != "Future" {
            return None;
        }
        let PathArguments::AngleBracketed(a) = &seg.arguments else {
            return None;
        };
        a.args.iter().find_map(|g| match g {
            GenericArgument::AssocType(at) if at.ident == "Output" => Some(&at.ty),
            _ => None,
        })
    })
}

fn output_type(ty: &Type, generics: &[String]) -> OutputType {
    if let Type::Tuple(t) = strip_group(ty)
        && t.elems.is_empty()
    {
        return OutputType::Unit;
    }
    if let Some(seg) = last_segment(ty) {
        match seg.ident.to_string().as_str() {
            "ApiResponse" => {
                if let [inner] = type_args(seg).as_slice() {
                    return OutputType::Envelope(Box::new(output_type(inner, generics)));
                }
            }
            "RawResponse" => return OutputType::RawResponse,
            "RawContent" => return OutputType::RawContent,
            "ResponseStream" => return OutputType::Stream,
            "String" => return OutputType::Text,
            _ => {}
        }
    }
    OutputType::Value(type_ref(ty, generics))
}

/// The Rust type handed to `AsDeserialized`, looking through `ApiResponse`.
fn value_type(ty: &Type) -> &Type {
    if let Some(seg) = last_segment(ty)
        && seg.ident == "ApiResponse"
        && let [inner] = type_args(seg).as_slice()
    {
        return *inner;
    }
    ty
}

fn decoder(output: &OutputType, ty: &Type) -> Option<(bool, Decoder)> {
    let (envelope, inner) = match output {
        OutputType::Envelope(inner) => (true, inner.as_ref()),
        other => (false, other),
    };
    let d = match inner {
        OutputType::Unit => Decoder::Unit,
        OutputType::Text => Decoder::Text,
        OutputType::RawResponse => Decoder::RawResponse,
        OutputType::RawContent => Decoder::RawContent,
        OutputType::Stream => Decoder::Stream,
        OutputType::Value(_) => Decoder::Deserialize(value_type(ty).clone()),
        OutputType::Envelope(_) => return None,
    };
    Some((envelope, d))
}

fn lower_return(
    sig: &Signature,
    generics: &[String],
) -> (ReturnRecord, IrWrapper, Option<(bool, Decoder)>) {
    let ret: Type = match &sig.output {
        ReturnType::Default => syn::parse_quote!(()),
        ReturnType::Type(_, t) => (**t).clone(),
    };

    let (wrapper, inner) = if sig.asyncness.is_some() {
        (ReturnWrapper::Future, IrWrapper::Async(ret.clone()))
    } else if let Some(out) = future_output(&ret) {
        (ReturnWrapper::Future, IrWrapper::ImplFuture(out.clone()))
    } else if last_segment(&ret).is_some_and(|s| s.ident == "Deferred") {
        (ReturnWrapper::Deferred, IrWrapper::Deferred)
    } else {
        (ReturnWrapper::Plain, IrWrapper::Other)
    };

    let value: Option<&Type> = match &inner {
        IrWrapper::Async(t) | IrWrapper::ImplFuture(t) => result_ok(t),
        IrWrapper::Deferred => last_segment(&ret).and_then(|s| type_args(s).first().copied()),
        IrWrapper::Other => None,
    };

    match value {
        Some(v) => {
            let output = output_type(v, generics);
            let d = decoder(&output, v);
            let record = match wrapper {
                ReturnWrapper::Future => ReturnRecord::future(output),
                ReturnWrapper::Deferred => ReturnRecord::deferred(output),
                ReturnWrapper::Plain => ReturnRecord::plain(output),
            };
            (record, inner, d)
        }
        None => (
            ReturnRecord::plain(OutputType::Value(type_ref(&ret, generics))),
            match inner {
                IrWrapper::Deferred => IrWrapper::Other,
                w => w,
            },
            None,
        ),
    }
}

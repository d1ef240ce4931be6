// restwire_macros/src/codegen.rs
use crate::emit_helpers::{emit_interface, lit_str};
use crate::ir::{Decoder, Ir, IrBody, IrCall, IrMethod, IrParam, IrWrapper};
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, quote_spanned};
use restwire_descriptor::meta::TypeKind;

pub fn emit(ir: Ir) -> TokenStream2 {
    let Ir {
        item,
        record,
        methods,
    } = ir;
    let vis = &item.vis;
    let trait_ident = &item.ident;
    let client = format_ident!("{}Client", trait_ident);
    let interface = emit_interface(&record);
    let doc = format!("HTTP client for [`{trait_ident}`], generated by `#[rest_api]`.");
    // Kept out of the user's namespace so trait methods may declare their own `T`.
    let tp = format_ident!("__RestwireTransport");

    let mut errors = Vec::new();
    let mut impls = Vec::new();
    for m in &methods {
        if let IrBody::Invalid(e, _) = &m.body {
            errors.push(e.to_compile_error());
        }
        if let Some(ts) = emit_impl_method(trait_ident, m, &mut errors) {
            impls.push(ts);
        }
    }

    quote! {
        #[allow(async_fn_in_trait)]
        #item

        #[doc = #doc]
        #vis struct #client<#tp: ::restwire_core::prelude::Transport> {
            client: ::restwire_core::prelude::RestClient<#tp>,
        }

        impl<#tp: ::restwire_core::prelude::Transport> ::core::clone::Clone for #client<#tp> {
            fn clone(&self) -> Self {
                Self {
                    client: ::core::clone::Clone::clone(&self.client),
                }
            }
        }

        impl<#tp: ::restwire_core::prelude::Transport> #client<#tp> {
            /// Metadata records of the interface this client implements.
            pub fn interface() -> ::restwire_core::internal::InterfaceRecord {
                #interface
            }

            pub fn descriptors() -> ::restwire_core::internal::DescriptorTable {
                ::restwire_core::internal::DescriptorTable::build(
                    &Self::interface(),
                    &mut ::restwire_core::internal::IgnoreDiagnostics,
                )
            }

            pub fn new(transport: #tp, base_url: ::restwire_core::Url) -> Self {
                Self::from_parts(
                    transport,
                    base_url,
                    ::core::default::Default::default(),
                    ::std::sync::Arc::new(Self::descriptors()),
                )
            }

            pub fn from_parts(
                transport: #tp,
                base_url: ::restwire_core::Url,
                settings: ::restwire_core::prelude::Settings,
                table: ::std::sync::Arc<::restwire_core::internal::DescriptorTable>,
            ) -> Self {
                Self {
                    client: ::restwire_core::prelude::RestClient::from_parts(
                        transport, base_url, settings, table,
                    ),
                }
            }

            #[inline]
            pub fn with_settings(mut self, settings: ::restwire_core::prelude::Settings) -> Self {
                self.client = self.client.with_settings(settings);
                self
            }

            #[inline]
            pub fn with_debug_level(mut self, level: ::restwire_core::prelude::DebugLevel) -> Self {
                self.client = self.client.with_debug_level(level);
                self
            }

            /// The runtime client behind the generated methods.
            #[inline]
            pub fn rest(&self) -> &::restwire_core::prelude::RestClient<#tp> {
                &self.client
            }
        }

        impl<#tp: ::restwire_core::prelude::Transport> #trait_ident for #client<#tp> {
            #(#impls)*
        }

        #(#errors)*
    }
}

fn not_an_endpoint(trait_ident: &syn::Ident, m: &IrMethod) -> TokenStream2 {
    let name = lit_str(&format!("{}::{}", trait_ident, m.sig.ident));
    quote! {
        ::restwire_core::prelude::ApiError::NotAnEndpoint(::std::string::String::from(#name))
    }
}

/// A body that fails every call with `err`.
fn failing_body(
    w: &IrWrapper,
    err: TokenStream2,
    m: &IrMethod,
    errors: &mut Vec<TokenStream2>,
) -> TokenStream2 {
    match w {
        IrWrapper::Async(r) => quote! {{
            let __r: #r = ::core::result::Result::Err(::core::convert::From::from(#err));
            __r
        }},
        IrWrapper::ImplFuture(r) => quote! {{
            async move {
                let __r: #r = ::core::result::Result::Err(::core::convert::From::from(#err));
                __r
            }
        }},
        IrWrapper::Deferred => quote! {{
            ::restwire_core::prelude::Deferred::failing(|| #err)
        }},
        IrWrapper::Other => {
            errors.push(
                syn::Error::new(
                    m.span,
                    "method has no HTTP verb, no default body and a return type that cannot carry ApiError",
                )
                .to_compile_error(),
            );
            quote! {{ ::core::unreachable!() }}
        }
    }
}

fn emit_impl_method(
    trait_ident: &syn::Ident,
    m: &IrMethod,
    errors: &mut Vec<TokenStream2>,
) -> Option<TokenStream2> {
    let sig = &m.sig;
    let body = match &m.body {
        IrBody::Default => return None,
        IrBody::Endpoint(call) => endpoint_body(m, call),
        IrBody::NotAnEndpoint(w) => {
            let err = not_an_endpoint(trait_ident, m);
            failing_body(w, err, m, errors)
        }
        IrBody::Invalid(_, w) => {
            let err = not_an_endpoint(trait_ident, m);
            let mut ignored = Vec::new();
            failing_body(w, err, m, &mut ignored)
        }
    };
    let allow = match &m.body {
        IrBody::Endpoint(_) => quote! {},
        _ => quote! { #[allow(unused_variables)] },
    };
    Some(quote! {
        #allow
        #sig #body
    })
}

fn decoder_type(d: &Decoder) -> TokenStream2 {
    match d {
        Decoder::Unit => quote! { ::restwire_core::internal::AsUnit },
        Decoder::Text => quote! { ::restwire_core::internal::AsText },
        Decoder::RawResponse => quote! { ::restwire_core::internal::AsRawResponse },
        Decoder::RawContent => quote! { ::restwire_core::internal::AsRawContent },
        Decoder::Stream => quote! { ::restwire_core::internal::AsStream },
        Decoder::Deserialize(t) => quote! { ::restwire_core::internal::AsDeserialized<#t> },
    }
}

fn null_arg() -> TokenStream2 {
    quote! {
        __args.push(::restwire_core::internal::Arg::Value(::restwire_core::internal::Value::Null))
    }
}

/// `Args` expression appending one parameter to `__args`.
fn push_arg(p: &IrParam) -> TokenStream2 {
    let id = &p.ident;
    let span = id.span();
    match (&p.kind, p.nullable) {
        (TypeKind::Cancellation, false) => {
            if p.by_ref {
                quote_spanned! {span=> __args.cancellation(::core::clone::Clone::clone(#id)) }
            } else {
                quote_spanned! {span=> __args.cancellation(#id) }
            }
        }
        (TypeKind::Cancellation, true) => {
            let take = if p.by_ref {
                quote! { ::core::clone::Clone::clone(__t) }
            } else {
                quote! { __t }
            };
            quote_spanned! {span=>
                match #id {
                    ::core::option::Option::Some(__t) => __args.cancellation(#take),
                    ::core::option::Option::None => {
                        __args.cancellation(::restwire_core::internal::CancellationToken::new())
                    }
                }
            }
        }
        (TypeKind::Bytes, nullable) => {
            let conv = |v: TokenStream2| {
                if p.by_ref {
                    quote! { ::restwire_core::internal::Bytes::copy_from_slice(&#v[..]) }
                } else {
                    v
                }
            };
            if nullable {
                let b = conv(quote! { __b });
                let null = null_arg();
                quote_spanned! {span=>
                    match #id {
                        ::core::option::Option::Some(__b) => __args.bytes(#b),
                        ::core::option::Option::None => #null,
                    }
                }
            } else {
                let b = conv(quote! { #id });
                quote_spanned! {span=> __args.bytes(#b) }
            }
        }
        (TypeKind::Stream, true) => {
            let null = null_arg();
            quote_spanned! {span=>
                match #id {
                    ::core::option::Option::Some(__s) => __args.stream(__s),
                    ::core::option::Option::None => #null,
                }
            }
        }
        (TypeKind::Stream, false) => quote_spanned! {span=> __args.stream(#id) },
        _ => {
            let name = lit_str(&p.name);
            quote_spanned! {span=> __args.value(#name, &#id)? }
        }
    }
}

fn endpoint_body(m: &IrMethod, call: &IrCall) -> TokenStream2 {
    let key = &m.key;
    let iface = lit_str(&key.interface);
    let name = lit_str(&key.name);
    let types = key.parameter_types.iter().map(|t| lit_str(t));
    let n_types = key.parameter_types.len();
    let arity = key.generic_arity;
    let generics = &m.generic_idents;
    let n_generics = generics.len();
    let pushes = m.params.iter().map(push_arg);

    let prologue = quote! {
        let __types: [&str; #n_types] = [#(#types),*];
        let __generic_args: [&str; #n_generics] = [#(::core::any::type_name::<#generics>()),*];
        let __key = ::restwire_core::internal::ProcedureKey::new(
            ::restwire_core::internal::MethodKey::new(#iface, #name, __types, #arity),
        )
        .with_generic_args(__generic_args);
        let __args = (|| -> ::core::result::Result<
            ::restwire_core::internal::Args,
            ::restwire_core::prelude::ArgumentError,
        > {
            let __args = ::restwire_core::internal::Args::new();
            #( let __args = #pushes; )*
            ::core::result::Result::Ok(__args)
        })();
    };

    let decoder = decoder_type(&call.decoder);
    let future_call = if call.envelope {
        quote! { self.client.invoke_envelope::<#decoder>(&__key, __args).await }
    } else {
        quote! { self.client.invoke::<#decoder>(&__key, __args).await }
    };
    let dispatch_future = |r: &syn::Type| {
        quote! {
            let __r: #r = match __args {
                ::core::result::Result::Ok(__args) => {
                    #future_call.map_err(::core::convert::Into::into)
                }
                ::core::result::Result::Err(__e) => ::core::result::Result::Err(
                    ::core::convert::From::from(::restwire_core::prelude::ApiError::from(__e)),
                ),
            };
            __r
        }
    };

    match &call.wrapper {
        IrWrapper::Async(r) => {
            let dispatch = dispatch_future(r);
            quote! {{
                #prologue
                #dispatch
            }}
        }
        IrWrapper::ImplFuture(r) => {
            let dispatch = dispatch_future(r);
            quote! {{
                async move {
                    #prologue
                    #dispatch
                }
            }}
        }
        IrWrapper::Deferred => {
            let deferred_call = if call.envelope {
                quote! { self.client.deferred_envelope::<#decoder>(&__key, __args) }
            } else {
                quote! { self.client.deferred::<#decoder>(&__key, __args) }
            };
            quote! {{
                #prologue
                match __args {
                    ::core::result::Result::Ok(__args) => #deferred_call,
                    ::core::result::Result::Err(__e) => {
                        ::restwire_core::prelude::Deferred::rejected(__e)
                    }
                }
            }}
        }
        IrWrapper::Other => quote! {{ ::core::unreachable!() }},
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::lower;
    use crate::parse::parse_trait;

    fn generate(item: syn::ItemTrait) -> String {
        emit(lower(parse_trait(item).unwrap()).unwrap()).to_string()
    }

    #[test]
    fn generates_client_struct_and_calls() {
        let out = generate(syn::parse_quote! {
            pub trait Users {
                #[get("/users/{id}")]
                async fn get(&self, id: u32) -> Result<ApiResponse<User>, ApiError>;

                #[get("/users")]
                fn list(&self, cancel: CancellationToken) -> Deferred<Vec<User>>;
            }
        });
        assert!(out.contains("pub struct UsersClient"));
        assert!(out.contains("invoke_envelope :: < :: restwire_core :: internal :: AsDeserialized < User > >"));
        assert!(out.contains("deferred :: < :: restwire_core :: internal :: AsDeserialized < Vec < User > > >"));
        assert!(out.contains("__args . cancellation (cancel)"));
        assert!(out.contains("allow (async_fn_in_trait)"));
        assert!(!out.contains("compile_error"));
    }

    #[test]
    fn method_generics_named_t_do_not_clash_with_the_transport() {
        let out = generate(syn::parse_quote! {
            pub trait Catalog {
                #[get("/items/{id}")]
                async fn item_as<T: DeserializeOwned + Send + 'static>(&self, id: u32) -> Result<T, ApiError>;
            }
        });
        assert!(out.contains("pub struct CatalogClient < __RestwireTransport"));
        assert!(out.contains("impl < __RestwireTransport : :: restwire_core :: prelude :: Transport > Catalog for CatalogClient < __RestwireTransport >"));
        assert!(out.contains("AsDeserialized < T >"));
        assert!(!out.contains("CatalogClient < T >"));
        assert!(!out.contains("compile_error"));
    }

    #[test]
    fn resolution_errors_become_compile_errors() {
        let out = generate(syn::parse_quote! {
            trait Files {
                #[post("/files")]
                async fn upload(&self, a: Meta, b: Blob) -> Result<(), ApiError>;

                #[get("/files/{name}")]
                async fn get(&self, name: &str) -> Result<String, ApiError>;
            }
        });
        assert!(out.contains("compile_error"));
        assert!(out.contains("RW0003"));
        assert!(out.contains("AsText"));
    }

    #[test]
    fn methods_without_a_verb() {
        let out = generate(syn::parse_quote! {
            trait Mixed {
                async fn nothing(&self) -> Result<(), ApiError>;

                fn helper(&self) -> u8 { 7 }
            }
        });
        assert!(out.contains("NotAnEndpoint"));
        assert!(out.contains("\"Mixed::nothing\""));
        assert!(!out.contains("compile_error"));
    }
}

//! Execution of emitted [`AssemblyStep`]s against call arguments.

use crate::args::{Arg, Args};
use crate::codec::form::{Flattener, Pairs, encode_pairs};
use crate::codec::multipart::{self, Part, PartBody};
use crate::error::{ApiError, ArgumentError};
use crate::format::{FormatContext, FormatTarget};
use crate::settings::Settings;
use crate::transport::{BodyStream, BuiltRequest, RequestBody, RequestProperties, VersionPolicy};
use crate::uri::UriBuilder;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Version};
use restwire_descriptor::descriptor::{
    AuthorizationBinding, HeaderCollectionBinding, HeaderEntry, HeaderParameterBinding,
    MethodDescriptor, PartBinding, PropertyBinding,
};
use restwire_descriptor::emit::{AssemblyStep, INTERFACE_PROPERTY, METHOD_PROPERTY};
use restwire_descriptor::meta::BodySerialization;
use serde_json::Value;
use url::Url;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const OCTET_STREAM: &str = "application/octet-stream";

pub(crate) enum ContentBody {
    Empty,
    Buffered(Bytes),
    Streamed(BodyStream),
}

/// Request content: its own headers (`Content-*`) plus the body.
pub(crate) struct Content {
    pub headers: HeaderMap,
    pub body: ContentBody,
    /// Send with a known length (streams are read fully first).
    pub buffer: bool,
}

impl Content {
    fn new(body: ContentBody, buffer: bool) -> Self {
        Self {
            headers: HeaderMap::new(),
            body,
            buffer,
        }
    }

    fn empty() -> Self {
        Self::new(ContentBody::Empty, true)
    }
}

pub(crate) struct AssembledRequest {
    pub method: Method,
    pub url: Option<Url>,
    pub version: Option<Version>,
    pub version_policy: VersionPolicy,
    pub headers: HeaderMap,
    pub content: Option<Content>,
    pub properties: RequestProperties,
}

impl AssembledRequest {
    fn new(method: Method) -> Self {
        Self {
            method,
            url: None,
            version: None,
            version_policy: VersionPolicy::default(),
            headers: HeaderMap::new(),
            content: None,
            properties: RequestProperties::new(),
        }
    }

    /// Read a streamed body into memory when the content asks to be buffered.
    pub async fn materialize(&mut self) -> Result<(), ApiError> {
        use futures::TryStreamExt;
        let Some(content) = self.content.as_mut() else {
            return Ok(());
        };
        if !content.buffer {
            return Ok(());
        }
        if let ContentBody::Streamed(_) = content.body {
            let ContentBody::Streamed(s) = std::mem::replace(&mut content.body, ContentBody::Empty)
            else {
                return Ok(());
            };
            let chunks: Vec<Bytes> = s.try_collect().await.map_err(ApiError::Serialization)?;
            content.body = ContentBody::Buffered(Bytes::from(chunks.concat()));
        }
        Ok(())
    }

    /// Body bytes sent with a known length, for debug output.
    pub fn buffered_body(&self) -> Option<&Bytes> {
        match self.content.as_ref() {
            Some(Content {
                body: ContentBody::Buffered(b),
                buffer: true,
                ..
            }) => Some(b),
            _ => None,
        }
    }

    /// Headers as sent: request headers, then content headers.
    pub fn wire_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(c) = &self.content {
            for name in c.headers.keys() {
                headers.remove(name);
                for v in c.headers.get_all(name) {
                    headers.append(name.clone(), v.clone());
                }
            }
        }
        headers
    }

    pub fn into_built(self, base: &Url) -> BuiltRequest {
        let headers = self.wire_headers();
        let body = match self.content {
            None => RequestBody::Empty,
            Some(c) => match c.body {
                ContentBody::Empty => RequestBody::Empty,
                ContentBody::Buffered(b) if c.buffer => RequestBody::Bytes(b),
                ContentBody::Buffered(b) => RequestBody::Stream(multipart::single_chunk(b)),
                ContentBody::Streamed(s) => RequestBody::Stream(s),
            },
        };
        BuiltRequest {
            method: self.method,
            url: self.url.unwrap_or_else(|| base.clone()),
            version: self.version,
            version_policy: self.version_policy,
            headers,
            body,
            properties: self.properties,
        }
    }
}

fn header_name(name: &str) -> Result<HeaderName, ApiError> {
    HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| ApiError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) struct Assembler<'a> {
    pub base: &'a Url,
    pub descriptor: &'a MethodDescriptor,
    pub args: &'a Args,
    pub settings: &'a Settings,
}

impl<'a> Assembler<'a> {
    pub fn run(&self, steps: &[AssemblyStep]) -> Result<AssembledRequest, ApiError> {
        let mut req = AssembledRequest::new(Method::GET);
        for step in steps {
            match step {
                AssemblyStep::CreateRequest(m) => req = AssembledRequest::new(m.clone()),
                AssemblyStep::AttachBody {
                    parameter,
                    serialization,
                    buffered,
                } => {
                    let buffer = buffered.unwrap_or(self.settings.buffered());
                    req.content = self.body(*parameter, *serialization, buffer)?;
                }
                AssemblyStep::AttachMultipart { boundary, parts } => {
                    req.content = Some(self.multipart(boundary, parts)?);
                }
                AssemblyStep::EnsureContent => {
                    req.content.get_or_insert_with(Content::empty);
                }
                AssemblyStep::WriteStaticHeaders(entries) => {
                    for e in entries {
                        self.static_header(&mut req, e)?;
                    }
                }
                AssemblyStep::WriteParameterHeader(b) => self.parameter_header(&mut req, b)?,
                AssemblyStep::WriteHeaderCollection(b) => self.header_collection(&mut req, b)?,
                AssemblyStep::WriteAuthorization(b) => self.authorization(&mut req, b)?,
                AssemblyStep::WriteSettingsProperties => {
                    req.properties.extend(
                        self.settings
                            .properties()
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone())),
                    );
                }
                AssemblyStep::WriteParameterProperty(b) => self.property(&mut req, b)?,
                AssemblyStep::WriteIdentityProperties { interface, method } => {
                    req.properties
                        .insert(INTERFACE_PROPERTY.to_string(), Value::from(interface.as_str()));
                    req.properties
                        .insert(METHOD_PROPERTY.to_string(), Value::from(method.as_str()));
                }
                AssemblyStep::ApplyVersionPolicy => {
                    req.version = self.settings.version();
                    req.version_policy = self.settings.version_policy();
                }
                AssemblyStep::BuildUri(plan) => {
                    let uri = UriBuilder {
                        base: self.base,
                        descriptor: self.descriptor,
                        args: self.args,
                        settings: self.settings,
                    };
                    req.url = Some(uri.build(plan)?);
                }
            }
        }
        Ok(req)
    }

    fn name(&self, index: usize) -> &'a str {
        self.descriptor
            .parameters
            .get(index)
            .map(|p| p.name.as_str())
            .unwrap_or("")
    }

    fn arg(&self, index: usize) -> Result<&'a Arg, ArgumentError> {
        self.args.require(index, self.name(index))
    }

    fn format(&self, target: FormatTarget, index: usize, key: &str, v: &Value) -> Option<String> {
        let cx = FormatContext::new(target, self.name(index)).key(key);
        self.settings.formatter().format(v, &cx)
    }

    fn take_stream(&self, index: usize, arg: &Arg) -> Result<Option<BodyStream>, ArgumentError> {
        match arg {
            Arg::Stream(slot) => slot
                .take()
                .map(Some)
                .ok_or_else(|| ArgumentError::StreamConsumed(self.name(index).to_string())),
            _ => Ok(None),
        }
    }

    fn body(
        &self,
        index: usize,
        serialization: BodySerialization,
        buffer: bool,
    ) -> Result<Option<Content>, ApiError> {
        let arg = self.arg(index)?;
        let (body, content_type) = match arg {
            Arg::Bytes(b) => (ContentBody::Buffered(b.clone()), None),
            Arg::Stream(_) => match self.take_stream(index, arg)? {
                Some(s) => (ContentBody::Streamed(s), None),
                None => return Ok(None),
            },
            Arg::Cancellation(_) => {
                return Err(ArgumentError::Kind {
                    name: self.name(index).to_string(),
                    expected: "a body value",
                    got: arg.kind(),
                }
                .into());
            }
            Arg::Value(Value::Null) => return Ok(None),
            Arg::Value(v) => match (serialization, v) {
                (BodySerialization::Default, Value::String(s)) => (
                    ContentBody::Buffered(Bytes::from(s.clone())),
                    Some(TEXT_CONTENT_TYPE.to_string()),
                ),
                (BodySerialization::UrlEncoded, v) => (
                    ContentBody::Buffered(Bytes::from(self.url_encoded(index, v))),
                    Some(FORM_CONTENT_TYPE.to_string()),
                ),
                (_, v) => {
                    let serializer = self.settings.serializer();
                    let bytes = serializer.serialize(v).map_err(ApiError::Serialization)?;
                    (
                        ContentBody::Buffered(bytes),
                        Some(serializer.content_type().to_string()),
                    )
                }
            },
        };
        let mut content = Content::new(body, buffer);
        if let Some(ct) = content_type {
            content
                .headers
                .insert(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), &ct)?);
        }
        Ok(Some(content))
    }

    fn url_encoded(&self, index: usize, v: &Value) -> String {
        if let Value::String(s) = v {
            return s.clone();
        }
        let flattener = Flattener {
            formatter: self.settings.formatter(),
            serializer: self.settings.serializer(),
            collection_format: self.settings.collection_format(),
            delimiter: restwire_descriptor::classify::DEFAULT_QUERY_DELIMITER,
            parameter: self.name(index),
            target: FormatTarget::Query,
        };
        let mut pairs = Pairs::new();
        match v {
            Value::Object(map) => flattener.object(None, map, &[], &mut pairs),
            other => flattener.value(self.name(index), other, &mut pairs),
        }
        encode_pairs(&pairs)
    }

    fn multipart(&self, boundary: &str, bindings: &[PartBinding]) -> Result<Content, ApiError> {
        let mut parts = Vec::new();
        for b in bindings {
            let arg = self.arg(b.parameter)?;
            match arg {
                Arg::Bytes(bytes) => parts.push(Part {
                    name: b.name.clone(),
                    file_name: Some(b.file_name.clone().unwrap_or_else(|| b.name.clone())),
                    content_type: Some(OCTET_STREAM.to_string()),
                    body: PartBody::Bytes(bytes.clone()),
                }),
                Arg::Stream(_) => {
                    if let Some(s) = self.take_stream(b.parameter, arg)? {
                        parts.push(Part {
                            name: b.name.clone(),
                            file_name: Some(b.file_name.clone().unwrap_or_else(|| b.name.clone())),
                            content_type: Some(OCTET_STREAM.to_string()),
                            body: PartBody::Stream(s),
                        });
                    }
                }
                Arg::Cancellation(_) => {}
                Arg::Value(v) => self.value_parts(b, v, &mut parts)?,
            }
        }
        let mut content = Content::new(
            ContentBody::Streamed(multipart::encode(boundary, parts)),
            self.settings.buffered(),
        );
        content.headers.insert(
            CONTENT_TYPE,
            header_value(CONTENT_TYPE.as_str(), &multipart::content_type(boundary))?,
        );
        Ok(content)
    }

    fn value_parts(&self, b: &PartBinding, v: &Value, parts: &mut Vec<Part>) -> Result<(), ApiError> {
        match v {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    self.value_parts(b, item, parts)?;
                }
            }
            Value::Object(_) => {
                let serializer = self.settings.serializer();
                parts.push(Part {
                    name: b.name.clone(),
                    file_name: b.file_name.clone(),
                    content_type: Some(serializer.content_type().to_string()),
                    body: PartBody::Bytes(serializer.serialize(v).map_err(ApiError::Serialization)?),
                });
            }
            scalar => {
                if let Some(text) = self.format(FormatTarget::Part, b.parameter, &b.name, scalar) {
                    parts.push(Part {
                        name: b.name.clone(),
                        file_name: None,
                        content_type: Some(TEXT_CONTENT_TYPE.to_string()),
                        body: PartBody::Bytes(Bytes::from(text)),
                    });
                }
            }
        }
        Ok(())
    }

    /// Set or remove one header, routing `Content-*` names to the content.
    fn set_header(
        &self,
        req: &mut AssembledRequest,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ApiError> {
        let hn = header_name(name)?;
        req.headers.remove(&hn);
        if let Some(c) = req.content.as_mut() {
            c.headers.remove(&hn);
        }
        let Some(value) = value else {
            return Ok(());
        };
        let hv = header_value(name, value)?;
        match req.content.as_mut() {
            Some(c) if hn.as_str().starts_with("content-") => {
                c.headers.insert(hn, hv);
            }
            _ => {
                req.headers.insert(hn, hv);
            }
        }
        Ok(())
    }

    fn static_header(&self, req: &mut AssembledRequest, e: &HeaderEntry) -> Result<(), ApiError> {
        self.set_header(req, &e.name, e.value.as_deref())
    }

    fn parameter_header(
        &self,
        req: &mut AssembledRequest,
        b: &HeaderParameterBinding,
    ) -> Result<(), ApiError> {
        let v = self.arg(b.parameter)?.to_value();
        let text = self.format(FormatTarget::Header, b.parameter, &b.name, &v);
        self.set_header(req, &b.name, text.as_deref())
    }

    fn header_collection(
        &self,
        req: &mut AssembledRequest,
        b: &HeaderCollectionBinding,
    ) -> Result<(), ApiError> {
        let v = self.arg(b.parameter)?.to_value();
        let map = match v {
            Value::Null => return Ok(()),
            Value::Object(map) => map,
            _ => {
                return Err(ArgumentError::Kind {
                    name: self.name(b.parameter).to_string(),
                    expected: "a map of header names to values",
                    got: "a value",
                }
                .into());
            }
        };
        for (name, value) in &map {
            let text = self.format(FormatTarget::Header, b.parameter, name, value);
            self.set_header(req, name, text.as_deref())?;
        }
        Ok(())
    }

    fn authorization(
        &self,
        req: &mut AssembledRequest,
        b: &AuthorizationBinding,
    ) -> Result<(), ApiError> {
        let v = self.arg(b.parameter)?.to_value();
        let Some(token) = self.format(FormatTarget::Header, b.parameter, AUTHORIZATION.as_str(), &v)
        else {
            return Ok(());
        };
        let value = format!("{} {}", b.scheme, token);
        self.set_header(req, AUTHORIZATION.as_str(), Some(&value))
    }

    fn property(&self, req: &mut AssembledRequest, b: &PropertyBinding) -> Result<(), ApiError> {
        let v = self.arg(b.parameter)?.to_value();
        req.properties.insert(b.key.clone(), v);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use restwire_descriptor::descriptor::build_descriptor;
    use restwire_descriptor::emit::emit;
    use restwire_descriptor::meta::{InterfaceRecord, MethodRecord, ParameterRecord, TypeRef};
    use serde_json::json;

    fn assemble(
        iface: InterfaceRecord,
        method: &MethodRecord,
        args: Args,
        settings: &Settings,
    ) -> Result<AssembledRequest, ApiError> {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let d = build_descriptor(&iface, &iface, method).unwrap();
        let proc = emit(&d);
        Assembler {
            base: &base,
            descriptor: &d,
            args: &args,
            settings,
        }
        .run(&proc.steps)
    }

    fn header<'h>(h: &'h HeaderMap, name: &str) -> Option<&'h str> {
        h.get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn path_and_query_in_declaration_order() {
        let m = MethodRecord::new("search")
            .http(Method::GET, "/users/{id}/items?sort=asc")
            .param(ParameterRecord::new("id", TypeRef::string()))
            .param(ParameterRecord::new("page", TypeRef::scalar("u32")))
            .param(ParameterRecord::new("tag", TypeRef::string().nullable(true)));
        let args = Args::new()
            .value("id", "oct/cat")
            .unwrap()
            .value("page", &2)
            .unwrap()
            .value("tag", &Option::<String>::None)
            .unwrap();
        let req = assemble(InterfaceRecord::new("Api"), &m, args, &Settings::default()).unwrap();
        assert_eq!(
            req.url.unwrap().as_str(),
            "https://api.example.com/v1/users/oct%2Fcat/items?sort=asc&page=2"
        );
        assert_eq!(req.properties[METHOD_PROPERTY], json!("search"));
        assert_eq!(req.properties[INTERFACE_PROPERTY], json!("Api"));
    }

    #[test]
    fn string_body_is_text_and_objects_are_serialized() {
        let m = MethodRecord::new("note")
            .http(Method::POST, "/notes")
            .param(ParameterRecord::new("text", TypeRef::string()).annotate(
                restwire_descriptor::meta::ParameterAnnotation::Body {
                    serialization: Some(BodySerialization::Default),
                    buffered: None,
                },
            ));
        let args = Args::new().value("text", "hello").unwrap();
        let req = assemble(InterfaceRecord::new("Api"), &m, args, &Settings::default()).unwrap();
        assert_eq!(req.buffered_body().map(|b| &b[..]), None);
        let c = req.content.as_ref().unwrap();
        assert_eq!(header(&c.headers, "content-type"), Some(TEXT_CONTENT_TYPE));
        assert!(!c.buffer);

        let m = MethodRecord::new("create")
            .http(Method::POST, "/users")
            .param(ParameterRecord::new("user", TypeRef::structured("User")));
        let args = Args::new().value("user", &json!({"name": "a"})).unwrap();
        let settings = Settings::default().with_buffered(true);
        let req = assemble(InterfaceRecord::new("Api"), &m, args, &settings).unwrap();
        assert_eq!(req.buffered_body().map(|b| &b[..]), Some(&br#"{"name":"a"}"#[..]));
        let built = req.into_built(&Url::parse("https://x/").unwrap());
        assert_eq!(
            header(&built.headers, "content-type"),
            Some("application/json; charset=utf-8")
        );
        assert!(matches!(built.body, RequestBody::Bytes(_)));
    }

    #[test]
    fn method_headers_override_interface_and_none_removes() {
        let iface = InterfaceRecord::new("Api")
            .header("User-Agent: restwire")
            .header("X-Trace: on");
        let m = MethodRecord::new("ping")
            .http(Method::GET, "/ping")
            .annotate(restwire_descriptor::meta::MethodAnnotation::Headers(vec![
                "User-Agent: ping-client".into(),
                "X-Trace".into(),
            ]))
            .param(
                ParameterRecord::new("token", TypeRef::string()).annotate(
                    restwire_descriptor::meta::ParameterAnnotation::Authorize {
                        scheme: "Bearer".into(),
                    },
                ),
            );
        let args = Args::new().value("token", "t0k").unwrap();
        let req = assemble(iface, &m, args, &Settings::default()).unwrap();
        let h = req.wire_headers();
        assert_eq!(header(&h, "user-agent"), Some("ping-client"));
        assert_eq!(header(&h, "x-trace"), None);
        assert_eq!(header(&h, "authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn url_encoded_body_flattens_fields() {
        let m = MethodRecord::new("login").http(Method::POST, "/login").param(
            ParameterRecord::new("form", TypeRef::structured("Login")).annotate(
                restwire_descriptor::meta::ParameterAnnotation::Body {
                    serialization: Some(BodySerialization::UrlEncoded),
                    buffered: Some(true),
                },
            ),
        );
        let args = Args::new()
            .value("form", &json!({"user": "a b", "scopes": ["x", "y"]}))
            .unwrap();
        let req = assemble(InterfaceRecord::new("Api"), &m, args, &Settings::default()).unwrap();
        assert_eq!(
            req.buffered_body().map(|b| &b[..]),
            Some(&b"user=a+b&scopes=x&scopes=y"[..])
        );
    }

    #[test]
    fn missing_argument_is_reported_by_name() {
        let m = MethodRecord::new("get")
            .http(Method::GET, "/users/{id}")
            .param(ParameterRecord::new("id", TypeRef::scalar("u64")));
        let err = assemble(InterfaceRecord::new("Api"), &m, Args::new(), &Settings::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ApiError::Argument(ArgumentError::Missing { index: 0, ref name }) if name == "id"
        ));
    }
}

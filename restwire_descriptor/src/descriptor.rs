use crate::classify::{ParameterBindings, classify};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::error::DescriptorError;
use crate::headers::merge_scopes;
use crate::key::MethodKey;
use crate::meta::{
    ApiRecords, BodySerialization, GenericConstraint, GenericParamRecord, InterfaceRecord,
    MethodRecord, TypeRef,
};
use crate::shape::{ReturnDescriptor, classify_return, emitted_constraints};
use crate::template::tokenize;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_MULTIPART_BOUNDARY: &str = "----RestwireBoundary";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParameterRole {
    Path,
    /// Some properties feed path placeholders; the rest go to the query.
    ObjectProperty,
    Body,
    Authorization,
    Header,
    HeaderCollection,
    Property,
    Query,
    MultipartPart,
    Cancellation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub index: usize,
    pub name: String,
    pub ty: TypeRef,
    pub role: ParameterRole,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathFragment {
    Constant(String),
    Dynamic {
        parameter: usize,
        type_name: String,
    },
    /// String value inserted with its `/` separators intact.
    DynamicRoundTrip { parameter: usize },
    DynamicProperty {
        parameter: usize,
        property: String,
        /// `None` when the receiver's properties are opaque.
        type_name: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyDescriptor {
    pub parameter: usize,
    pub serialization: BodySerialization,
    /// `None` defers to the client settings.
    pub buffered: Option<bool>,
}

/// Static header; a `None` value removes the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderParameterBinding {
    pub parameter: usize,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderCollectionBinding {
    pub parameter: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationBinding {
    pub parameter: usize,
    pub scheme: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyBinding {
    pub parameter: usize,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryBinding {
    pub parameter: usize,
    pub key: String,
    pub format: Option<crate::meta::CollectionFormat>,
    pub prefix: Option<String>,
    pub delimiter: String,
    /// Properties already consumed by path placeholders.
    pub excluded: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartBinding {
    pub parameter: usize,
    pub name: String,
    pub file_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartDescriptor {
    pub boundary: String,
    pub parts: Vec<PartBinding>,
}

/// Fully resolved description of one endpoint method. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub key: MethodKey,
    /// Interface the method is declared on (a base of `key.interface` for
    /// inherited methods).
    pub declaring_interface: String,
    pub name: String,
    pub method: Method,
    pub path: String,
    pub fragments: Vec<PathFragment>,
    pub returns: ReturnDescriptor,
    pub generics: Vec<GenericParamRecord>,
    pub parameters: Vec<ParameterDescriptor>,
    pub body: Option<BodyDescriptor>,
    pub headers: Vec<HeaderEntry>,
    pub header_parameters: Vec<HeaderParameterBinding>,
    pub header_collection: Option<HeaderCollectionBinding>,
    pub authorization: Option<AuthorizationBinding>,
    pub properties: Vec<PropertyBinding>,
    pub queries: Vec<QueryBinding>,
    pub multipart: Option<MultipartDescriptor>,
    pub cancellation: Option<usize>,
    pub dispose_response: bool,
}

impl MethodDescriptor {
    #[inline]
    pub fn interface(&self) -> &str {
        &self.key.interface
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Generic constraints restated by structural implementations.
    pub fn emitted_generics(&self) -> Vec<(String, Vec<GenericConstraint>)> {
        self.generics
            .iter()
            .map(|g| (g.name.clone(), emitted_constraints(g)))
            .collect()
    }

    #[inline]
    pub fn has_header_sources(&self) -> bool {
        !self.headers.is_empty()
            || !self.header_parameters.is_empty()
            || self.header_collection.is_some()
            || self.authorization.is_some()
    }
}

pub fn method_key(interface: &str, method: &MethodRecord) -> MethodKey {
    MethodKey::new(
        interface,
        &method.name,
        method.params.iter().map(|p| p.ty.name.as_str()),
        method.generics.len(),
    )
}

/// Header scopes of every base of `iface`, lowest precedence first: a base's
/// own ancestors come before it and the nearest base comes last.
fn inherited_header_scopes<'a>(iface: &'a InterfaceRecord, scopes: &mut Vec<Vec<&'a str>>) {
    for base in &iface.bases {
        inherited_header_scopes(base, scopes);
        scopes.push(base.headers.iter().map(String::as_str).collect());
    }
}

/// Resolve one method of `declaring`, as seen through the `target`
/// interface a client is generated for.
pub fn build_descriptor(
    target: &InterfaceRecord,
    declaring: &InterfaceRecord,
    method: &MethodRecord,
) -> Result<MethodDescriptor, DescriptorError> {
    let (verb, path) = method
        .http_annotation()
        .ok_or(DescriptorError::MissingHttpMethod)?;
    let template = tokenize(path)?;
    let returns = classify_return(&method.returns)?;
    let multipart = method.multipart();

    let ParameterBindings {
        fragments,
        parameters,
        body,
        header_parameters,
        header_collection,
        authorization,
        properties,
        queries,
        parts,
        cancellation,
    } = classify(verb, &template, &method.params, multipart.is_some())?;

    let mut scopes: Vec<Vec<&str>> = Vec::with_capacity(3);
    inherited_header_scopes(declaring, &mut scopes);
    scopes.push(declaring.headers.iter().map(String::as_str).collect());
    scopes.push(method.header_lines().collect());
    let headers = merge_scopes(scopes);

    let multipart = multipart.map(|boundary| MultipartDescriptor {
        boundary: boundary.unwrap_or(DEFAULT_MULTIPART_BOUNDARY).to_string(),
        parts,
    });

    let dispose_response = returns.dispose_response();
    Ok(MethodDescriptor {
        key: method_key(&target.name, method),
        declaring_interface: declaring.name.clone(),
        name: method.name.clone(),
        method: verb.clone(),
        path: path.to_string(),
        fragments,
        returns,
        generics: method.generics.clone(),
        parameters,
        body,
        headers,
        header_parameters,
        header_collection,
        authorization,
        properties,
        queries,
        multipart,
        cancellation,
        dispose_response,
    })
}

/// All descriptors of one interface (inherited methods included).
#[derive(Clone, Debug, Default)]
pub struct DescriptorTable {
    interface: String,
    descriptors: Vec<Arc<MethodDescriptor>>,
    by_key: HashMap<MethodKey, usize>,
}

impl DescriptorTable {
    /// Resolve every method. Failures are reported to `sink` and leave the
    /// other methods untouched.
    pub fn build(target: &InterfaceRecord, sink: &mut dyn DiagnosticSink) -> Self {
        let mut table = Self {
            interface: target.name.clone(),
            ..Default::default()
        };
        table.collect(target, target, sink);
        table
    }

    fn collect(
        &mut self,
        target: &InterfaceRecord,
        declaring: &InterfaceRecord,
        sink: &mut dyn DiagnosticSink,
    ) {
        for m in &declaring.methods {
            if m.http_annotation().is_none() {
                sink.report(
                    Diagnostic::new(
                        DiagnosticCode::NotAnEndpoint,
                        "method has no HTTP verb and path and is not part of the client",
                    )
                    .at(&declaring.name, &m.name),
                );
                continue;
            }
            match build_descriptor(target, declaring, m) {
                Ok(d) => self.insert(d),
                Err(e) => sink.report(
                    Diagnostic::new(DiagnosticCode::Resolution, e.to_string())
                        .at(&declaring.name, &m.name),
                ),
            }
        }
        for base in &declaring.bases {
            self.collect(target, base, sink);
        }
    }

    fn insert(&mut self, d: MethodDescriptor) {
        if self.by_key.contains_key(&d.key) {
            return;
        }
        self.by_key.insert(d.key.clone(), self.descriptors.len());
        self.descriptors.push(Arc::new(d));
    }

    #[inline]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn get(&self, key: &MethodKey) -> Option<&Arc<MethodDescriptor>> {
        self.by_key.get(key).map(|&i| &self.descriptors[i])
    }

    /// First descriptor with the given method name.
    pub fn find(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.descriptors.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Resolve every interface found by a front end. Without the declarative
/// marker nothing is resolved and a single RW0002 error is reported.
pub fn compile(records: &ApiRecords, sink: &mut dyn DiagnosticSink) -> Vec<DescriptorTable> {
    if records.marker.is_none() {
        sink.report(Diagnostic::new(
            DiagnosticCode::MissingMarker,
            "declarative API marker not found; no clients are generated",
        ));
        return Vec::new();
    }
    records
        .interfaces
        .iter()
        .map(|i| DescriptorTable::build(i, sink))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::meta::{OutputType, ParameterRecord, ReturnRecord};
    use crate::shape::{DecodeTarget, ReturnShape};
    use pretty_assertions::assert_eq;

    fn users() -> InterfaceRecord {
        InterfaceRecord::new("Users")
            .header("User-Agent: restwire")
            .header("Accept: text/plain")
            .method(
                MethodRecord::new("get_user")
                    .http(Method::GET, "/users/{id}")
                    .annotate(crate::meta::MethodAnnotation::Headers(vec![
                        "Accept: application/json".into(),
                    ]))
                    .param(ParameterRecord::new("id", TypeRef::scalar("u64")))
                    .returns(ReturnRecord::future(OutputType::Value(TypeRef::structured(
                        "User",
                    )))),
            )
            .method(MethodRecord::new("helper"))
            .method(
                MethodRecord::new("broken")
                    .http(Method::GET, "/x/{nope}")
                    .returns(ReturnRecord::future(OutputType::Unit)),
            )
    }

    #[test]
    fn builds_descriptor() {
        let iface = users();
        let d = build_descriptor(&iface, &iface, &iface.methods[0]).unwrap();
        assert_eq!(d.key, MethodKey::new("Users", "get_user", ["u64"], 0));
        assert_eq!(d.returns.shape, ReturnShape::Value);
        assert_eq!(d.returns.target, DecodeTarget::Deserialize);
        assert!(d.dispose_response);
        assert_eq!(
            d.headers,
            vec![
                HeaderEntry {
                    name: "User-Agent".into(),
                    value: Some("restwire".into())
                },
                HeaderEntry {
                    name: "Accept".into(),
                    value: Some("application/json".into())
                },
            ]
        );
        assert!(d.has_header_sources());
    }

    #[test]
    fn table_reports_and_continues() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let table = DescriptorTable::build(&users(), &mut diags);
        assert_eq!(table.len(), 1);
        assert!(table.find("get_user").is_some());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].code, DiagnosticCode::NotAnEndpoint);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[1].code, DiagnosticCode::Resolution);
        assert_eq!(diags[1].method.as_deref(), Some("broken"));
    }

    fn header(name: &str, value: &str) -> HeaderEntry {
        HeaderEntry {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    fn ping(name: &str) -> MethodRecord {
        MethodRecord::new(name)
            .http(Method::GET, format!("/{name}"))
            .returns(ReturnRecord::future(OutputType::Unit))
    }

    #[test]
    fn derived_methods_see_base_headers() {
        let base = InterfaceRecord::new("Base").header("X-Base: 1").method(ping("ping"));
        let derived = InterfaceRecord::new("Derived").base(base).method(ping("own"));
        let mut diags: Vec<Diagnostic> = Vec::new();
        let table = DescriptorTable::build(&derived, &mut diags);

        let own = table.find("own").unwrap();
        assert_eq!(own.declaring_interface, "Derived");
        assert_eq!(own.headers, vec![header("X-Base", "1")]);
        assert!(diags.is_empty());
    }

    #[test]
    fn inherited_methods_ignore_derived_headers() {
        let base = InterfaceRecord::new("Base").header("X-Scope: base").method(ping("ping"));
        let derived = InterfaceRecord::new("Derived")
            .header("X-Scope: derived")
            .header("X-Derived: 1")
            .base(base);
        let mut diags: Vec<Diagnostic> = Vec::new();
        let table = DescriptorTable::build(&derived, &mut diags);

        let d = table.find("ping").unwrap();
        assert_eq!(d.key.interface, "Derived");
        assert_eq!(d.declaring_interface, "Base");
        assert_eq!(d.headers, vec![header("X-Scope", "base")]);
    }

    #[test]
    fn headers_merge_base_then_declaring_then_method() {
        let root = InterfaceRecord::new("Root")
            .header("X-Scope: root")
            .header("X-Root: r");
        let base = InterfaceRecord::new("Base")
            .base(root)
            .header("X-Scope: base")
            .header("X-Only-Base: b");
        let derived = InterfaceRecord::new("Derived")
            .base(base)
            .header("X-Scope: derived")
            .header("X-Declaring: d")
            .method(
                ping("own").annotate(crate::meta::MethodAnnotation::Headers(vec![
                    "X-Scope: method".into(),
                ])),
            )
            .method(ping("plain"));
        let mut diags: Vec<Diagnostic> = Vec::new();
        let table = DescriptorTable::build(&derived, &mut diags);

        assert_eq!(
            table.find("own").unwrap().headers,
            vec![
                header("X-Scope", "method"),
                header("X-Root", "r"),
                header("X-Only-Base", "b"),
                header("X-Declaring", "d"),
            ]
        );
        assert_eq!(
            table.find("plain").unwrap().headers[0],
            header("X-Scope", "derived")
        );
    }

    #[test]
    fn multipart_gets_default_boundary() {
        let iface = InterfaceRecord::new("Files").method(
            MethodRecord::new("upload")
                .http(Method::POST, "/files")
                .annotate(crate::meta::MethodAnnotation::Multipart { boundary: None })
                .param(ParameterRecord::new(
                    "file",
                    TypeRef::new("Bytes", crate::meta::TypeKind::Bytes),
                )),
        );
        let d = build_descriptor(&iface, &iface, &iface.methods[0]).unwrap();
        let mp = d.multipart.unwrap();
        assert_eq!(mp.boundary, DEFAULT_MULTIPART_BOUNDARY);
        assert_eq!(mp.parts.len(), 1);
        assert!(d.body.is_none());
    }

    #[test]
    fn compile_requires_marker() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let records = ApiRecords {
            marker: None,
            interfaces: vec![users()],
        };
        assert!(compile(&records, &mut diags).is_empty());
        assert_eq!(diags[0].code, DiagnosticCode::MissingMarker);

        let mut diags: Vec<Diagnostic> = Vec::new();
        let records = ApiRecords {
            marker: Some("restwire::rest_api".into()),
            interfaces: vec![users()],
        };
        assert_eq!(compile(&records, &mut diags).len(), 1);
    }
}

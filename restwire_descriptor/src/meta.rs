//! Structured metadata records: the input of descriptor resolution.
//!
//! Front ends (the `#[rest_api]` attribute, hand-written tables, other
//! generators) describe each declared interface with these records. All
//! capability questions the resolution rules ask about a type ("is it a
//! string?", "is it a string map?") are answered once here, in [`TypeKind`],
//! so resolution never inspects types again.

use http::Method;

/// Static capability class of a parameter type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// `String`, `&str`, `Cow<str>`.
    String,
    /// Numbers, booleans, chars and other value-like types.
    Scalar,
    /// Structs, enums and anything else serialized as an object.
    Structured,
    /// A map; `string_values` is true only for string-to-string maps.
    Map { string_values: bool },
    /// Vectors, sets, slices.
    Sequence,
    /// In-memory byte buffers, sent verbatim.
    Bytes,
    /// Streaming request bodies, sent verbatim.
    Stream,
    /// A cancellation token; never part of the request.
    Cancellation,
    /// A type parameter of the method or interface.
    Generic,
}

/// Readable properties of a structured type.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Properties {
    /// The front end cannot enumerate the properties; any `{param.prop}`
    /// placeholder is accepted and looked up on the serialized value.
    #[default]
    Opaque,
    Known(Vec<PropertyRef>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyRef {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub kind: TypeKind,
    pub nullable: bool,
    /// The type is, or contains, a type parameter.
    pub generic: bool,
    pub properties: Properties,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let generic = kind == TypeKind::Generic;
        Self {
            name: name.into(),
            kind,
            nullable: false,
            generic,
            properties: Properties::Opaque,
        }
    }

    pub fn string() -> Self {
        Self::new("String", TypeKind::String)
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Scalar)
    }

    pub fn structured(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Structured)
    }

    pub fn string_map(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Map { string_values: true })
    }

    pub fn cancellation() -> Self {
        Self::new("CancellationToken", TypeKind::Cancellation)
    }

    #[inline]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[inline]
    pub fn generic(mut self, generic: bool) -> Self {
        self.generic = generic;
        self
    }

    pub fn with_properties(mut self, properties: impl IntoIterator<Item = PropertyRef>) -> Self {
        self.properties = Properties::Known(properties.into_iter().collect());
        self
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        self.kind == TypeKind::String
    }

    /// Eligible for the POST/PUT/PATCH implicit body heuristic.
    pub fn is_body_like(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Structured
                | TypeKind::Map { .. }
                | TypeKind::Sequence
                | TypeKind::Bytes
                | TypeKind::Stream
                | TypeKind::Generic
        )
    }

    /// Can expose `{param.property}` placeholders.
    pub fn has_properties(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Structured | TypeKind::Map { .. } | TypeKind::Generic
        )
    }

    /// Case-insensitive property lookup. Opaque types echo the requested name.
    pub fn find_property(&self, name: &str) -> Option<(String, Option<&TypeRef>)> {
        match &self.properties {
            Properties::Opaque => Some((name.to_string(), None)),
            Properties::Known(props) => props
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .map(|p| (p.name.clone(), Some(&p.ty))),
        }
    }
}

impl PropertyRef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// How a body value is written.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum BodySerialization {
    /// Strings and byte payloads pass through raw; everything else goes
    /// through the content serializer.
    #[default]
    Default,
    /// `application/x-www-form-urlencoded` built from the value's fields.
    UrlEncoded,
    /// Always through the content serializer.
    Serialized,
}

/// How sequences are rendered into query strings and form bodies.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum CollectionFormat {
    /// Comma separated.
    Csv,
    /// Space separated.
    Ssv,
    /// Tab separated.
    Tsv,
    /// Pipe separated.
    Pipes,
    /// One `key=value` pair per item.
    #[default]
    Multi,
}

impl CollectionFormat {
    pub fn separator(self) -> Option<&'static str> {
        match self {
            CollectionFormat::Csv => Some(","),
            CollectionFormat::Ssv => Some(" "),
            CollectionFormat::Tsv => Some("\t"),
            CollectionFormat::Pipes => Some("|"),
            CollectionFormat::Multi => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct QueryOptions {
    pub format: Option<CollectionFormat>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodAnnotation {
    Http { method: Method, path: String },
    /// `Name: Value` lines.
    Headers(Vec<String>),
    Multipart { boundary: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterAnnotation {
    Body {
        serialization: Option<BodySerialization>,
        buffered: Option<bool>,
    },
    Query(QueryOptions),
    /// Wire name used for query keys, multipart part names and placeholders.
    Alias(String),
    Header(String),
    HeaderCollection,
    Authorize { scheme: String },
    Property { key: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterRecord {
    pub name: String,
    pub ty: TypeRef,
    pub annotations: Vec<ParameterAnnotation>,
}

impl ParameterRecord {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
        }
    }

    #[inline]
    pub fn annotate(mut self, annotation: ParameterAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn alias(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            ParameterAnnotation::Alias(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Alias if declared, else the parameter name.
    pub fn wire_name(&self) -> &str {
        self.alias().unwrap_or(&self.name)
    }

    pub(crate) fn has(&self, pred: impl Fn(&ParameterAnnotation) -> bool) -> bool {
        self.annotations.iter().any(pred)
    }
}

/// The async wrapper around a method's result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnWrapper {
    /// `async fn ... -> Result<T, E>`
    Future,
    /// `fn ... -> Deferred<T>`
    Deferred,
    /// Anything else; rejected during resolution.
    Plain,
}

/// The value carried by a method's result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputType {
    Unit,
    /// `ApiResponse<T>`
    Envelope(Box<OutputType>),
    RawResponse,
    RawContent,
    Stream,
    Text,
    Value(TypeRef),
}

impl OutputType {
    pub fn display_name(&self) -> String {
        match self {
            OutputType::Unit => "()".to_string(),
            OutputType::Envelope(inner) => format!("ApiResponse<{}>", inner.display_name()),
            OutputType::RawResponse => "RawResponse".to_string(),
            OutputType::RawContent => "RawContent".to_string(),
            OutputType::Stream => "ResponseStream".to_string(),
            OutputType::Text => "String".to_string(),
            OutputType::Value(ty) => ty.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnRecord {
    pub wrapper: ReturnWrapper,
    pub output: OutputType,
}

impl ReturnRecord {
    pub fn future(output: OutputType) -> Self {
        Self {
            wrapper: ReturnWrapper::Future,
            output,
        }
    }

    pub fn deferred(output: OutputType) -> Self {
        Self {
            wrapper: ReturnWrapper::Deferred,
            output,
        }
    }

    pub fn plain(output: OutputType) -> Self {
        Self {
            wrapper: ReturnWrapper::Plain,
            output,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GenericConstraint {
    ReferenceType,
    ValueType,
    NotNull,
    Unmanaged,
    DefaultConstructible,
    Bound(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParamRecord {
    pub name: String,
    pub constraints: Vec<GenericConstraint>,
}

impl GenericParamRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    #[inline]
    pub fn constraint(mut self, c: GenericConstraint) -> Self {
        self.constraints.push(c);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodRecord {
    pub name: String,
    pub generics: Vec<GenericParamRecord>,
    pub params: Vec<ParameterRecord>,
    pub returns: ReturnRecord,
    pub annotations: Vec<MethodAnnotation>,
}

impl MethodRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generics: Vec::new(),
            params: Vec::new(),
            returns: ReturnRecord::future(OutputType::Unit),
            annotations: Vec::new(),
        }
    }

    #[inline]
    pub fn annotate(mut self, annotation: MethodAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[inline]
    pub fn http(self, method: Method, path: impl Into<String>) -> Self {
        self.annotate(MethodAnnotation::Http {
            method,
            path: path.into(),
        })
    }

    #[inline]
    pub fn param(mut self, param: ParameterRecord) -> Self {
        self.params.push(param);
        self
    }

    #[inline]
    pub fn generic(mut self, generic: GenericParamRecord) -> Self {
        self.generics.push(generic);
        self
    }

    #[inline]
    pub fn returns(mut self, returns: ReturnRecord) -> Self {
        self.returns = returns;
        self
    }

    pub fn http_annotation(&self) -> Option<(&Method, &str)> {
        self.annotations.iter().find_map(|a| match a {
            MethodAnnotation::Http { method, path } => Some((method, path.as_str())),
            _ => None,
        })
    }

    pub fn header_lines(&self) -> impl Iterator<Item = &str> {
        self.annotations.iter().flat_map(|a| match a {
            MethodAnnotation::Headers(lines) => lines.as_slice(),
            _ => &[],
        }).map(String::as_str)
    }

    pub fn multipart(&self) -> Option<Option<&str>> {
        self.annotations.iter().find_map(|a| match a {
            MethodAnnotation::Multipart { boundary } => Some(boundary.as_deref()),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub name: String,
    /// Interface-scope `Name: Value` header lines.
    pub headers: Vec<String>,
    pub bases: Vec<InterfaceRecord>,
    pub methods: Vec<MethodRecord>,
}

impl InterfaceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            bases: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[inline]
    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }

    #[inline]
    pub fn base(mut self, base: InterfaceRecord) -> Self {
        self.bases.push(base);
        self
    }

    #[inline]
    pub fn method(mut self, method: MethodRecord) -> Self {
        self.methods.push(method);
        self
    }
}

/// Everything a front end found in one compilation unit.
#[derive(Clone, Debug, Default)]
pub struct ApiRecords {
    /// Path of the declarative-API marker the front end resolved, if any.
    pub marker: Option<String>,
    pub interfaces: Vec<InterfaceRecord>,
}

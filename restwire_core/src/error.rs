use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use http::{HeaderMap, Method, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;
use url::Url;

pub type FxError = Box<dyn Error + Send + Sync>;

/// A call argument could not be turned into request data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArgumentError {
    #[error("argument `{name}` could not be serialized: {message}")]
    Serialize { name: String, message: String },

    #[error("missing argument #{index} (`{name}`)")]
    Missing { index: usize, name: String },

    #[error("argument `{name}` is {got}, expected {expected}")]
    Kind {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("stream argument `{0}` was already consumed by an earlier dispatch")]
    StreamConsumed(String),
}

/// Non-success response (or undecodable body), with a snapshot of the
/// exchange. The live response is already released when this exists.
#[derive(Debug)]
pub struct ApiException {
    pub method: Method,
    pub uri: Url,
    pub status: StatusCode,
    pub reason: Option<&'static str>,
    pub headers: HeaderMap,
    /// Best-effort body text.
    pub content: Option<String>,
    pub source: Option<FxError>,
}

impl ApiException {
    pub fn new(method: Method, uri: Url, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            status,
            reason: status.canonical_reason(),
            headers,
            content: None,
            source: None,
        }
    }

    #[inline]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<FxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

impl fmt::Display for ApiException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.method,
            self.uri,
            self.status.as_u16(),
            self.reason.unwrap_or("")
        )?;
        if let Some(src) = &self.source {
            write!(f, ": {src}")?;
        }
        Ok(())
    }
}

impl Error for ApiException {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// RFC 7807 problem document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub instance: Option<String>,
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

/// [`ApiException`] whose body is an `application/problem+json` document.
#[derive(Debug)]
pub struct ValidationApiException {
    pub exception: ApiException,
    pub problem: ProblemDetails,
}

impl fmt::Display for ValidationApiException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exception)?;
        if let Some(t) = &self.problem.title {
            write!(f, ": {t}")?;
        }
        Ok(())
    }
}

impl Error for ValidationApiException {}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("api error: {0}")]
    Api(Box<ApiException>),

    #[error("validation error: {0}")]
    Validation(Box<ValidationApiException>),

    #[error("request failed: {0}")]
    Request(#[from] crate::transport::TransportError),

    #[error("invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    #[error("serialization: {0}")]
    Serialization(FxError),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("no descriptor for `{0}`")]
    UnknownMethod(String),

    #[error("`{0}` has no HTTP verb and path and cannot be called")]
    NotAnEndpoint(String),

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("result decoder `{decoder}` does not match the declared result of `{method}`")]
    DecoderMismatch {
        method: String,
        decoder: &'static str,
    },
}

impl ApiError {
    #[inline]
    pub fn serialization(e: impl Into<FxError>) -> Self {
        ApiError::Serialization(e.into())
    }

    /// The exception snapshot for status and deserialization failures.
    pub fn exception(&self) -> Option<&ApiException> {
        match self {
            ApiError::Api(e) => Some(e),
            ApiError::Validation(v) => Some(&v.exception),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.exception().map(|e| e.status)
    }

    pub fn problem(&self) -> Option<&ProblemDetails> {
        match self {
            ApiError::Validation(v) => Some(&v.problem),
            _ => None,
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

impl From<ApiException> for ApiError {
    fn from(e: ApiException) -> Self {
        ApiError::Api(Box::new(e))
    }
}

impl From<ValidationApiException> for ApiError {
    fn from(e: ValidationApiException) -> Self {
        ApiError::Validation(Box::new(e))
    }
}

pub fn body_as_text(headers: &HeaderMap, body: &bytes::Bytes, full_len: Option<usize>) -> String {
    const MAX: usize = 8 * 1024;
    let ct = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let slice = if body.len() > MAX {
        &body[..MAX]
    } else {
        &body[..]
    };
    let total_len = full_len.unwrap_or(body.len());
    if is_textual(ct) {
        match std::str::from_utf8(slice) {
            Ok(s) => {
                if total_len > slice.len() {
                    format!("{}...", s)
                } else {
                    s.to_owned()
                }
            }
            Err(_) => format!("<non-utf8-text; {} bytes>", slice.len()),
        }
    } else {
        let b64 = B64.encode(slice);
        format!(
            "<non-text; {} bytes; base64:{}{}>",
            total_len,
            &b64[..b64.len().min(1024)],
            if b64.len() > 1024 { "..." } else { "" }
        )
    }
}

/// Content types whose bodies are shown as text. An absent type counts as
/// text: error pages rarely declare one.
pub(crate) fn is_textual(ct: &str) -> bool {
    let ct = ct.trim().to_ascii_lowercase();
    ct.is_empty()
        || ct.starts_with("text/")
        || ct.starts_with("application/json")
        || ct.starts_with("application/problem+json")
        || ct.starts_with("application/xml")
        || ct.starts_with("application/x-www-form-urlencoded")
        || ct.contains("+json")
        || ct.contains("+xml")
}

use crate::error::FxError;
use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, Method, StatusCode, Version};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// Chunked request body produced by streams and unbuffered content.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, FxError>> + Send + Sync>>;

/// Per-request values visible to the transport (handlers, middleware); never
/// sent on the wire.
pub type RequestProperties = BTreeMap<String, serde_json::Value>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum VersionPolicy {
    #[default]
    RequestVersionOrLower,
    RequestVersionOrHigher,
    RequestVersionExact,
}

#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl RequestBody {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Buffered bytes, if the body is not streamed.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug)]
pub struct BuiltRequest {
    pub method: Method,
    pub url: Url,
    pub version: Option<Version>,
    pub version_policy: VersionPolicy,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub properties: RequestProperties,
}

#[derive(Debug)]
pub struct TransportError(FxError);

impl TransportError {
    #[inline]
    pub fn new(e: impl Error + Send + Sync + 'static) -> Self {
        Self(Box::new(e))
    }

    #[inline]
    pub fn boxed(e: FxError) -> Self {
        Self(e)
    }

    pub fn message(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Self(msg.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.0)
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e)
    }
}

pub trait TransportBody: Send + 'static {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>>;
}

pub struct TransportResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
    pub body: Box<dyn TransportBody>,
}

/// Injectable transport layer.
///
/// Contract:
/// - Resolves as soon as the response headers are available; the body is
///   pulled lazily through [`TransportBody`].
/// - Dropping the body releases the underlying connection.
/// - Must not leak a concrete HTTP client type in its public surface.
pub trait Transport: Send + Sync + 'static {
    fn send<'a>(
        &'a self,
        req: BuiltRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;
}

#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestTransport {
    #[inline]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[inline]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[cfg(feature = "reqwest")]
struct ReqwestBody {
    resp: reqwest::Response,
}

#[cfg(feature = "reqwest")]
impl TransportBody for ReqwestBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>> {
        Box::pin(async move { self.resp.chunk().await.map_err(TransportError::from) })
    }
}

#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        req: BuiltRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let BuiltRequest {
                method,
                url,
                version,
                version_policy,
                headers,
                body,
                properties: _,
            } = req;
            let mut rb = self.client.request(method, url).headers(headers);
            // reqwest negotiates upwards by itself.
            if let Some(v) = version
                && version_policy != VersionPolicy::RequestVersionOrHigher
            {
                rb = rb.version(v);
            }
            rb = match body {
                RequestBody::Empty => rb,
                RequestBody::Bytes(b) => rb.body(b),
                RequestBody::Stream(s) => rb.body(reqwest::Body::wrap_stream(s)),
            };
            let resp = rb.send().await.map_err(TransportError::from)?;
            let status = resp.status();
            let version = resp.version();
            let headers = resp.headers().clone();
            let content_length = resp.content_length();
            Ok(TransportResponse {
                status,
                version,
                headers,
                content_length,
                body: Box::new(ReqwestBody { resp }),
            })
        })
    }
}

use crate::error::ApiError;
use crate::transport::{TransportBody, TransportError};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http::{HeaderMap, Method, StatusCode, Version};
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// Request line and response head of one exchange.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Body already read into memory, replayed as a single chunk.
pub(crate) struct BufferedBody(Option<Bytes>);

impl TransportBody for BufferedBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.0.take().filter(|b| !b.is_empty())) })
    }
}

pub(crate) async fn read_body_all(body: &mut dyn TransportBody) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    while let Some(chunk) = body.next_chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// A live response as seen by [`ResponseErrorFactory`](crate::factory::ResponseErrorFactory).
/// Reading the body caches it, so later decoding still sees it.
pub struct InboundResponse {
    pub head: ResponseHead,
    pub content_length: Option<u64>,
    body: Box<dyn TransportBody>,
    read: Option<Bytes>,
}

impl InboundResponse {
    pub(crate) fn new(head: ResponseHead, content_length: Option<u64>, body: Box<dyn TransportBody>) -> Self {
        Self {
            head,
            content_length,
            body,
            read: None,
        }
    }

    /// Full body, read once.
    pub async fn bytes(&mut self) -> Result<Bytes, TransportError> {
        if let Some(b) = &self.read {
            return Ok(b.clone());
        }
        let b = read_body_all(self.body.as_mut()).await?;
        self.read = Some(b.clone());
        Ok(b)
    }

    /// Best-effort body text; `None` when the body cannot be read.
    pub async fn text_lossy(&mut self) -> Option<String> {
        self.bytes()
            .await
            .ok()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    pub(crate) fn into_parts(self) -> (ResponseHead, Box<dyn TransportBody>) {
        match self.read {
            Some(b) => (self.head, Box::new(BufferedBody(Some(b)))),
            None => (self.head, self.body),
        }
    }
}

/// Response body handed to the caller; dropping it releases the response.
pub struct ResponseStream {
    body: Box<dyn TransportBody>,
}

impl ResponseStream {
    pub(crate) fn new(body: Box<dyn TransportBody>) -> Self {
        Self { body }
    }

    pub async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.body.next_chunk().await
    }

    pub async fn bytes(mut self) -> Result<Bytes, TransportError> {
        read_body_all(self.body.as_mut()).await
    }

    pub async fn text(self) -> Result<String, TransportError> {
        let b = self.bytes().await?;
        String::from_utf8(b.to_vec()).map_err(TransportError::new)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, TransportError>> + Send {
        futures::stream::unfold(Some(self.body), |state| async move {
            let mut body = state?;
            match body.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(body))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

/// The whole response, owned by the caller.
pub struct RawResponse {
    pub head: ResponseHead,
    pub body: ResponseStream,
}

impl RawResponse {
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }
}

/// Response content (headers + body) without the status line.
pub struct RawContent {
    pub headers: HeaderMap,
    pub body: ResponseStream,
}

/// Response envelope: status failures and undecodable bodies are captured in
/// [`ApiResponse::error`] instead of being raised.
pub struct ApiResponse<T> {
    head: ResponseHead,
    content: Option<T>,
    error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub(crate) fn new(head: ResponseHead, content: Option<T>, error: Option<ApiError>) -> Self {
        Self {
            head,
            content,
            error,
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.head.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    #[inline]
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.head.status.is_success() && self.error.is_none()
    }

    #[inline]
    pub fn content(&self) -> Option<&T> {
        self.content.as_ref()
    }

    #[inline]
    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    #[inline]
    pub fn into_content(self) -> Option<T> {
        self.content
    }

    /// Raise the captured error, if any.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.content),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ApiResponse<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiResponse")
            .field("status", &self.head.status)
            .field("content", &self.content)
            .field("error", &self.error)
            .finish()
    }
}

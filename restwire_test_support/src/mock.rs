use bytes::Bytes;
use futures::TryStreamExt;
use http::{HeaderMap, Method, StatusCode, Version};
use restwire_core::prelude::*;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: url::Url,
    pub version: Option<Version>,
    pub version_policy: VersionPolicy,
    pub headers: HeaderMap,
    /// Collected body; streamed bodies are read to the end.
    pub body: Option<Bytes>,
    /// The body arrived as a stream rather than a buffer.
    pub streamed: bool,
    pub properties: RequestProperties,
}

#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub delay: Option<Duration>,
    pub error: Option<String>,
}

impl MockReply {
    pub fn ok_json(body: Bytes) -> Self {
        Self::status(StatusCode::OK)
            .with_content_type("application/json")
            .with_body(body)
    }

    pub fn ok_text(body: Bytes) -> Self {
        Self::status(StatusCode::OK)
            .with_content_type("text/plain")
            .with_body(body)
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: None,
            error: None,
        }
    }

    /// `application/problem+json` error reply.
    pub fn problem(status: StatusCode, body: Bytes) -> Self {
        Self::status(status)
            .with_content_type("application/problem+json")
            .with_body(body)
    }

    /// The transport fails before any response exists.
    pub fn transport_error(message: impl Into<String>) -> Self {
        let mut r = Self::status(StatusCode::OK);
        r.error = Some(message.into());
        r
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_content_type(self, ct: &'static str) -> Self {
        self.with_header(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(ct),
        )
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Hold the response head back for `d`.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }
}

/// Body that counts itself released when dropped.
struct OneShotBody {
    chunk: Option<Bytes>,
    released: Arc<AtomicUsize>,
}

impl TransportBody for OneShotBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, TransportError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.chunk.take().filter(|b| !b.is_empty())) })
    }
}

impl Drop for OneShotBody {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MockState {
    recorded: Mutex<Vec<RecordedRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
    released: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct MockTransport {
    st: Arc<MockState>,
}

pub struct MockHandle {
    st: Arc<MockState>,
    finished: bool,
}

#[derive(Default)]
pub struct MockBuilder {
    replies: Vec<MockReply>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, r: MockReply) -> Self {
        self.replies.push(r);
        self
    }

    pub fn replies(mut self, rs: impl IntoIterator<Item = MockReply>) -> Self {
        self.replies.extend(rs);
        self
    }

    pub fn build(self) -> (MockTransport, MockHandle) {
        let st = Arc::new(MockState {
            recorded: Mutex::new(Vec::new()),
            replies: Mutex::new(self.replies.into_iter().collect()),
            released: Arc::new(AtomicUsize::new(0)),
        });
        (
            MockTransport { st: st.clone() },
            MockHandle {
                st,
                finished: false,
            },
        )
    }
}

pub fn mock() -> MockBuilder {
    MockBuilder::new()
}

impl MockHandle {
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.st.recorded.lock().unwrap().clone()
    }

    pub fn last(&self) -> RecordedRequest {
        self.st
            .recorded
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was recorded")
    }

    pub fn recorded_len(&self) -> usize {
        self.st.recorded.lock().unwrap().len()
    }

    pub fn assert_recorded_len(&self, expected: usize) {
        let got = self.recorded_len();
        if got != expected {
            let reqs = self.recorded();
            panic!(
                "recorded request count mismatch\n  expected: {expected}\n  got: {got}\n  recorded:\n{:#?}",
                reqs
            );
        }
    }

    /// Response bodies dropped so far.
    pub fn released(&self) -> usize {
        self.st.released.load(Ordering::SeqCst)
    }

    pub fn remaining_replies(&self) -> usize {
        self.st.replies.lock().unwrap().len()
    }

    pub fn assert_no_remaining_replies(&self) {
        let left = self.remaining_replies();
        if left != 0 {
            panic!("mock replies not fully consumed: remaining={left}");
        }
    }

    pub fn finish(mut self) {
        self.assert_no_remaining_replies();
        self.finished = true;
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            return;
        }
        let left = self.st.replies.lock().unwrap().len();
        if left != 0 {
            panic!("mock replies not fully consumed (drop): remaining={left}");
        }
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        req: BuiltRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>> {
        let st = self.st.clone();
        Box::pin(async move {
            let BuiltRequest {
                method,
                url,
                version,
                version_policy,
                headers,
                body,
                properties,
            } = req;
            let (body, streamed) = match body {
                RequestBody::Empty => (None, false),
                RequestBody::Bytes(b) => (Some(b), false),
                RequestBody::Stream(s) => {
                    let chunks: Vec<Bytes> = s.try_collect().await.map_err(TransportError::boxed)?;
                    (Some(Bytes::from(chunks.concat())), true)
                }
            };

            // record
            st.recorded.lock().unwrap().push(RecordedRequest {
                method,
                url,
                version,
                version_policy,
                headers,
                body,
                streamed,
                properties,
            });

            // pop reply
            let reply = {
                let mut g = st.replies.lock().unwrap();
                g.pop_front().unwrap_or_else(|| {
                    let last = st.recorded.lock().unwrap().last().cloned();
                    panic!(
                        "MockTransport: no more scripted replies, but send() was called.\nlast_request={:#?}",
                        last
                    );
                })
            };

            if let Some(d) = reply.delay {
                tokio::time::sleep(d).await;
            }
            if let Some(msg) = reply.error {
                return Err(TransportError::message(msg));
            }

            Ok(TransportResponse {
                status: reply.status,
                version: Version::HTTP_11,
                headers: reply.headers,
                content_length: Some(reply.body.len() as u64),
                body: Box::new(OneShotBody {
                    chunk: Some(reply.body),
                    released: st.released.clone(),
                }),
            })
        })
    }
}

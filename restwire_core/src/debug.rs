use crate::codec::{self, Format};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::borrow::Cow;

/// Longest body excerpt written by [`StderrDebugSink`].
pub const BODY_PREVIEW_CHARS: usize = 32 * 1024;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DebugLevel {
    #[default]
    None,
    V,
    VV,
}

impl DebugLevel {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self != DebugLevel::None
    }

    #[inline]
    pub fn is_verbose(self) -> bool {
        self >= DebugLevel::V
    }

    #[inline]
    pub fn is_very_verbose(self) -> bool {
        self >= DebugLevel::VV
    }

    fn tag(self) -> &'static str {
        match self {
            DebugLevel::None => "none",
            DebugLevel::V => "v",
            DebugLevel::VV => "vv",
        }
    }
}

impl core::fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One step of an exchange, as seen by a [`DebugSink`].
#[derive(Debug)]
pub enum DebugEvent<'a> {
    Request {
        method: &'a Method,
        url: &'a str,
        operation: &'a str,
    },
    RequestHeaders(&'a HeaderMap),
    RequestBody {
        body: &'a Bytes,
        format: Format,
    },
    Status {
        status: StatusCode,
        url: &'a str,
    },
    ResponseHeaders(&'a HeaderMap),
    ResponseBody {
        body: &'a Bytes,
        format: Format,
    },
    /// Body of a response the error factory rejected.
    ErrorBody {
        headers: &'a HeaderMap,
        body: &'a Bytes,
        full_len: Option<usize>,
    },
    Cancelled {
        url: &'a str,
    },
}

impl DebugEvent<'_> {
    /// Lowest level at which the event is reported.
    pub fn level(&self) -> DebugLevel {
        match self {
            DebugEvent::Request { .. } | DebugEvent::Status { .. } | DebugEvent::Cancelled { .. } => {
                DebugLevel::V
            }
            _ => DebugLevel::VV,
        }
    }
}

pub trait DebugSink: Send + Sync + 'static {
    fn event(&self, level: DebugLevel, event: &DebugEvent<'_>);
}

impl<F> DebugSink for F
where
    F: Fn(DebugLevel, &DebugEvent<'_>) + Send + Sync + 'static,
{
    #[inline]
    fn event(&self, level: DebugLevel, event: &DebugEvent<'_>) {
        self(level, event)
    }
}

/// Forward `event` to `sink` when `level` admits it.
pub(crate) fn trace(sink: &dyn DebugSink, level: DebugLevel, event: DebugEvent<'_>) {
    if level.is_enabled() && level >= event.level() {
        sink.event(level, &event);
    }
}

#[derive(Default)]
pub struct NoopDebugSink;

impl DebugSink for NoopDebugSink {
    #[inline]
    fn event(&self, _: DebugLevel, _: &DebugEvent<'_>) {}
}

/// Writes `[restwire:<level>]` lines to stderr, redacting credentials.
#[derive(Default)]
pub struct StderrDebugSink;

impl StderrDebugSink {
    fn headers(level: DebugLevel, what: &str, headers: &HeaderMap) {
        eprintln!("[restwire:{level}] {what} headers:");
        for (k, v) in headers {
            eprintln!("  {k}: {}", redact(k, v));
        }
    }

    fn body(level: DebugLevel, what: &str, body: &Bytes, format: Format) {
        let preview = codec::format_bytes_for_debug(format, body, BODY_PREVIEW_CHARS);
        eprintln!("[restwire:{level}] {what} body ({} bytes): {preview}", body.len());
    }
}

impl DebugSink for StderrDebugSink {
    fn event(&self, level: DebugLevel, event: &DebugEvent<'_>) {
        match event {
            DebugEvent::Request {
                method,
                url,
                operation,
            } => eprintln!("[restwire:{level}] -> {method} {url} ({operation})"),
            DebugEvent::RequestHeaders(h) => Self::headers(level, "request", h),
            DebugEvent::RequestBody { body, format } => Self::body(level, "request", body, *format),
            DebugEvent::Status { status, url } => {
                let tag = if status.is_success() { "ok" } else { "error" };
                eprintln!("[restwire:{level}] <- {} {url} ({tag})", status.as_u16());
            }
            DebugEvent::ResponseHeaders(h) => Self::headers(level, "response", h),
            DebugEvent::ResponseBody { body, format } => {
                Self::body(level, "response", body, *format)
            }
            DebugEvent::ErrorBody {
                headers,
                body,
                full_len,
            } => {
                let preview = crate::error::body_as_text(headers, body, *full_len);
                eprintln!("[restwire:{level}] error body: {preview}");
            }
            DebugEvent::Cancelled { url } => eprintln!("[restwire:{level}] x {url} (cancelled)"),
        }
    }
}

const SENSITIVE: &[&str] = &["authorization", "proxy-authorization", "cookie", "set-cookie"];
const SENSITIVE_PARTS: &[&str] = &["token", "secret", "api-key", "apikey"];

fn is_sensitive(name: &HeaderName) -> bool {
    // lowercase already
    let n = name.as_str();
    SENSITIVE.contains(&n) || SENSITIVE_PARTS.iter().any(|p| n.contains(p)) || n.ends_with("-key")
}

fn redact<'v>(name: &HeaderName, value: &'v HeaderValue) -> Cow<'v, str> {
    if is_sensitive(name) {
        return Cow::Borrowed("<redacted>");
    }
    match value.to_str() {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Borrowed("<non-utf8>"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http::header::{ACCEPT, AUTHORIZATION, COOKIE};
    use std::sync::{Arc, Mutex};

    #[test]
    fn credentials_are_redacted() {
        assert!(is_sensitive(&AUTHORIZATION));
        assert!(is_sensitive(&COOKIE));
        assert!(is_sensitive(&HeaderName::from_static("x-session-token")));
        assert!(is_sensitive(&HeaderName::from_static("x-tenant-key")));
        assert!(!is_sensitive(&ACCEPT));

        let secret = HeaderValue::from_static("Bearer s3cr3t");
        assert_eq!(redact(&AUTHORIZATION, &secret), "<redacted>");
        let json = HeaderValue::from_static("application/json");
        assert_eq!(redact(&ACCEPT, &json), "application/json");
    }

    #[test]
    fn events_are_filtered_by_level() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = move |_: DebugLevel, e: &DebugEvent<'_>| {
            s.lock().unwrap().push(format!("{:?}", e.level()));
        };
        let headers = HeaderMap::new();
        let status = || DebugEvent::Status {
            status: StatusCode::OK,
            url: "https://example.com/",
        };

        trace(&sink, DebugLevel::None, status());
        trace(&sink, DebugLevel::V, status());
        trace(&sink, DebugLevel::V, DebugEvent::ResponseHeaders(&headers));
        trace(&sink, DebugLevel::VV, DebugEvent::ResponseHeaders(&headers));

        assert_eq!(*seen.lock().unwrap(), vec!["V", "VV"]);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(!DebugLevel::None.is_enabled());
        assert!(DebugLevel::V.is_verbose() && !DebugLevel::V.is_very_verbose());
        assert!(DebugLevel::VV.is_very_verbose());
        assert_eq!(DebugLevel::VV.to_string(), "vv");
    }
}

//! Sending an assembled request and turning the response into a payload.

use crate::codec;
use crate::debug::DebugEvent;
use crate::decode::{Payload, PayloadError, ResultDecoder};
use crate::error::{ApiError, FxError};
use crate::factory::deserialization_exception;
use crate::request::AssembledRequest;
use crate::response::{InboundResponse, RawContent, RawResponse, ResponseHead, ResponseStream};
use crate::settings::Settings;
use crate::transport::Transport;
use bytes::Bytes;
use restwire_descriptor::shape::DecodeTarget;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Send the request and wait for the response head.
pub(crate) async fn exchange<T: Transport + ?Sized>(
    transport: &T,
    settings: &Settings,
    base: &Url,
    mut req: AssembledRequest,
    operation: &str,
) -> Result<InboundResponse, ApiError> {
    req.materialize().await?;
    let method = req.method.clone();
    let url = req.url.clone().unwrap_or_else(|| base.clone());

    settings.trace(DebugEvent::Request {
        method: &method,
        url: url.as_str(),
        operation,
    });
    if settings.debug_level().is_very_verbose() {
        let headers = req.wire_headers();
        settings.trace(DebugEvent::RequestHeaders(&headers));
        if let Some(body) = req.buffered_body() {
            let ct = headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            settings.trace(DebugEvent::RequestBody {
                body,
                format: codec::format_for_content_type(ct),
            });
        }
    }

    let resp = transport.send(req.into_built(base)).await?;

    settings.trace(DebugEvent::Status {
        status: resp.status,
        url: url.as_str(),
    });
    settings.trace(DebugEvent::ResponseHeaders(&resp.headers));

    let head = ResponseHead {
        method,
        url,
        status: resp.status,
        version: resp.version,
        headers: resp.headers,
    };
    Ok(InboundResponse::new(head, resp.content_length, resp.body))
}

/// Ask the configured factory whether the response is an error.
pub(crate) async fn check(settings: &Settings, inbound: &mut InboundResponse) -> Option<ApiError> {
    let err = settings.response_errors().create(inbound).await?;
    if settings.debug_level().is_very_verbose()
        && let Ok(body) = inbound.bytes().await
    {
        settings.trace(DebugEvent::ErrorBody {
            headers: &inbound.head.headers,
            body: &body,
            full_len: inbound.content_length.map(|n| n as usize),
        });
    }
    Some(err)
}

fn debug_body(settings: &Settings, head: &ResponseHead, body: &Bytes) {
    settings.trace(DebugEvent::ResponseBody {
        body,
        format: codec::format_for_content_type(head.content_type()),
    });
}

pub(crate) fn deserialization_error(
    settings: &Settings,
    head: &ResponseHead,
    content: &Bytes,
    error: FxError,
) -> ApiError {
    match settings.deserialization_errors() {
        Some(f) => f.create(head, content, error),
        None => deserialization_exception(head, content, error),
    }
}

/// Decode a successful response. The response is released on return unless
/// the target hands it to the caller.
pub(crate) async fn decode(
    settings: &Settings,
    mut inbound: InboundResponse,
    target: DecodeTarget,
) -> Result<Payload, ApiError> {
    match target {
        DecodeTarget::Unit => {
            inbound.bytes().await?;
            Ok(Payload::Unit)
        }
        DecodeTarget::RawResponse => {
            let (head, body) = inbound.into_parts();
            Ok(Payload::Raw(RawResponse {
                head,
                body: ResponseStream::new(body),
            }))
        }
        DecodeTarget::RawContent => {
            let (head, body) = inbound.into_parts();
            Ok(Payload::Content(RawContent {
                headers: head.headers,
                body: ResponseStream::new(body),
            }))
        }
        DecodeTarget::Stream => {
            let (_, body) = inbound.into_parts();
            Ok(Payload::Stream(ResponseStream::new(body)))
        }
        DecodeTarget::Text => {
            let raw = inbound.bytes().await?;
            debug_body(settings, &inbound.head, &raw);
            match String::from_utf8(raw.to_vec()) {
                Ok(s) => Ok(Payload::Text(s)),
                Err(e) => Err(deserialization_error(settings, &inbound.head, &raw, Box::new(e))),
            }
        }
        DecodeTarget::Deserialize => {
            let raw = inbound.bytes().await?;
            debug_body(settings, &inbound.head, &raw);
            match settings.serializer().deserialize(&raw) {
                Ok(value) => Ok(Payload::Value { value, raw }),
                Err(e) => Err(deserialization_error(settings, &inbound.head, &raw, e)),
            }
        }
    }
}

/// Convert a payload with the caller's decoder.
pub(crate) fn finish<D: ResultDecoder>(
    settings: &Settings,
    head: &ResponseHead,
    method: &str,
    payload: Payload,
) -> Result<D::Output, ApiError> {
    let raw = payload.raw().cloned().unwrap_or_default();
    D::from_payload(payload).map_err(|e| match e {
        PayloadError::Mismatch => ApiError::DecoderMismatch {
            method: method.to_string(),
            decoder: D::NAME,
        },
        PayloadError::Deserialize(e) => deserialization_error(settings, head, &raw, Box::new(e)),
    })
}

/// Run `fut` unless `token` fires first.
pub(crate) async fn cancellable<F, O>(
    settings: &Settings,
    token: Option<&CancellationToken>,
    url: &str,
    fut: F,
) -> Result<O, ApiError>
where
    F: Future<Output = Result<O, ApiError>>,
{
    let Some(token) = token else {
        return fut.await;
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            settings.trace(DebugEvent::Cancelled { url });
            Err(ApiError::Cancelled)
        }
        r = fut => r,
    }
}

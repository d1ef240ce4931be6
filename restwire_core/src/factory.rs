use crate::error::{ApiError, ApiException, FxError, ProblemDetails, ValidationApiException};
use crate::response::{InboundResponse, ResponseHead};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Decides whether a response is an error. Returning `None` lets decoding
/// proceed. The factory may read the body; decoding then sees the same bytes.
pub trait ResponseErrorFactory: Send + Sync + 'static {
    fn create<'a>(
        &'a self,
        response: &'a mut InboundResponse,
    ) -> Pin<Box<dyn Future<Output = Option<ApiError>> + Send + 'a>>;
}

/// Builds the error for a body that could not be decoded.
pub trait DeserializationErrorFactory: Send + Sync + 'static {
    fn create(&self, head: &ResponseHead, content: &Bytes, error: FxError) -> ApiError;
}

impl<F> DeserializationErrorFactory for F
where
    F: Fn(&ResponseHead, &Bytes, FxError) -> ApiError + Send + Sync + 'static,
{
    fn create(&self, head: &ResponseHead, content: &Bytes, error: FxError) -> ApiError {
        self(head, content, error)
    }
}

/// Non-2xx responses become [`ApiException`]s carrying the body text;
/// `application/problem+json` bodies become [`ValidationApiException`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultResponseErrorFactory;

impl ResponseErrorFactory for DefaultResponseErrorFactory {
    fn create<'a>(
        &'a self,
        response: &'a mut InboundResponse,
    ) -> Pin<Box<dyn Future<Output = Option<ApiError>> + Send + 'a>> {
        Box::pin(async move {
            if response.head.status.is_success() {
                return None;
            }
            let content = response.text_lossy().await;
            Some(exception_from(&response.head, content))
        })
    }
}

/// Snapshot a failed exchange, upgrading problem documents.
pub fn exception_from(head: &ResponseHead, content: Option<String>) -> ApiError {
    let mut ex = ApiException::new(
        head.method.clone(),
        head.url.clone(),
        head.status,
        head.headers.clone(),
    );
    let is_problem = head
        .content_type()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with(PROBLEM_JSON));
    if let Some(text) = content {
        let problem = is_problem
            .then(|| serde_json::from_str::<ProblemDetails>(&text).ok())
            .flatten();
        ex = ex.with_content(text);
        if let Some(problem) = problem {
            return ValidationApiException {
                exception: ex,
                problem,
            }
            .into();
        }
    }
    ex.into()
}

/// Default deserialization failure: an [`ApiException`] with the body text
/// and the decoder error as its source.
pub(crate) fn deserialization_exception(head: &ResponseHead, content: &Bytes, error: FxError) -> ApiError {
    ApiException::new(
        head.method.clone(),
        head.url.clone(),
        head.status,
        head.headers.clone(),
    )
    .with_content(String::from_utf8_lossy(content).into_owned())
    .with_source(error)
    .into()
}

#[cfg(test)]
mod test {
    use super::*;
    use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
    use url::Url;

    fn head(status: StatusCode, ct: Option<&'static str>) -> ResponseHead {
        let mut headers = HeaderMap::new();
        if let Some(ct) = ct {
            headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        ResponseHead {
            method: Method::POST,
            url: Url::parse("https://example.com/users").unwrap(),
            status,
            version: Version::HTTP_11,
            headers,
        }
    }

    #[test]
    fn problem_documents_become_validation_errors() {
        let h = head(StatusCode::BAD_REQUEST, Some("application/problem+json; charset=utf-8"));
        let err = exception_from(&h, Some(r#"{"title":"Invalid","errors":{"email":["bad"]}}"#.into()));
        let p = err.problem().unwrap();
        assert_eq!(p.title.as_deref(), Some("Invalid"));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(err.exception().unwrap().content.as_deref().unwrap().contains("email"));
    }

    #[test]
    fn malformed_problem_stays_plain_exception() {
        let h = head(StatusCode::BAD_REQUEST, Some("application/problem+json"));
        let err = exception_from(&h, Some("not json".into()));
        assert!(matches!(err, ApiError::Api(_)));
        assert_eq!(err.exception().unwrap().content.as_deref(), Some("not json"));
    }

    #[test]
    fn deserialization_failure_keeps_source() {
        let h = head(StatusCode::OK, Some("application/json"));
        let err = deserialization_exception(&h, &Bytes::from_static(b"{"), "eof".into());
        let ex = err.exception().unwrap();
        assert_eq!(ex.content.as_deref(), Some("{"));
        assert!(ex.source.is_some());
    }
}

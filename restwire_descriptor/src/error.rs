use thiserror::Error;

/// Resolution-time failure for a single method.
///
/// These abort descriptor building for the offending method only; the
/// surrounding [`DescriptorTable`](crate::DescriptorTable) keeps resolving the
/// remaining methods and reports the failure as a diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptorError {
    #[error("method has no HTTP verb and path annotation")]
    MissingHttpMethod,

    #[error("malformed path template `{template}`: {reason}")]
    MalformedPathTemplate {
        template: String,
        reason: &'static str,
    },

    #[error("path placeholder `{{{token}}}` does not match any parameter or parameter property")]
    UnresolvedPathToken { token: String },

    #[error("parameter `{parameter}` is bound ambiguously: {reason}")]
    AmbiguousPathBinding {
        parameter: String,
        reason: &'static str,
    },

    #[error("multiple body parameters ({}); specify the body explicitly with a single #[body]", .candidates.join(", "))]
    MultipleBodyCandidates { candidates: Vec<String> },

    #[error("only one header collection parameter is allowed ({})", .parameters.join(", "))]
    MultipleHeaderCollections { parameters: Vec<String> },

    #[error("only one authorization parameter is allowed ({})", .parameters.join(", "))]
    MultipleAuthorizationParameters { parameters: Vec<String> },

    #[error("only one cancellation parameter is allowed ({})", .parameters.join(", "))]
    MultipleCancellationParameters { parameters: Vec<String> },

    #[error("round-trip placeholder `{{**{token}}}` must bind a string parameter, `{parameter}` is `{type_name}`")]
    InvalidRoundTripType {
        token: String,
        parameter: String,
        type_name: String,
    },

    #[error("multipart requests cannot declare a body parameter (`{parameter}`)")]
    MultipartWithBody { parameter: String },

    #[error("header collection parameter `{parameter}` must be a string-to-string map, found `{type_name}`")]
    HeaderCollectionWrongType {
        parameter: String,
        type_name: String,
    },

    #[error("unsupported return shape `{type_name}`: expected an async result, an async unit or a deferred value")]
    UnsupportedReturnShape { type_name: String },
}

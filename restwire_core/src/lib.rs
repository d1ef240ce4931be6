mod args;
mod client;
mod codec;
mod debug;
mod decode;
mod deferred;
mod dispatch;
pub mod error;
mod factory;
mod format;
mod request;
mod response;
mod settings;
pub mod transport;
mod uri;

pub use restwire_descriptor;
pub use url::Url;

/// Items used by code generated with `#[rest_api]`.
pub mod internal {
    #[doc(hidden)]
    pub use crate::args::{Arg, Args, StreamSlot};
    #[doc(hidden)]
    pub use crate::decode::{
        AsDeserialized, AsRawContent, AsRawResponse, AsStream, AsText, AsUnit, Payload,
        PayloadError, ResultDecoder,
    };
    #[doc(hidden)]
    pub use restwire_descriptor::descriptor::{DescriptorTable, method_key};
    #[doc(hidden)]
    pub use restwire_descriptor::diagnostics::IgnoreDiagnostics;
    #[doc(hidden)]
    pub use restwire_descriptor::key::{MethodKey, ProcedureKey};
    #[doc(hidden)]
    pub use restwire_descriptor::meta::*;
    #[doc(hidden)]
    pub use bytes::Bytes;
    #[doc(hidden)]
    pub use http::Method;
    #[doc(hidden)]
    pub use serde_json::Value;
    #[doc(hidden)]
    pub use tokio_util::sync::CancellationToken;
}

pub mod codecs {
    pub use crate::codec::json::{JSON_CONTENT_TYPE, JsonContentSerializer};
    pub use crate::codec::{ContentSerializer, Format};
    pub use crate::format::{
        DefaultParameterFormatter, FormatContext, FormatTarget, ParameterFormatter,
    };
    pub use crate::request::{FORM_CONTENT_TYPE, OCTET_STREAM, TEXT_CONTENT_TYPE};
}

pub mod prelude {
    pub use crate::client::RestClient;
    pub use crate::debug::{DebugEvent, DebugLevel, DebugSink, NoopDebugSink, StderrDebugSink};
    pub use crate::deferred::{Deferred, Notification, Subscription};
    pub use crate::error::{
        ApiError, ApiException, ArgumentError, FxError, ProblemDetails, ValidationApiException,
    };
    pub use crate::factory::{
        DefaultResponseErrorFactory, DeserializationErrorFactory, PROBLEM_JSON,
        ResponseErrorFactory, exception_from,
    };
    pub use crate::response::{
        ApiResponse, InboundResponse, RawContent, RawResponse, ResponseHead, ResponseStream,
    };
    pub use crate::settings::Settings;
    #[cfg(feature = "reqwest")]
    pub use crate::transport::ReqwestTransport;
    pub use crate::transport::{
        BodyStream, BuiltRequest, RequestBody, RequestProperties, Transport, TransportBody,
        TransportError, TransportResponse, VersionPolicy,
    };
    pub use restwire_descriptor::emit::{INTERFACE_PROPERTY, METHOD_PROPERTY};
    pub use restwire_descriptor::meta::CollectionFormat;
    pub use tokio_util::sync::CancellationToken;
}

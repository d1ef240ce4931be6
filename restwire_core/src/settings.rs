use crate::codec::ContentSerializer;
use crate::codec::json::JsonContentSerializer;
use crate::debug::{self, DebugEvent, DebugLevel, DebugSink, StderrDebugSink};
use crate::factory::{
    DefaultResponseErrorFactory, DeserializationErrorFactory, ResponseErrorFactory,
};
use crate::format::{DefaultParameterFormatter, ParameterFormatter};
use crate::transport::{RequestProperties, VersionPolicy};
use http::Version;
use restwire_descriptor::meta::CollectionFormat;
use std::sync::Arc;

/// Client-wide configuration shared by every call.
#[derive(Clone)]
pub struct Settings {
    serializer: Arc<dyn ContentSerializer>,
    formatter: Arc<dyn ParameterFormatter>,
    response_errors: Arc<dyn ResponseErrorFactory>,
    deserialization_errors: Option<Arc<dyn DeserializationErrorFactory>>,
    buffered: bool,
    version: Option<Version>,
    version_policy: VersionPolicy,
    collection_format: CollectionFormat,
    properties: RequestProperties,
    debug_level: DebugLevel,
    debug_sink: Arc<dyn DebugSink>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            serializer: Arc::new(JsonContentSerializer),
            formatter: Arc::new(DefaultParameterFormatter),
            response_errors: Arc::new(DefaultResponseErrorFactory),
            deserialization_errors: None,
            buffered: false,
            version: None,
            version_policy: VersionPolicy::default(),
            collection_format: CollectionFormat::Multi,
            properties: RequestProperties::new(),
            debug_level: DebugLevel::None,
            debug_sink: Arc::new(StderrDebugSink),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_serializer(mut self, s: impl ContentSerializer) -> Self {
        self.serializer = Arc::new(s);
        self
    }

    #[inline]
    pub fn with_formatter(mut self, f: impl ParameterFormatter) -> Self {
        self.formatter = Arc::new(f);
        self
    }

    #[inline]
    pub fn with_response_error_factory(mut self, f: impl ResponseErrorFactory) -> Self {
        self.response_errors = Arc::new(f);
        self
    }

    #[inline]
    pub fn with_deserialization_error_factory(
        mut self,
        f: impl DeserializationErrorFactory,
    ) -> Self {
        self.deserialization_errors = Some(Arc::new(f));
        self
    }

    /// Default for bodies that do not say whether they are buffered.
    #[inline]
    pub fn with_buffered(mut self, v: bool) -> Self {
        self.buffered = v;
        self
    }

    #[inline]
    pub fn with_version(mut self, v: Version, policy: VersionPolicy) -> Self {
        self.version = Some(v);
        self.version_policy = policy;
        self
    }

    #[inline]
    pub fn with_collection_format(mut self, f: CollectionFormat) -> Self {
        self.collection_format = f;
        self
    }

    #[inline]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    #[inline]
    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    #[inline]
    pub fn with_debug_sink(mut self, sink: impl DebugSink) -> Self {
        self.debug_sink = Arc::new(sink);
        self
    }

    #[inline]
    pub fn serializer(&self) -> &dyn ContentSerializer {
        &*self.serializer
    }

    #[inline]
    pub fn formatter(&self) -> &dyn ParameterFormatter {
        &*self.formatter
    }

    #[inline]
    pub fn response_errors(&self) -> &dyn ResponseErrorFactory {
        &*self.response_errors
    }

    #[inline]
    pub fn deserialization_errors(&self) -> Option<&dyn DeserializationErrorFactory> {
        self.deserialization_errors.as_deref()
    }

    #[inline]
    pub fn buffered(&self) -> bool {
        self.buffered
    }

    #[inline]
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    #[inline]
    pub fn version_policy(&self) -> VersionPolicy {
        self.version_policy
    }

    #[inline]
    pub fn collection_format(&self) -> CollectionFormat {
        self.collection_format
    }

    #[inline]
    pub fn properties(&self) -> &RequestProperties {
        &self.properties
    }

    #[inline]
    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    #[inline]
    pub fn set_debug_level(&mut self, level: DebugLevel) {
        self.debug_level = level;
    }

    #[inline]
    pub fn debug_sink(&self) -> &dyn DebugSink {
        &*self.debug_sink
    }

    /// Report `event` to the sink if the debug level admits it.
    #[inline]
    pub(crate) fn trace(&self, event: DebugEvent<'_>) {
        debug::trace(&*self.debug_sink, self.debug_level, event);
    }
}

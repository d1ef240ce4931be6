use serde_json::Value;

/// Where a formatted parameter value ends up.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FormatTarget {
    PathSegment,
    Query,
    Header,
    Part,
}

#[derive(Copy, Clone, Debug)]
pub struct FormatContext<'a> {
    pub target: FormatTarget,
    /// Declared parameter name.
    pub parameter: &'a str,
    /// Wire key (query key, header name, part name), when there is one.
    pub key: Option<&'a str>,
}

impl<'a> FormatContext<'a> {
    #[inline]
    pub fn new(target: FormatTarget, parameter: &'a str) -> Self {
        Self {
            target,
            parameter,
            key: None,
        }
    }

    #[inline]
    pub fn key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }
}

/// Renders a single argument value as text. Escaping is not the
/// formatter's job; `None` means "no value".
pub trait ParameterFormatter: Send + Sync + 'static {
    fn format(&self, value: &Value, cx: &FormatContext<'_>) -> Option<String>;
}

/// Strings verbatim, numbers and booleans via their display form, `null` as
/// no value, anything else as compact JSON.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultParameterFormatter;

impl ParameterFormatter for DefaultParameterFormatter {
    fn format(&self, value: &Value, _cx: &FormatContext<'_>) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }
}

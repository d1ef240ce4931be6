use crate::error::FxError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use bytes::Bytes;
use serde_json::Value;

pub(crate) mod form;
pub(crate) mod json;
pub(crate) mod multipart;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    Binary,
    Text,
}

impl Format {
    pub fn into_encoded_string(self, bytes: Bytes) -> String {
        match self {
            Format::Binary => STANDARD_NO_PAD.encode(bytes),
            Format::Text => String::from_utf8_lossy(bytes.as_ref()).to_string(),
        }
    }
}

/// Turns body values into bytes and response bytes into values.
///
/// Values cross this boundary as [`serde_json::Value`]; a serializer for
/// another wire format maps that model onto its own.
pub trait ContentSerializer: Send + Sync + 'static {
    /// `Content-Type` of serialized bodies.
    fn content_type(&self) -> &str;

    /// How bodies of this type are previewed in debug output.
    fn format(&self) -> Format {
        Format::Text
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, FxError>;

    fn deserialize(&self, bytes: &Bytes) -> Result<Value, FxError>;

    /// Wire name of a field when values are flattened into form pairs.
    fn field_name(&self, field: &str) -> String {
        field.to_string()
    }
}

pub(crate) fn format_bytes_for_debug(format: Format, bytes: &[u8], max_chars: usize) -> String {
    if max_chars == 0 { return String::new(); }
    match format {
        Format::Text => {
            // Worst case UTF-8 expansion for lossy preview: cap by ~4 bytes per char.
            let max_bytes = max_chars.saturating_mul(4).max(1);
            let slice_len = bytes.len().min(max_bytes);
            let s0 = String::from_utf8_lossy(&bytes[..slice_len]).to_string();
            let mut s = truncate_for_debug(&s0, max_chars);
            if slice_len < bytes.len() && !s.ends_with('…') {
                s.push('…');
            }
            s
        }
        Format::Binary => {
            // base64 expands 3 bytes -> 4 chars. Inverse: chars -> bytes ≈ (chars*3)/4.
            let max_bytes = max_chars.saturating_mul(3).div_ceil(4).max(1);
            let slice_len = bytes.len().min(max_bytes);
            let s0 = STANDARD_NO_PAD.encode(&bytes[..slice_len]);
            let mut s = truncate_for_debug(&s0, max_chars);
            if slice_len < bytes.len() && !s.ends_with('…') {
                s.push('…');
            }
            s
        }
    }
}

pub(crate) fn truncate_for_debug(s: &str, max_chars: usize) -> String {
    if max_chars == 0 { return String::new(); }
    let mut it = s.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        match it.next() {
            Some(c) => out.push(c),
            None => return out,
        }
    }
    if it.next().is_some() {
        out.push('…');
    }
    out
}

/// Preview format for a body given its content type.
pub(crate) fn format_for_content_type(ct: Option<&str>) -> Format {
    if crate::error::is_textual(ct.unwrap_or("")) {
        Format::Text
    } else {
        Format::Binary
    }
}

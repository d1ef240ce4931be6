use crate::response::{RawContent, RawResponse, ResponseStream};
use bytes::Bytes;
use restwire_descriptor::shape::DecodeTarget;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// What dispatch produced for a call, before conversion to the caller's type.
pub enum Payload {
    Unit,
    Raw(RawResponse),
    Content(RawContent),
    Stream(ResponseStream),
    Text(String),
    /// Decoded content plus the bytes it came from, kept for error reports.
    Value { value: Value, raw: Bytes },
}

impl Payload {
    pub(crate) fn raw(&self) -> Option<&Bytes> {
        match self {
            Payload::Value { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload does not match the decoder")]
    Mismatch,
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),
}

/// Converts a dispatched payload into a call result. `TARGET` must equal the
/// target the method's descriptor declares.
pub trait ResultDecoder {
    type Output: Send + 'static;
    const TARGET: DecodeTarget;
    const NAME: &'static str;

    fn from_payload(payload: Payload) -> Result<Self::Output, PayloadError>;
}

pub struct AsUnit;

impl ResultDecoder for AsUnit {
    type Output = ();
    const TARGET: DecodeTarget = DecodeTarget::Unit;
    const NAME: &'static str = "unit";

    fn from_payload(payload: Payload) -> Result<(), PayloadError> {
        match payload {
            Payload::Unit => Ok(()),
            _ => Err(PayloadError::Mismatch),
        }
    }
}

pub struct AsText;

impl ResultDecoder for AsText {
    type Output = String;
    const TARGET: DecodeTarget = DecodeTarget::Text;
    const NAME: &'static str = "text";

    fn from_payload(payload: Payload) -> Result<String, PayloadError> {
        match payload {
            Payload::Text(s) => Ok(s),
            _ => Err(PayloadError::Mismatch),
        }
    }
}

pub struct AsDeserialized<T>(PhantomData<fn() -> T>);

impl<T: DeserializeOwned + Send + 'static> ResultDecoder for AsDeserialized<T> {
    type Output = T;
    const TARGET: DecodeTarget = DecodeTarget::Deserialize;
    const NAME: &'static str = "deserialized";

    fn from_payload(payload: Payload) -> Result<T, PayloadError> {
        match payload {
            Payload::Value { value, .. } => Ok(serde_json::from_value(value)?),
            _ => Err(PayloadError::Mismatch),
        }
    }
}

pub struct AsRawResponse;

impl ResultDecoder for AsRawResponse {
    type Output = RawResponse;
    const TARGET: DecodeTarget = DecodeTarget::RawResponse;
    const NAME: &'static str = "raw response";

    fn from_payload(payload: Payload) -> Result<RawResponse, PayloadError> {
        match payload {
            Payload::Raw(r) => Ok(r),
            _ => Err(PayloadError::Mismatch),
        }
    }
}

pub struct AsRawContent;

impl ResultDecoder for AsRawContent {
    type Output = RawContent;
    const TARGET: DecodeTarget = DecodeTarget::RawContent;
    const NAME: &'static str = "raw content";

    fn from_payload(payload: Payload) -> Result<RawContent, PayloadError> {
        match payload {
            Payload::Content(c) => Ok(c),
            _ => Err(PayloadError::Mismatch),
        }
    }
}

pub struct AsStream;

impl ResultDecoder for AsStream {
    type Output = ResponseStream;
    const TARGET: DecodeTarget = DecodeTarget::Stream;
    const NAME: &'static str = "stream";

    fn from_payload(payload: Payload) -> Result<ResponseStream, PayloadError> {
        match payload {
            Payload::Stream(s) => Ok(s),
            _ => Err(PayloadError::Mismatch),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
    }

    fn value(v: Value) -> Payload {
        Payload::Value {
            raw: Bytes::from(v.to_string()),
            value: v,
        }
    }

    #[test]
    fn deserialized_decoder_reads_values() {
        let u = AsDeserialized::<User>::from_payload(value(json!({"id": 3}))).unwrap();
        assert_eq!(u, User { id: 3 });
        assert!(matches!(
            AsDeserialized::<User>::from_payload(value(json!({"nope": 1}))),
            Err(PayloadError::Deserialize(_))
        ));
        assert!(matches!(
            AsDeserialized::<User>::from_payload(Payload::Unit),
            Err(PayloadError::Mismatch)
        ));
    }

    #[test]
    fn decoders_declare_their_targets() {
        assert_eq!(AsUnit::TARGET, DecodeTarget::Unit);
        assert_eq!(AsText::TARGET, DecodeTarget::Text);
        assert_eq!(AsStream::TARGET, DecodeTarget::Stream);
        assert_eq!(AsText::from_payload(Payload::Text("x".into())).unwrap(), "x");
    }
}

use crate::codec::{ContentSerializer, Format};
use crate::error::FxError;
use bytes::Bytes;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Default content serializer.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonContentSerializer;

impl ContentSerializer for JsonContentSerializer {
    fn content_type(&self) -> &str {
        JSON_CONTENT_TYPE
    }

    fn format(&self) -> Format {
        Format::Text
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, FxError> {
        Ok(serde_json::to_vec(value).map(Bytes::from)?)
    }

    fn deserialize(&self, bytes: &Bytes) -> Result<Value, FxError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_and_treats_empty_as_null() {
        let s = JsonContentSerializer;
        let b = s.serialize(&json!({"b": 1, "a": [true]})).unwrap();
        assert_eq!(&b[..], br#"{"b":1,"a":[true]}"#);
        assert_eq!(s.deserialize(&b).unwrap(), json!({"b": 1, "a": [true]}));
        assert_eq!(s.deserialize(&Bytes::new()).unwrap(), Value::Null);
        assert!(s.deserialize(&Bytes::from_static(b"{oops")).is_err());
    }
}

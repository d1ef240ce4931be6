use crate::error::ArgumentError;
use crate::transport::BodyStream;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// A streamed argument. Clones share the stream, so only the first dispatch
/// that takes it can send it.
#[derive(Clone)]
pub struct StreamSlot(Arc<Mutex<Option<BodyStream>>>);

impl StreamSlot {
    pub fn new(stream: BodyStream) -> Self {
        Self(Arc::new(Mutex::new(Some(stream))))
    }

    pub fn take(&self) -> Option<BodyStream> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[derive(Clone)]
pub enum Arg {
    Value(Value),
    Bytes(Bytes),
    Stream(StreamSlot),
    Cancellation(CancellationToken),
}

impl Arg {
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Value(_) => "a value",
            Arg::Bytes(_) => "bytes",
            Arg::Stream(_) => "a stream",
            Arg::Cancellation(_) => "a cancellation token",
        }
    }

    /// The argument seen as a plain value. Byte buffers read as arrays of
    /// numbers; streams and tokens have no value.
    pub fn to_value(&self) -> Value {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Bytes(b) => Value::Array(b.iter().map(|&x| Value::from(x)).collect()),
            Arg::Stream(_) | Arg::Cancellation(_) => Value::Null,
        }
    }
}

/// Call arguments in declaration order.
#[derive(Clone, Default)]
pub struct Args {
    items: Vec<Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value<T: Serialize + ?Sized>(mut self, name: &str, v: &T) -> Result<Self, ArgumentError> {
        let v = serde_json::to_value(v).map_err(|e| ArgumentError::Serialize {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.items.push(Arg::Value(v));
        Ok(self)
    }

    #[inline]
    pub fn bytes(mut self, b: impl Into<Bytes>) -> Self {
        self.items.push(Arg::Bytes(b.into()));
        self
    }

    #[inline]
    pub fn stream(mut self, s: BodyStream) -> Self {
        self.items.push(Arg::Stream(StreamSlot::new(s)));
        self
    }

    #[inline]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.items.push(Arg::Cancellation(token));
        self
    }

    #[inline]
    pub fn push(mut self, arg: Arg) -> Self {
        self.items.push(arg);
        self
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.items.get(index)
    }

    /// The argument at `index`, named `name` for error reporting.
    pub fn require(&self, index: usize, name: &str) -> Result<&Arg, ArgumentError> {
        self.items.get(index).ok_or_else(|| ArgumentError::Missing {
            index,
            name: name.to_string(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The declared cancellation token, if any argument is one.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.items.iter().find_map(|a| match a {
            Arg::Cancellation(t) => Some(t),
            _ => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::stream;
    use serde_json::json;

    #[test]
    fn builds_positional_args() {
        let token = CancellationToken::new();
        let args = Args::new()
            .value("id", &7u64)
            .unwrap()
            .value("name", "x")
            .unwrap()
            .bytes(Bytes::from_static(b"\x01\x02"))
            .cancellation(token.clone());
        assert_eq!(args.len(), 4);
        assert_eq!(args.get(0).map(Arg::to_value), Some(json!(7)));
        assert_eq!(args.get(1).map(Arg::to_value), Some(json!("x")));
        assert_eq!(args.get(2).map(Arg::to_value), Some(json!([1, 2])));
        assert!(args.cancellation_token().is_some());
    }

    #[test]
    fn stream_is_taken_once_across_clones() {
        let s: BodyStream = Box::pin(stream::empty::<Result<Bytes, crate::error::FxError>>());
        let args = Args::new().stream(s);
        let copy = args.clone();
        let Some(Arg::Stream(a)) = args.get(0) else { panic!("expected stream") };
        let Some(Arg::Stream(b)) = copy.get(0) else { panic!("expected stream") };
        assert!(a.take().is_some());
        assert!(b.take().is_none());
    }

    #[test]
    fn unserializable_values_are_argument_errors() {
        use std::collections::HashMap;
        let mut m: HashMap<(u8, u8), u8> = HashMap::new();
        m.insert((1, 2), 3);
        let err = Args::new().value("m", &m).err().unwrap();
        assert!(matches!(err, ArgumentError::Serialize { name, .. } if name == "m"));
    }
}

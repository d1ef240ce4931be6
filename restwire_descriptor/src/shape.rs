use crate::error::DescriptorError;
use crate::meta::{GenericConstraint, GenericParamRecord, OutputType, ReturnRecord, ReturnWrapper};

/// How the caller observes the call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// Awaitable with no value.
    FireAndForget,
    /// Awaitable producing a value.
    Value,
    /// Cold computation: every subscription performs its own dispatch.
    Deferred,
}

/// What the successful response body is turned into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecodeTarget {
    Unit,
    RawResponse,
    RawContent,
    Stream,
    Text,
    Deserialize,
}

impl DecodeTarget {
    /// The caller takes ownership of the live response.
    #[inline]
    pub fn caller_owned(self) -> bool {
        matches!(
            self,
            DecodeTarget::RawResponse | DecodeTarget::RawContent | DecodeTarget::Stream
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnDescriptor {
    pub shape: ReturnShape,
    pub target: DecodeTarget,
    /// Result wrapped in `ApiResponse<T>`.
    pub envelope: bool,
    /// Declared output, for diagnostics and generated code.
    pub type_name: String,
}

impl ReturnDescriptor {
    /// Drop the response once decoding is finished.
    #[inline]
    pub fn dispose_response(&self) -> bool {
        !self.target.caller_owned()
    }
}

pub fn classify_return(ret: &ReturnRecord) -> Result<ReturnDescriptor, DescriptorError> {
    let unsupported = || DescriptorError::UnsupportedReturnShape {
        type_name: ret.output.display_name(),
    };

    let (envelope, inner) = match &ret.output {
        OutputType::Envelope(inner) => {
            if matches!(**inner, OutputType::Envelope(_)) {
                return Err(unsupported());
            }
            (true, &**inner)
        }
        other => (false, other),
    };

    let target = match inner {
        OutputType::Unit => DecodeTarget::Unit,
        OutputType::RawResponse => DecodeTarget::RawResponse,
        OutputType::RawContent => DecodeTarget::RawContent,
        OutputType::Stream => DecodeTarget::Stream,
        OutputType::Text => DecodeTarget::Text,
        OutputType::Value(_) => DecodeTarget::Deserialize,
        OutputType::Envelope(_) => return Err(unsupported()),
    };

    let shape = match ret.wrapper {
        ReturnWrapper::Plain => return Err(unsupported()),
        ReturnWrapper::Deferred => ReturnShape::Deferred,
        ReturnWrapper::Future if target == DecodeTarget::Unit && !envelope => {
            ReturnShape::FireAndForget
        }
        ReturnWrapper::Future => ReturnShape::Value,
    };

    Ok(ReturnDescriptor {
        shape,
        target,
        envelope,
        type_name: ret.output.display_name(),
    })
}

/// Constraints that survive when a generated implementation restates a
/// generic signature structurally: only the reference/value kind is kept.
pub fn emitted_constraints(param: &GenericParamRecord) -> Vec<GenericConstraint> {
    param
        .constraints
        .iter()
        .filter(|c| {
            matches!(
                c,
                GenericConstraint::ReferenceType | GenericConstraint::ValueType
            )
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::TypeRef;

    #[test]
    fn classifies_shapes() {
        let r = classify_return(&ReturnRecord::future(OutputType::Unit)).unwrap();
        assert_eq!(r.shape, ReturnShape::FireAndForget);
        assert!(r.dispose_response());

        let r = classify_return(&ReturnRecord::future(OutputType::Value(TypeRef::structured(
            "User",
        ))))
        .unwrap();
        assert_eq!((r.shape, r.target), (ReturnShape::Value, DecodeTarget::Deserialize));

        let r = classify_return(&ReturnRecord::deferred(OutputType::Text)).unwrap();
        assert_eq!((r.shape, r.target), (ReturnShape::Deferred, DecodeTarget::Text));
    }

    #[test]
    fn raw_results_are_not_disposed() {
        for out in [OutputType::RawResponse, OutputType::RawContent, OutputType::Stream] {
            let r = classify_return(&ReturnRecord::future(out)).unwrap();
            assert!(!r.dispose_response());
        }
    }

    #[test]
    fn envelope_detection() {
        let r = classify_return(&ReturnRecord::future(OutputType::Envelope(Box::new(
            OutputType::Unit,
        ))))
        .unwrap();
        assert!(r.envelope);
        assert_eq!(r.shape, ReturnShape::Value);
        assert_eq!(r.type_name, "ApiResponse<()>");
    }

    #[test]
    fn rejects_plain_and_nested_envelopes() {
        assert!(classify_return(&ReturnRecord::plain(OutputType::Text)).is_err());
        let nested = OutputType::Envelope(Box::new(OutputType::Envelope(Box::new(
            OutputType::Text,
        ))));
        assert!(matches!(
            classify_return(&ReturnRecord::future(nested)),
            Err(DescriptorError::UnsupportedReturnShape { .. })
        ));
    }

    #[test]
    fn structural_filter_keeps_kind_constraints_only() {
        let g = GenericParamRecord::new("T")
            .constraint(GenericConstraint::ReferenceType)
            .constraint(GenericConstraint::NotNull)
            .constraint(GenericConstraint::DefaultConstructible)
            .constraint(GenericConstraint::Bound("Serialize".into()));
        assert_eq!(emitted_constraints(&g), vec![GenericConstraint::ReferenceType]);
    }
}

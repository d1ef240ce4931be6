//! Request-assembly emission.
//!
//! A descriptor is lowered into an ordered list of [`AssemblyStep`]s plus a
//! [`DispatchPlan`]. The runtime executes the steps in order against the call
//! arguments; no resolution happens after this point.

use crate::descriptor::{
    AuthorizationBinding, HeaderCollectionBinding, HeaderEntry, HeaderParameterBinding,
    MethodDescriptor, PartBinding, PathFragment, PropertyBinding, QueryBinding,
};
use crate::key::MethodKey;
use crate::meta::BodySerialization;
use crate::shape::{DecodeTarget, ReturnShape};
use http::Method;

pub const INTERFACE_PROPERTY: &str = "restwire.interface";
pub const METHOD_PROPERTY: &str = "restwire.method";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UriPlan {
    /// Path is a single constant and there are no query bindings.
    Fast(String),
    Incremental {
        fragments: Vec<PathFragment>,
        queries: Vec<QueryBinding>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssemblyStep {
    CreateRequest(Method),
    AttachBody {
        parameter: usize,
        serialization: BodySerialization,
        buffered: Option<bool>,
    },
    AttachMultipart {
        boundary: String,
        parts: Vec<PartBinding>,
    },
    /// Make sure a content object exists so content headers have a home.
    EnsureContent,
    WriteStaticHeaders(Vec<HeaderEntry>),
    WriteParameterHeader(HeaderParameterBinding),
    WriteHeaderCollection(HeaderCollectionBinding),
    WriteAuthorization(AuthorizationBinding),
    WriteSettingsProperties,
    WriteParameterProperty(PropertyBinding),
    WriteIdentityProperties { interface: String, method: String },
    ApplyVersionPolicy,
    BuildUri(UriPlan),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchPlan {
    pub shape: ReturnShape,
    pub target: DecodeTarget,
    pub envelope: bool,
    pub dispose_response: bool,
    pub cancellation: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyProcedure {
    pub key: MethodKey,
    pub method_name: String,
    pub steps: Vec<AssemblyStep>,
    pub dispatch: DispatchPlan,
}

pub fn emit(d: &MethodDescriptor) -> AssemblyProcedure {
    let mut steps = vec![AssemblyStep::CreateRequest(d.method.clone())];

    if let Some(mp) = &d.multipart {
        steps.push(AssemblyStep::AttachMultipart {
            boundary: mp.boundary.clone(),
            parts: mp.parts.clone(),
        });
    } else if let Some(body) = &d.body {
        steps.push(AssemblyStep::AttachBody {
            parameter: body.parameter,
            serialization: body.serialization,
            buffered: body.buffered,
        });
    }

    if d.has_header_sources() {
        steps.push(AssemblyStep::EnsureContent);
        if !d.headers.is_empty() {
            steps.push(AssemblyStep::WriteStaticHeaders(d.headers.clone()));
        }
        steps.extend(
            d.header_parameters
                .iter()
                .cloned()
                .map(AssemblyStep::WriteParameterHeader),
        );
        if let Some(c) = &d.header_collection {
            steps.push(AssemblyStep::WriteHeaderCollection(c.clone()));
        }
        if let Some(a) = &d.authorization {
            steps.push(AssemblyStep::WriteAuthorization(a.clone()));
        }
    }

    steps.push(AssemblyStep::WriteSettingsProperties);
    steps.extend(
        d.properties
            .iter()
            .cloned()
            .map(AssemblyStep::WriteParameterProperty),
    );
    steps.push(AssemblyStep::WriteIdentityProperties {
        interface: d.key.interface.clone(),
        method: d.name.clone(),
    });
    steps.push(AssemblyStep::ApplyVersionPolicy);
    steps.push(AssemblyStep::BuildUri(uri_plan(d)));

    AssemblyProcedure {
        key: d.key.clone(),
        method_name: d.name.clone(),
        steps,
        dispatch: DispatchPlan {
            shape: d.returns.shape,
            target: d.returns.target,
            envelope: d.returns.envelope,
            dispose_response: d.dispose_response,
            cancellation: d.cancellation,
        },
    }
}

fn uri_plan(d: &MethodDescriptor) -> UriPlan {
    if d.queries.is_empty() {
        match d.fragments.as_slice() {
            [] => return UriPlan::Fast(String::new()),
            [PathFragment::Constant(c)] => return UriPlan::Fast(c.clone()),
            _ => {}
        }
    }
    UriPlan::Incremental {
        fragments: d.fragments.clone(),
        queries: d.queries.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::build_descriptor;
    use crate::meta::{
        InterfaceRecord, MethodAnnotation, MethodRecord, OutputType, ParameterAnnotation,
        ParameterRecord, ReturnRecord, TypeRef,
    };
    use pretty_assertions::assert_eq;

    fn emit_one(iface: InterfaceRecord) -> AssemblyProcedure {
        let d = build_descriptor(&iface, &iface, &iface.methods[0]).unwrap();
        emit(&d)
    }

    #[test]
    fn constant_path_takes_fast_route() {
        let p = emit_one(InterfaceRecord::new("Api").method(
            MethodRecord::new("ping")
                .http(Method::GET, "/ping")
                .returns(ReturnRecord::future(OutputType::Unit)),
        ));
        assert_eq!(
            p.steps,
            vec![
                AssemblyStep::CreateRequest(Method::GET),
                AssemblyStep::WriteSettingsProperties,
                AssemblyStep::WriteIdentityProperties {
                    interface: "Api".into(),
                    method: "ping".into()
                },
                AssemblyStep::ApplyVersionPolicy,
                AssemblyStep::BuildUri(UriPlan::Fast("/ping".into())),
            ]
        );
        assert_eq!(p.dispatch.shape, ReturnShape::FireAndForget);
    }

    #[test]
    fn full_step_order() {
        let p = emit_one(
            InterfaceRecord::new("Api").header("Accept: application/json").method(
                MethodRecord::new("create")
                    .http(Method::POST, "/users/{org}")
                    .param(ParameterRecord::new("org", TypeRef::string()))
                    .param(ParameterRecord::new("user", TypeRef::structured("User")))
                    .param(
                        ParameterRecord::new("trace", TypeRef::string())
                            .annotate(ParameterAnnotation::Header("X-Trace".into())),
                    )
                    .param(ParameterRecord::new("token", TypeRef::string()).annotate(
                        ParameterAnnotation::Authorize {
                            scheme: "Bearer".into(),
                        },
                    ))
                    .param(
                        ParameterRecord::new("tenant", TypeRef::string())
                            .annotate(ParameterAnnotation::Property { key: None }),
                    )
                    .param(ParameterRecord::new("ct", TypeRef::cancellation()))
                    .returns(ReturnRecord::deferred(OutputType::Envelope(Box::new(
                        OutputType::Value(TypeRef::structured("User")),
                    )))),
            ),
        );
        let kinds: Vec<&'static str> = p
            .steps
            .iter()
            .map(|s| match s {
                AssemblyStep::CreateRequest(_) => "create",
                AssemblyStep::AttachBody { .. } => "body",
                AssemblyStep::AttachMultipart { .. } => "multipart",
                AssemblyStep::EnsureContent => "ensure",
                AssemblyStep::WriteStaticHeaders(_) => "static",
                AssemblyStep::WriteParameterHeader(_) => "header",
                AssemblyStep::WriteHeaderCollection(_) => "collection",
                AssemblyStep::WriteAuthorization(_) => "auth",
                AssemblyStep::WriteSettingsProperties => "settings",
                AssemblyStep::WriteParameterProperty(_) => "property",
                AssemblyStep::WriteIdentityProperties { .. } => "identity",
                AssemblyStep::ApplyVersionPolicy => "version",
                AssemblyStep::BuildUri(_) => "uri",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "create", "body", "ensure", "static", "header", "auth", "settings", "property",
                "identity", "version", "uri"
            ]
        );
        assert!(matches!(
            p.steps.last(),
            Some(AssemblyStep::BuildUri(UriPlan::Incremental { .. }))
        ));
        assert_eq!(
            p.dispatch,
            DispatchPlan {
                shape: ReturnShape::Deferred,
                target: DecodeTarget::Deserialize,
                envelope: true,
                dispose_response: true,
                cancellation: Some(5),
            }
        );
    }

    #[test]
    fn multipart_replaces_body() {
        let p = emit_one(
            InterfaceRecord::new("Api").method(
                MethodRecord::new("upload")
                    .http(Method::POST, "/up")
                    .annotate(MethodAnnotation::Multipart {
                        boundary: Some("XyZ".into()),
                    })
                    .param(ParameterRecord::new("name", TypeRef::string())),
            ),
        );
        assert!(matches!(
            &p.steps[1],
            AssemblyStep::AttachMultipart { boundary, parts } if boundary == "XyZ" && parts.len() == 1
        ));
    }

    #[test]
    fn query_bindings_force_incremental() {
        let p = emit_one(
            InterfaceRecord::new("Api").method(
                MethodRecord::new("search")
                    .http(Method::GET, "/search")
                    .param(ParameterRecord::new("q", TypeRef::string())),
            ),
        );
        assert!(matches!(
            p.steps.last(),
            Some(AssemblyStep::BuildUri(UriPlan::Incremental { queries, .. })) if queries.len() == 1
        ));
    }
}

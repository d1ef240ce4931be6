//! Parameter role classification.
//!
//! Every parameter receives exactly one [`ParameterRole`]. Precedence:
//! cancellation, path, body (explicit, then the POST/PUT/PATCH heuristic),
//! object-property, authorization, header, header collection, property and
//! finally query (or multipart part).

use crate::descriptor::{
    AuthorizationBinding, BodyDescriptor, HeaderCollectionBinding, HeaderParameterBinding,
    ParameterDescriptor, ParameterRole, PartBinding, PathFragment, PropertyBinding, QueryBinding,
};
use crate::error::DescriptorError;
use crate::meta::{
    BodySerialization, ParameterAnnotation, ParameterRecord, QueryOptions, TypeKind,
};
use crate::template::{Placeholder, RawFragment};
use http::Method;

pub const DEFAULT_QUERY_DELIMITER: &str = ".";

/// Everything the parameter list contributes to a descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterBindings {
    pub fragments: Vec<PathFragment>,
    pub parameters: Vec<ParameterDescriptor>,
    pub body: Option<BodyDescriptor>,
    pub header_parameters: Vec<HeaderParameterBinding>,
    pub header_collection: Option<HeaderCollectionBinding>,
    pub authorization: Option<AuthorizationBinding>,
    pub properties: Vec<PropertyBinding>,
    pub queries: Vec<QueryBinding>,
    pub parts: Vec<PartBinding>,
    pub cancellation: Option<usize>,
}

#[derive(Default, Clone)]
struct PathUse {
    whole: bool,
    properties: Vec<String>,
}

pub fn classify(
    method: &Method,
    template: &[RawFragment],
    params: &[ParameterRecord],
    multipart: bool,
) -> Result<ParameterBindings, DescriptorError> {
    let cancellation = find_cancellation(params)?;

    let mut uses = vec![PathUse::default(); params.len()];
    let fragments = bind_path(template, params, &mut uses)?;

    for (i, u) in uses.iter().enumerate() {
        if u.whole && !u.properties.is_empty() {
            return Err(DescriptorError::AmbiguousPathBinding {
                parameter: params[i].name.clone(),
                reason: "bound both as a whole path value and through its properties",
            });
        }
    }

    let body = find_body(method, params, &uses, multipart)?;

    let mut out = ParameterBindings {
        fragments,
        body,
        cancellation,
        ..Default::default()
    };
    let mut auth_params = Vec::new();
    let mut collection_params = Vec::new();

    for (index, p) in params.iter().enumerate() {
        let role = if Some(index) == cancellation {
            ParameterRole::Cancellation
        } else if uses[index].whole {
            ParameterRole::Path
        } else if out.body.as_ref().is_some_and(|b| b.parameter == index) {
            ParameterRole::Body
        } else if !uses[index].properties.is_empty() {
            out.queries.push(query_binding(
                index,
                p,
                uses[index].properties.clone(),
            ));
            ParameterRole::ObjectProperty
        } else if let Some(scheme) = authorize_scheme(p) {
            auth_params.push(p.name.clone());
            out.authorization = Some(AuthorizationBinding {
                parameter: index,
                scheme: scheme.to_string(),
            });
            ParameterRole::Authorization
        } else if let Some(name) = header_name(p) {
            out.header_parameters.push(HeaderParameterBinding {
                parameter: index,
                name: name.to_string(),
            });
            ParameterRole::Header
        } else if p.has(|a| matches!(a, ParameterAnnotation::HeaderCollection)) {
            if p.ty.kind != (TypeKind::Map { string_values: true }) {
                return Err(DescriptorError::HeaderCollectionWrongType {
                    parameter: p.name.clone(),
                    type_name: p.ty.name.clone(),
                });
            }
            collection_params.push(p.name.clone());
            out.header_collection = Some(HeaderCollectionBinding { parameter: index });
            ParameterRole::HeaderCollection
        } else if let Some(key) = property_key(p) {
            out.properties.push(PropertyBinding {
                parameter: index,
                key: key.unwrap_or(&p.name).to_string(),
            });
            ParameterRole::Property
        } else if multipart {
            let file_name = matches!(p.ty.kind, TypeKind::Bytes | TypeKind::Stream)
                .then(|| p.wire_name().to_string());
            out.parts.push(PartBinding {
                parameter: index,
                name: p.wire_name().to_string(),
                file_name,
            });
            ParameterRole::MultipartPart
        } else {
            out.queries.push(query_binding(index, p, Vec::new()));
            ParameterRole::Query
        };

        out.parameters.push(ParameterDescriptor {
            index,
            name: p.name.clone(),
            ty: p.ty.clone(),
            role,
        });
    }

    if auth_params.len() > 1 {
        return Err(DescriptorError::MultipleAuthorizationParameters {
            parameters: auth_params,
        });
    }
    if collection_params.len() > 1 {
        return Err(DescriptorError::MultipleHeaderCollections {
            parameters: collection_params,
        });
    }
    Ok(out)
}

fn find_cancellation(params: &[ParameterRecord]) -> Result<Option<usize>, DescriptorError> {
    let found: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.ty.kind == TypeKind::Cancellation)
        .map(|(i, _)| i)
        .collect();
    match found.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        _ => Err(DescriptorError::MultipleCancellationParameters {
            parameters: found.iter().map(|&i| params[i].name.clone()).collect(),
        }),
    }
}

fn find_param(params: &[ParameterRecord], name: &str) -> Option<usize> {
    params.iter().position(|p| {
        p.ty.kind != TypeKind::Cancellation
            && (p.name.eq_ignore_ascii_case(name) || p.wire_name().eq_ignore_ascii_case(name))
    })
}

fn bind_path(
    template: &[RawFragment],
    params: &[ParameterRecord],
    uses: &mut [PathUse],
) -> Result<Vec<PathFragment>, DescriptorError> {
    let mut out = Vec::with_capacity(template.len());
    for f in template {
        match f {
            RawFragment::Constant(c) => out.push(PathFragment::Constant(c.clone())),
            RawFragment::Token(t) => out.push(bind_token(t, params, uses)?),
        }
    }
    Ok(out)
}

fn bind_token(
    token: &Placeholder,
    params: &[ParameterRecord],
    uses: &mut [PathUse],
) -> Result<PathFragment, DescriptorError> {
    let unresolved = || DescriptorError::UnresolvedPathToken {
        token: token.source(),
    };
    let index = find_param(params, &token.name).ok_or_else(unresolved)?;
    let p = &params[index];

    let Some(property) = &token.property else {
        if token.round_trip {
            if !p.ty.is_string() {
                return Err(DescriptorError::InvalidRoundTripType {
                    token: token.source(),
                    parameter: p.name.clone(),
                    type_name: p.ty.name.clone(),
                });
            }
            uses[index].whole = true;
            return Ok(PathFragment::DynamicRoundTrip { parameter: index });
        }
        uses[index].whole = true;
        return Ok(PathFragment::Dynamic {
            parameter: index,
            type_name: p.ty.name.clone(),
        });
    };

    if token.round_trip {
        return Err(DescriptorError::AmbiguousPathBinding {
            parameter: p.name.clone(),
            reason: "round-trip placeholders cannot bind a property",
        });
    }
    if !p.ty.has_properties() {
        return Err(unresolved());
    }
    let (name, ty) = p.ty.find_property(property).ok_or_else(unresolved)?;
    let type_name = ty.map(|t| t.name.clone());
    if !uses[index].properties.iter().any(|n| n == &name) {
        uses[index].properties.push(name.clone());
    }
    Ok(PathFragment::DynamicProperty {
        parameter: index,
        property: name,
        type_name,
    })
}

/// The implicit-body heuristic skips query, header-collection and property
/// parameters only; a structured `Header` or `Authorize` parameter still counts.
fn find_body(
    method: &Method,
    params: &[ParameterRecord],
    uses: &[PathUse],
    multipart: bool,
) -> Result<Option<BodyDescriptor>, DescriptorError> {
    let explicit: Vec<(usize, Option<BodySerialization>, Option<bool>)> = params
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            p.annotations.iter().find_map(|a| match a {
                ParameterAnnotation::Body {
                    serialization,
                    buffered,
                } => Some((i, *serialization, *buffered)),
                _ => None,
            })
        })
        .collect();

    match explicit.as_slice() {
        [] => {}
        [(index, serialization, buffered)] => {
            let p = &params[*index];
            if multipart {
                return Err(DescriptorError::MultipartWithBody {
                    parameter: p.name.clone(),
                });
            }
            if uses[*index].whole {
                return Err(DescriptorError::AmbiguousPathBinding {
                    parameter: p.name.clone(),
                    reason: "a path-bound parameter cannot also be the body",
                });
            }
            return Ok(Some(BodyDescriptor {
                parameter: *index,
                serialization: serialization.unwrap_or_default(),
                buffered: *buffered,
            }));
        }
        _ => {
            return Err(DescriptorError::MultipleBodyCandidates {
                candidates: explicit.iter().map(|(i, ..)| params[*i].name.clone()).collect(),
            });
        }
    }

    if multipart || !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return Ok(None);
    }

    let candidates: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            !uses[*i].whole
                && p.ty.is_body_like()
                && !p.has(|a| {
                    matches!(
                        a,
                        ParameterAnnotation::Query(_)
                            | ParameterAnnotation::HeaderCollection
                            | ParameterAnnotation::Property { .. }
                    )
                })
        })
        .map(|(i, _)| i)
        .collect();

    match candidates.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(BodyDescriptor {
            parameter: *one,
            serialization: BodySerialization::Serialized,
            buffered: None,
        })),
        _ => Err(DescriptorError::MultipleBodyCandidates {
            candidates: candidates.iter().map(|&i| params[i].name.clone()).collect(),
        }),
    }
}

fn authorize_scheme(p: &ParameterRecord) -> Option<&str> {
    p.annotations.iter().find_map(|a| match a {
        ParameterAnnotation::Authorize { scheme } => Some(scheme.as_str()),
        _ => None,
    })
}

fn header_name(p: &ParameterRecord) -> Option<&str> {
    p.annotations.iter().find_map(|a| match a {
        ParameterAnnotation::Header(name) => Some(name.as_str()),
        _ => None,
    })
}

fn property_key(p: &ParameterRecord) -> Option<Option<&str>> {
    p.annotations.iter().find_map(|a| match a {
        ParameterAnnotation::Property { key } => Some(key.as_deref()),
        _ => None,
    })
}

fn query_binding(index: usize, p: &ParameterRecord, excluded: Vec<String>) -> QueryBinding {
    let opts = p
        .annotations
        .iter()
        .find_map(|a| match a {
            ParameterAnnotation::Query(o) => Some(o.clone()),
            _ => None,
        })
        .unwrap_or_default();
    let QueryOptions {
        format,
        prefix,
        delimiter,
    } = opts;
    QueryBinding {
        parameter: index,
        key: p.wire_name().to_string(),
        format,
        prefix,
        delimiter: delimiter.unwrap_or_else(|| DEFAULT_QUERY_DELIMITER.to_string()),
        excluded,
    }
}

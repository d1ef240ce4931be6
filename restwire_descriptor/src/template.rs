use crate::error::DescriptorError;

/// Unresolved path-template piece, before placeholders are matched to
/// parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawFragment {
    Constant(String),
    Token(Placeholder),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placeholder {
    /// Parameter name (or the receiver name for property placeholders).
    pub name: String,
    /// `receiver.property`: the part after the first dot.
    pub property: Option<String>,
    /// `{**name}`: slashes in the value are kept.
    pub round_trip: bool,
}

impl Placeholder {
    /// Token text as written, without the braces.
    pub fn source(&self) -> String {
        let mut s = String::new();
        if self.round_trip {
            s.push_str("**");
        }
        s.push_str(&self.name);
        if let Some(p) = &self.property {
            s.push('.');
            s.push_str(p);
        }
        s
    }
}

pub fn validate(template: &str) -> Result<(), DescriptorError> {
    if !template.is_empty() && !template.starts_with('/') {
        return Err(DescriptorError::MalformedPathTemplate {
            template: template.to_string(),
            reason: "path must start with '/'",
        });
    }
    if template.contains(['\r', '\n']) {
        return Err(DescriptorError::MalformedPathTemplate {
            template: template.to_string(),
            reason: "path must not contain line breaks",
        });
    }
    Ok(())
}

/// Split a relative path template into constants and placeholders.
///
/// A `{` that is not closed by a `}` before the next `/`, `?` or `{` is
/// literal text. Adjacent constant text is merged, so a template with no
/// placeholders is a single constant (or nothing, for the empty template).
pub fn tokenize(template: &str) -> Result<Vec<RawFragment>, DescriptorError> {
    validate(template)?;

    let mut out = Vec::new();
    let mut constant = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after
            .find(|c: char| matches!(c, '/' | '?' | '{' | '}'))
            .filter(|&i| after.as_bytes()[i] == b'}');

        let Some(close) = close else {
            constant.push_str(&rest[..=open]);
            rest = after;
            continue;
        };

        let body = &after[..close];
        if body.is_empty() || body == "**" {
            return Err(DescriptorError::MalformedPathTemplate {
                template: template.to_string(),
                reason: "empty placeholder",
            });
        }

        constant.push_str(&rest[..open]);
        if !constant.is_empty() {
            out.push(RawFragment::Constant(std::mem::take(&mut constant)));
        }
        out.push(RawFragment::Token(parse_placeholder(body)));
        rest = &after[close + 1..];
    }

    constant.push_str(rest);
    if !constant.is_empty() {
        out.push(RawFragment::Constant(constant));
    }
    Ok(out)
}

fn parse_placeholder(body: &str) -> Placeholder {
    let (round_trip, body) = match body.strip_prefix("**") {
        Some(b) => (true, b),
        None => (false, body),
    };
    match body.split_once('.') {
        Some((name, property)) => Placeholder {
            name: name.to_string(),
            property: Some(property.to_string()),
            round_trip,
        },
        None => Placeholder {
            name: body.to_string(),
            property: None,
            round_trip,
        },
    }
}

/// Reassemble a template; inverse of [`tokenize`].
pub fn render(fragments: &[RawFragment]) -> String {
    let mut s = String::new();
    for f in fragments {
        match f {
            RawFragment::Constant(c) => s.push_str(c),
            RawFragment::Token(p) => {
                s.push('{');
                s.push_str(&p.source());
                s.push('}');
            }
        }
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(name: &str) -> RawFragment {
        RawFragment::Token(Placeholder {
            name: name.to_string(),
            property: None,
            round_trip: false,
        })
    }

    fn constant(s: &str) -> RawFragment {
        RawFragment::Constant(s.to_string())
    }

    #[test]
    fn splits_constants_and_tokens() {
        let got = tokenize("/a/{x}/b").unwrap();
        assert_eq!(got, vec![constant("/a/"), token("x"), constant("/b")]);
    }

    #[test]
    fn empty_template_has_no_fragments() {
        assert_eq!(tokenize("").unwrap(), vec![]);
    }

    #[test]
    fn template_without_tokens_is_one_constant() {
        assert_eq!(tokenize("/users/list").unwrap(), vec![constant("/users/list")]);
    }

    #[test]
    fn round_trip_and_property_markers() {
        let got = tokenize("/files/{**path}/{req.id}").unwrap();
        assert_eq!(
            got,
            vec![
                constant("/files/"),
                RawFragment::Token(Placeholder {
                    name: "path".into(),
                    property: None,
                    round_trip: true,
                }),
                constant("/"),
                RawFragment::Token(Placeholder {
                    name: "req".into(),
                    property: Some("id".into()),
                    round_trip: false,
                }),
            ]
        );
    }

    #[test]
    fn unclosed_brace_is_literal() {
        let got = tokenize("/a/{b/{c}").unwrap();
        assert_eq!(got, vec![constant("/a/{b/"), token("c")]);
    }

    #[test]
    fn query_text_is_kept() {
        let got = tokenize("/search?q={q}&all=1").unwrap();
        assert_eq!(got, vec![constant("/search?q="), token("q"), constant("&all=1")]);
    }

    #[test]
    fn rejects_relative_and_multiline() {
        assert!(matches!(
            tokenize("users"),
            Err(DescriptorError::MalformedPathTemplate { .. })
        ));
        assert!(matches!(
            tokenize("/users\r\nX-Evil: 1"),
            Err(DescriptorError::MalformedPathTemplate { .. })
        ));
    }

    #[test]
    fn rejects_empty_placeholder() {
        assert!(tokenize("/a/{}").is_err());
    }

    #[test]
    fn render_inverts_tokenize() {
        for t in ["", "/", "/a/{x}/b", "/f/{**p}", "/u/{r.id}?x={y}", "/a/{b/{c}"] {
            assert_eq!(render(&tokenize(t).unwrap()), t);
        }
    }
}

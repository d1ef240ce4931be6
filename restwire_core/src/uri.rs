//! Request URI construction from a [`UriPlan`].

use crate::args::Args;
use crate::codec::form::{Flattener, Pairs, encode_pairs};
use crate::error::ApiError;
use crate::format::{FormatContext, FormatTarget};
use crate::settings::Settings;
use restwire_descriptor::descriptor::{MethodDescriptor, PathFragment, QueryBinding};
use restwire_descriptor::emit::UriPlan;
use serde_json::Value;
use url::Url;

/// Path under construction, seeded with the base path minus its trailing `/`.
pub(crate) struct PathBuffer {
    inner: String,
}

impl PathBuffer {
    pub fn new(base: &Url) -> Self {
        Self {
            inner: base.path().trim_end_matches('/').to_string(),
        }
    }

    /// Template text, inserted as written.
    #[inline]
    pub fn push_raw(&mut self, piece: &str) {
        self.inner.push_str(piece);
    }

    /// A value confined to one segment: `/` becomes `%2F`.
    #[inline]
    pub fn push_segment_encoded(&mut self, seg: &str) {
        self.inner.push_str(&percent_encode_path_segment(seg));
    }

    /// A value spanning segments: each segment is escaped, separators kept.
    pub fn push_segments_encoded(&mut self, value: &str) {
        for (i, seg) in value.split('/').enumerate() {
            if i > 0 {
                self.inner.push('/');
            }
            self.push_segment_encoded(seg);
        }
    }

    pub fn into_string(self) -> String {
        self.inner
    }
}

pub(crate) fn percent_encode_path_segment(seg: &str) -> String {
    // RFC3986 "unreserved": ALPHA / DIGIT / "-" / "." / "_" / "~"
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let bytes = seg.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        let unreserved = matches!(
          b,
          b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~'
        );
        if unreserved {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

static NULL: Value = Value::Null;

/// Field of a structured value: exact name first, then case-insensitive.
fn property<'v>(v: &'v Value, name: &str) -> &'v Value {
    let Value::Object(map) = v else {
        return &NULL;
    };
    map.get(name)
        .or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .unwrap_or(&NULL)
}

pub(crate) struct UriBuilder<'a> {
    pub base: &'a Url,
    pub descriptor: &'a MethodDescriptor,
    pub args: &'a Args,
    pub settings: &'a Settings,
}

impl UriBuilder<'_> {
    pub fn build(&self, plan: &UriPlan) -> Result<Url, ApiError> {
        let mut path = PathBuffer::new(self.base);
        let mut pairs = Pairs::new();
        match plan {
            UriPlan::Fast(constant) => path.push_raw(constant),
            UriPlan::Incremental { fragments, queries } => {
                for f in fragments {
                    self.fragment(f, &mut path)?;
                }
                for q in queries {
                    self.query(q, &mut pairs)?;
                }
            }
        }
        Ok(self.finish(path.into_string(), pairs))
    }

    fn name(&self, index: usize) -> &str {
        self.descriptor
            .parameters
            .get(index)
            .map(|p| p.name.as_str())
            .unwrap_or("")
    }

    fn value(&self, index: usize) -> Result<Value, ApiError> {
        Ok(self.args.require(index, self.name(index))?.to_value())
    }

    fn format(&self, index: usize, v: &Value) -> String {
        let cx = FormatContext::new(FormatTarget::PathSegment, self.name(index));
        self.settings.formatter().format(v, &cx).unwrap_or_default()
    }

    fn fragment(&self, f: &PathFragment, path: &mut PathBuffer) -> Result<(), ApiError> {
        match f {
            PathFragment::Constant(c) => path.push_raw(c),
            PathFragment::Dynamic { parameter, .. } => {
                let v = self.value(*parameter)?;
                path.push_segment_encoded(&self.format(*parameter, &v));
            }
            PathFragment::DynamicRoundTrip { parameter } => {
                let v = self.value(*parameter)?;
                path.push_segments_encoded(&self.format(*parameter, &v));
            }
            PathFragment::DynamicProperty {
                parameter,
                property: name,
                ..
            } => {
                let v = self.value(*parameter)?;
                path.push_segment_encoded(&self.format(*parameter, property(&v, name)));
            }
        }
        Ok(())
    }

    fn query(&self, q: &QueryBinding, out: &mut Pairs) -> Result<(), ApiError> {
        let v = self.value(q.parameter)?;
        let flattener = Flattener {
            formatter: self.settings.formatter(),
            serializer: self.settings.serializer(),
            collection_format: q.format.unwrap_or(self.settings.collection_format()),
            delimiter: &q.delimiter,
            parameter: self.name(q.parameter),
            target: FormatTarget::Query,
        };
        match &v {
            Value::Object(map) => flattener.object(q.prefix.as_deref(), map, &q.excluded, out),
            other => flattener.value(&q.key, other, out),
        }
        Ok(())
    }

    /// Split off a template query, then merge base, template and bound pairs.
    fn finish(&self, rendered: String, bound: Pairs) -> Url {
        let (path, template_query) = match rendered.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (rendered, None),
        };
        let mut pairs: Pairs = self.base.query_pairs().into_owned().collect();
        if let Some(q) = template_query {
            pairs.extend(url::form_urlencoded::parse(q.as_bytes()).into_owned());
        }
        pairs.extend(bound);

        let mut url = self.base.clone();
        url.set_path(&path);
        url.set_fragment(None);
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&encode_pairs(&pairs)));
        }
        url
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn segment_encoding_escapes_slash() {
        assert_eq!(percent_encode_path_segment("oct/cat"), "oct%2Fcat");
        assert_eq!(percent_encode_path_segment("a b~c"), "a%20b~c");
        assert_eq!(percent_encode_path_segment("é"), "%C3%A9");
    }

    #[test]
    fn path_buffer_trims_base_and_keeps_separators() {
        let base = Url::parse("https://example.com/api/").unwrap();
        let mut p = PathBuffer::new(&base);
        p.push_raw("/files/");
        p.push_segments_encoded("dir one/file.txt");
        assert_eq!(p.into_string(), "/api/files/dir%20one/file.txt");
    }

    #[test]
    fn property_lookup_ignores_case() {
        let v = serde_json::json!({"UserId": 4});
        assert_eq!(property(&v, "userid"), &serde_json::json!(4));
        assert_eq!(property(&v, "missing"), &Value::Null);
        assert_eq!(property(&serde_json::json!(1), "x"), &Value::Null);
    }
}

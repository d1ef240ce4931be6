//! Flattening of argument values into `key=value` pairs, shared by query
//! strings and url-encoded bodies.

use crate::codec::ContentSerializer;
use crate::format::{FormatContext, FormatTarget, ParameterFormatter};
use restwire_descriptor::meta::CollectionFormat;
use serde_json::{Map, Value};

pub(crate) type Pairs = Vec<(String, String)>;

pub(crate) struct Flattener<'a> {
    pub formatter: &'a dyn ParameterFormatter,
    pub serializer: &'a dyn ContentSerializer,
    pub collection_format: CollectionFormat,
    pub delimiter: &'a str,
    pub parameter: &'a str,
    pub target: FormatTarget,
}

impl Flattener<'_> {
    fn format(&self, key: &str, v: &Value) -> Option<String> {
        let cx = FormatContext::new(self.target, self.parameter).key(key);
        self.formatter.format(v, &cx)
    }

    /// Pairs for a value bound to `key`. Objects nest under `key`.
    pub fn value(&self, key: &str, v: &Value, out: &mut Pairs) {
        match v {
            Value::Null => {}
            Value::Array(items) => self.sequence(key, items, out),
            Value::Object(map) => self.object(Some(key), map, &[], out),
            scalar => {
                if let Some(s) = self.format(key, scalar) {
                    out.push((key.to_string(), s));
                }
            }
        }
    }

    /// Pairs for each field of `map`, keyed `prefix + delimiter + field` (or
    /// just the field name without a prefix). `excluded` fields are skipped.
    pub fn object(
        &self,
        prefix: Option<&str>,
        map: &Map<String, Value>,
        excluded: &[String],
        out: &mut Pairs,
    ) {
        for (field, v) in map {
            if excluded.iter().any(|e| e.eq_ignore_ascii_case(field)) {
                continue;
            }
            let name = self.serializer.field_name(field);
            let key = match prefix {
                Some(p) if !p.is_empty() => format!("{p}{}{name}", self.delimiter),
                _ => name,
            };
            self.value(&key, v, out);
        }
    }

    fn sequence(&self, key: &str, items: &[Value], out: &mut Pairs) {
        match self.collection_format.separator() {
            None => {
                for item in items {
                    self.value(key, item, out);
                }
            }
            Some(sep) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| self.format(key, item))
                    .collect();
                if !parts.is_empty() {
                    out.push((key.to_string(), parts.join(sep)));
                }
            }
        }
    }
}

pub(crate) fn encode_pairs(pairs: &Pairs) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::json::JsonContentSerializer;
    use crate::format::DefaultParameterFormatter;
    use serde_json::json;

    fn flattener(format: CollectionFormat) -> Flattener<'static> {
        Flattener {
            formatter: &DefaultParameterFormatter,
            serializer: &JsonContentSerializer,
            collection_format: format,
            delimiter: ".",
            parameter: "p",
            target: FormatTarget::Query,
        }
    }

    fn pairs(p: &[(&str, &str)]) -> Pairs {
        p.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn multi_repeats_key_and_csv_joins() {
        let mut out = Vec::new();
        flattener(CollectionFormat::Multi).value("id", &json!([1, 2, null]), &mut out);
        assert_eq!(out, pairs(&[("id", "1"), ("id", "2")]));

        let mut out = Vec::new();
        flattener(CollectionFormat::Csv).value("id", &json!([1, 2]), &mut out);
        assert_eq!(out, pairs(&[("id", "1,2")]));

        let mut out = Vec::new();
        flattener(CollectionFormat::Pipes).value("id", &json!([]), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn objects_flatten_with_prefix_and_exclusions() {
        let v = json!({"id": 7, "name": "x", "inner": {"a": true}, "skip": null});
        let Value::Object(map) = &v else { unreachable!() };

        let mut out = Vec::new();
        flattener(CollectionFormat::Multi).object(None, map, &["ID".to_string()], &mut out);
        assert_eq!(out, pairs(&[("name", "x"), ("inner.a", "true")]));

        let mut out = Vec::new();
        flattener(CollectionFormat::Multi).object(Some("q"), map, &[], &mut out);
        assert_eq!(
            out,
            pairs(&[("q.id", "7"), ("q.name", "x"), ("q.inner.a", "true")])
        );
    }

    #[test]
    fn encodes_as_form() {
        assert_eq!(encode_pairs(&pairs(&[("a b", "c&d"), ("e", "é")])), "a+b=c%26d&e=%C3%A9");
    }
}

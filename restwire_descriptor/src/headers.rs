use crate::descriptor::HeaderEntry;

/// Parse one `Name: Value` line. The value is everything after the first
/// colon; a line without a colon names a header to remove.
pub fn parse_header_line(line: &str) -> Option<HeaderEntry> {
    let (name, value) = match line.split_once(':') {
        Some((n, v)) => (n.trim(), Some(v.trim().to_string())),
        None => (line.trim(), None),
    };
    if name.is_empty() {
        return None;
    }
    Some(HeaderEntry {
        name: name.to_string(),
        value,
    })
}

/// Merge header scopes, lowest precedence first. A later scope replaces an
/// earlier entry with the same (case-insensitive) name in place.
pub fn merge_scopes<'a, S, I>(scopes: S) -> Vec<HeaderEntry>
where
    S: IntoIterator<Item = I>,
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<HeaderEntry> = Vec::new();
    for scope in scopes {
        for entry in scope.into_iter().filter_map(parse_header_line) {
            match out
                .iter_mut()
                .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
            {
                Some(existing) => existing.value = entry.value,
                None => out.push(entry),
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, value: Option<&str>) -> HeaderEntry {
        HeaderEntry {
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn splits_on_first_colon() {
        assert_eq!(
            parse_header_line(" X-Url :  http://a:8080 "),
            Some(entry("X-Url", Some("http://a:8080")))
        );
        assert_eq!(parse_header_line("X-Remove"), Some(entry("X-Remove", None)));
        assert_eq!(parse_header_line(": nope"), None);
    }

    #[test]
    fn later_scope_overrides_by_case_insensitive_name() {
        let iface = vec!["Accept: text/plain", "X-Api: 1"];
        let method = vec!["accept: application/json", "User-Agent"];
        let merged = merge_scopes([iface, method]);
        assert_eq!(
            merged,
            vec![
                entry("Accept", Some("application/json")),
                entry("X-Api", Some("1")),
                entry("User-Agent", None),
            ]
        );
    }
}

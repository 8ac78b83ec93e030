use memchr::memchr_iter;
use std::collections::BTreeMap;

/// Attribute name to attribute value, as stored in an entry's metadata.
pub type Attributes = BTreeMap<String, String>;

/// Parses a NUL-delimited table of alternating names and values.
///
/// Trailing empty tokens are dropped (the stored table ends with a NUL), an
/// odd token count is padded with an empty value, and later duplicates win.
/// Bytes that aren't valid UTF-8 are replaced with U+FFFD.
///
/// # Examples
///
/// ```rust
/// use cache2_entry::parse_attributes;
///
/// let attributes = parse_attributes(b"a\0b\0c");
/// assert_eq!(attributes["a"], "b");
/// assert_eq!(attributes["c"], "");
/// ```
pub fn parse_attributes(raw: &[u8]) -> Attributes {
    let mut tokens = Vec::new();
    let mut start = 0;
    for end in memchr_iter(0, raw) {
        tokens.push(&raw[start..end]);
        start = end + 1;
    }
    tokens.push(&raw[start..]);
    while tokens.last().is_some_and(|token| token.is_empty()) {
        tokens.pop();
    }
    if tokens.len() % 2 == 1 {
        tokens.push(b"");
    }
    tokens.chunks_exact(2).fold(Attributes::new(), |mut attributes, pair| {
        attributes.insert(text(pair[0]), text(pair[1]));
        attributes
    })
}

fn text(token: &[u8]) -> String {
    String::from_utf8_lossy(token).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[rstest]
    #[case(b"a\0b\0c", &[("a", "b"), ("c", "")])]
    #[case(b"a\0b\0", &[("a", "b")])]
    #[case(b"a\0b", &[("a", "b")])]
    #[case(b"", &[])]
    #[case(b"\0\0\0", &[])]
    #[case(b"k\0\0", &[("k", "")])]
    #[case(b"k\0\0j\0v\0", &[("k", ""), ("j", "v")])]
    #[case(b"\0v\0", &[("", "v")])]
    #[case(b"k\0first\0k\0second\0", &[("k", "second")])]
    fn parse(#[case] raw: &[u8], #[case] expected: &[(&str, &str)]) {
        assert_eq!(parse_attributes(raw), attrs(expected));
    }

    #[test]
    fn realistic_table() {
        let raw = b"request-method\0GET\0response-head\0HTTP/1.1 200 OK\r\nContent-Type: text/css\r\n\0net-response-time-onstart\0113\0";
        let attributes = parse_attributes(raw);
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes["request-method"], "GET");
        assert_eq!(attributes["net-response-time-onstart"], "113");
        assert!(attributes["response-head"].starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let attributes = parse_attributes(b"name\0caf\xe9\0");
        assert_eq!(attributes["name"], "caf\u{FFFD}");
    }
}

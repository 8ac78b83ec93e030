//! Header lookup inside the stored `response-head` attribute.

use crate::attrs::Attributes;
use crate::consts::{self, MAX_HEADER_PATTERNS, RESPONSE_HEAD};
use regex::{Regex, escape as regex_escape};
use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

static PATTERNS: LazyLock<RwLock<HashMap<String, Regex>>> = LazyLock::new(|| {
    let mut patterns = HashMap::new();
    patterns.insert("content-type".to_string(), consts::CONTENT_TYPE.clone());
    patterns.insert("content-encoding".to_string(), consts::CONTENT_ENCODING.clone());
    RwLock::new(patterns)
});

/// Header names fold ASCII case only.
pub(crate) fn pattern_source(name: &str) -> String {
    format!(r"(?m)^(?i-u:{}):[ \t]*([^\r\n]+)", regex_escape(name))
}

/// Returns the (memoized) pattern matching a `name:` header line.
///
/// Header names are case-insensitive, so patterns are keyed by the lower-cased
/// name. Once the table is full, further names are compiled on every call.
fn pattern(name: &str) -> Option<Regex> {
    let lowered = name.to_ascii_lowercase();
    if let Some(regex) = PATTERNS.read().unwrap_or_else(PoisonError::into_inner).get(&lowered) {
        return Some(regex.clone());
    }
    let regex = Regex::new(&pattern_source(name)).ok()?;
    let mut patterns = PATTERNS.write().unwrap_or_else(PoisonError::into_inner);
    if patterns.len() < MAX_HEADER_PATTERNS {
        patterns.entry(lowered).or_insert_with(|| regex.clone());
    }
    Some(regex)
}

fn capture(regex: &Regex, head: &str) -> Option<String> {
    regex.captures(head).and_then(|captures| captures.get(1)).map(|value| value.as_str().to_string())
}

/// Looks up a header value in the raw response headers stored under the
/// `response-head` attribute.
///
/// Matching is case-insensitive on the name, only considers lines that start
/// with `name:`, skips spaces and tabs after the colon and stops at the end
/// of the line.
///
/// # Examples
///
/// ```rust
/// use cache2_entry::{Attributes, response_header};
///
/// let mut attributes = Attributes::new();
/// attributes.insert("response-head".into(), "HTTP/1.1 200 OK\r\nETag: \"abc\"\r\n".into());
/// assert_eq!(response_header(&attributes, "etag").as_deref(), Some("\"abc\""));
/// assert_eq!(response_header(&attributes, "Content-Type"), None);
/// ```
pub fn response_header(attributes: &Attributes, name: &str) -> Option<String> {
    let head = attributes.get(RESPONSE_HEAD)?;
    capture(&pattern(name)?, head)
}

pub(crate) fn content_type(attributes: &Attributes) -> Option<String> {
    capture(&consts::CONTENT_TYPE, attributes.get(RESPONSE_HEAD)?)
}

pub(crate) fn content_encoding(attributes: &Attributes) -> Option<String> {
    capture(&consts::CONTENT_ENCODING, attributes.get(RESPONSE_HEAD)?)
}

//! Cache key decomposition.
//!
//! Stored keys carry their load context as comma-terminated tag tokens in
//! front of the URL, e.g. `a,:https://example.com/` for an anonymous load or
//! `O^partitionKey=...,:https://example.com/` for a partitioned one.

use memchr::memchr;

/// A cache key split into its load-context tags and the lookup key proper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitKey {
    /// The lookup key with tags and separating colon removed.
    pub key: String,
    /// Tag tokens in the order they appeared, leftmost first.
    pub tags: Vec<String>,
    /// Whether a leading `:` was dropped after the tags.
    pub colon: bool,
}

impl SplitKey {
    /// Splits leading tag tokens off a raw key.
    ///
    /// Never fails: scanning stops at the first prefix that is not a tag
    /// followed by a comma, and whatever remains becomes the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cache2_entry::SplitKey;
    ///
    /// let split = SplitKey::parse("p,b,i1,example:key");
    /// assert_eq!(split.tags, ["p", "b", "i1"]);
    /// assert_eq!(split.key, "example:key");
    /// ```
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw;
        let mut tags = Vec::new();
        while let Some(len) = tag_len(rest.as_bytes()) {
            tags.push(rest[..len].to_string());
            rest = &rest[len + 1..];
        }
        let (key, colon) = match rest.strip_prefix(':') {
            Some(key) => (key, true),
            None => (rest, false),
        };
        Self { key: key.to_string(), tags, colon }
    }

    /// Reassembles the key exactly as it was stored.
    pub fn to_raw(&self) -> String {
        let mut raw = String::with_capacity(self.key.len() + self.tags.iter().map(|t| t.len() + 1).sum::<usize>() + 1);
        for tag in &self.tags {
            raw.push_str(tag);
            raw.push(',');
        }
        if self.colon {
            raw.push(':');
        }
        raw.push_str(&self.key);
        raw
    }
}

/// Length of the tag token at the start of `key`, provided a comma follows it.
///
/// Alternatives are tried in order and the first one that matches wins.
fn tag_len(key: &[u8]) -> Option<usize> {
    flag_tag(key).or_else(|| id_tag(key)).or_else(|| value_tag(key))
}

/// `p`, `b` or `a`.
fn flag_tag(key: &[u8]) -> Option<usize> {
    match key {
        [b'p' | b'b' | b'a', b',', ..] => Some(1),
        _ => None,
    }
}

/// `i` followed by anything up to the next comma.
fn id_tag(key: &[u8]) -> Option<usize> {
    match key {
        [b'i', rest @ ..] => memchr(b',', rest).map(|comma| comma + 1),
        _ => None,
    }
}

/// A printable, non-colon character followed by a run of `,,` pairs or
/// non-comma bytes.
///
/// A doubled comma is an escaped comma inside the tag value. If the run hits
/// the end of the key without finding a lone comma, the first comma of the
/// last doubled pair terminates the tag instead.
fn value_tag(key: &[u8]) -> Option<usize> {
    let (&first, _) = key.split_first()?;
    if !(b' '..=b'~').contains(&first) || first == b':' {
        return None;
    }
    let mut pos = 1;
    let mut last_pair = None;
    loop {
        match key.get(pos..) {
            Some([b',', b',', ..]) => {
                last_pair = Some(pos);
                pos += 2;
            },
            Some([b',', ..]) => return Some(pos),
            Some([_, ..]) => pos += 1,
            _ => return last_pair,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("p,b,i1,example:key", &["p", "b", "i1"], "example:key", false)]
    #[case("a,:http://example.com/", &["a"], "http://example.com/", true)]
    #[case(":http://example.com/", &[], "http://example.com/", true)]
    #[case("http://example.com/", &[], "http://example.com/", false)]
    #[case("", &[], "", false)]
    #[case(
        "O^partitionKey=%28https%2Cexample.org%29,a,:https://example.com/app.js",
        &["O^partitionKey=%28https%2Cexample.org%29", "a"],
        "https://example.com/app.js",
        true
    )]
    #[case("~1612345678,:http://example.com/", &["~1612345678"], "http://example.com/", true)]
    #[case("xa,,b,rest", &["xa,,b"], "rest", false)]
    // Not a tag on its own; the doubled comma is what lets the scan back off.
    #[case("xa,,b", &["xa"], ",b", false)]
    #[case("i,a,:x", &["i", "a"], "x", true)]
    // `p` without a comma falls through to the generic alternative.
    #[case("pfoo,:x", &["pfoo"], "x", true)]
    fn split(#[case] raw: &str, #[case] tags: &[&str], #[case] key: &str, #[case] colon: bool) {
        let split = SplitKey::parse(raw);
        assert_eq!(split.tags, tags);
        assert_eq!(split.key, key);
        assert_eq!(split.colon, colon);
    }

    #[test]
    fn only_one_colon_is_stripped() {
        let split = SplitKey::parse("a,::odd");
        assert_eq!(split.key, ":odd");
    }

    #[test]
    fn colon_stops_tag_scan() {
        // A colon can't start a generic tag, so nothing after it is a tag.
        let split = SplitKey::parse(":p,b,rest");
        assert!(split.tags.is_empty());
        assert_eq!(split.key, "p,b,rest");
    }

    #[test]
    fn non_ascii_keys_are_preserved() {
        let split = SplitKey::parse("a,:https://例え.jp/ページ");
        assert_eq!(split.tags, ["a"]);
        assert_eq!(split.key, "https://例え.jp/ページ");
    }

    #[rstest]
    #[case("p,b,i1,example:key")]
    #[case("a,:http://example.com/")]
    #[case("xa,,b")]
    #[case("a,::odd")]
    #[case("O^firstPartyDomain=example.com,p,:https://example.com/?q=1,2")]
    fn to_raw_reproduces_stored_key(#[case] raw: &str) {
        assert_eq!(SplitKey::parse(raw).to_raw(), raw);
    }
}

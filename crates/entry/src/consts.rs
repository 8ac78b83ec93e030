use regex::Regex;
use std::sync::LazyLock;

/// Body bytes covered by each 2-byte chunk hash.
pub const HASH_CHUNK_SIZE: u32 = 256 * 1024;
/// Attribute holding the raw HTTP response headers.
pub const RESPONSE_HEAD: &str = "response-head";

pub(crate) const TRAILER_SIZE: u64 = 4;
pub(crate) const CHECKSUM_SIZE: u64 = 4;
pub(crate) const CHUNK_HASH_SIZE: u64 = 2;
pub(crate) const FIELD_SIZE: usize = 4;
/// Fields every metadata header carries; `flags` is an eighth from version 2 onwards.
pub(crate) const FIXED_FIELDS: usize = 7;
/// Upper bound on memoized header patterns, precomputed ones included.
pub(crate) const MAX_HEADER_PATTERNS: usize = 64;

macro_rules! header {
    ($name:ident, $header:expr) => {
        pub(crate) static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(&crate::header::pattern_source($header)).unwrap());
    };
}

header!(CONTENT_TYPE, "Content-Type");
header!(CONTENT_ENCODING, "Content-Encoding");

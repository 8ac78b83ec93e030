//! Read-only decoder for browser "cache2" entry files.
//!
//! Each entry file holds a cached HTTP response body followed by its
//! bookkeeping:
//!
//! ```text
//! [0 .. C)            response body (C = content_size)
//! [C .. C+4)          metadata checksum
//! [C+4 .. C+4+H)      2-byte hash per 256 KiB chunk of body
//! [C+4+H .. EOF-4)    metadata: fixed fields, key, NUL, attribute table
//! [EOF-4 .. EOF)      content_size, big-endian
//! ```
//!
//! None of the checksums are verified. Metadata is decoded eagerly by
//! [`decode`]; the body is only read on demand through
//! [`CacheEntry::content`].

mod attrs;
mod consts;
mod entry;
pub mod error;
#[cfg(test)]
mod fixture;
mod header;
mod key;
mod metadata;
mod source;

use std::path::Path;
use tracing::instrument;

pub use crate::attrs::{Attributes, parse_attributes};
pub use crate::consts::{HASH_CHUNK_SIZE, RESPONSE_HEAD};
pub use crate::entry::{CacheEntry, hash_chunk_count, metadata_offset};
use crate::error::Result;
pub use crate::header::response_header;
pub use crate::key::SplitKey;
pub use crate::metadata::Metadata;
pub use crate::source::Source;

/// Easy, top-level entrypoint for decoding the entry file at `path`.
///
/// See [`CacheEntry::decode_from`] for decoding from other sources.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn decode(path: impl AsRef<Path>) -> Result<CacheEntry> {
    CacheEntry::decode(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;

    #[test]
    fn decode_entry_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fixture = Fixture { version: 1, key: b"p,b,i1,example:key".to_vec(), ..Fixture::default() };
        let path = fixture.write(temp_dir.path(), "0123456789ABCDEF0123456789ABCDEF01234567");
        let mut entry = decode(&path).unwrap();
        assert_eq!(entry.path(), path);
        assert_eq!(entry.flags, None);
        assert_eq!(entry.key_tags, ["p", "b", "i1"]);
        assert_eq!(entry.key, "example:key");
        assert_eq!(SplitKey::parse(&entry.raw_key).to_raw(), entry.raw_key);
        assert_eq!(entry.content().unwrap(), fixture.body);
    }

    #[test]
    fn entries_decode_independently_across_threads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..8)
            .map(|i| {
                let fixture = Fixture { fetch_count: i, body: vec![i as u8; 1024 * i as usize], ..Fixture::default() };
                fixture.write(temp_dir.path(), &format!("entry-{i}"))
            })
            .collect();
        std::thread::scope(|scope| {
            let handles: Vec<_> = paths.iter().map(|path| scope.spawn(move || decode(path).unwrap())).collect();
            for (i, handle) in handles.into_iter().enumerate() {
                let mut entry = handle.join().unwrap();
                assert_eq!(entry.fetch_count, i as u32);
                assert_eq!(entry.content().unwrap().len(), 1024 * i);
            }
        });
    }
}

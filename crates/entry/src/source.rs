//! Where entry bytes are read from.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Result as IoResult, Seek};
use std::path::PathBuf;
use std::sync::Arc;

/// Something an entry can be (re-)opened from.
///
/// Decoding opens the source once for the metadata; loading the body opens it
/// a second time. Nothing is held open in between.
pub trait Source {
    type Reader: Read + Seek;

    fn open(&self) -> IoResult<Self::Reader>;
}

impl Source for PathBuf {
    type Reader = BufReader<File>;

    fn open(&self) -> IoResult<Self::Reader> {
        File::open(self).map(BufReader::new)
    }
}

/// In-memory entry images, e.g. entries pulled out of an archive.
impl Source for Arc<[u8]> {
    type Reader = Cursor<Arc<[u8]>>;

    fn open(&self) -> IoResult<Self::Reader> {
        Ok(Cursor::new(Arc::clone(self)))
    }
}

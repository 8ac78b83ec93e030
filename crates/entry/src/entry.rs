//! Decoding of a single cache entry.

use crate::consts::{CHECKSUM_SIZE, CHUNK_HASH_SIZE, HASH_CHUNK_SIZE, TRAILER_SIZE};
use crate::error::{ErrorKind, Result};
use crate::metadata::Metadata;
use crate::source::Source;
use exn::ResultExt;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::{Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Number of 2-byte chunk hashes stored after a body of `content_size` bytes.
///
/// ```rust
/// use cache2_entry::hash_chunk_count;
///
/// assert_eq!(hash_chunk_count(0), 0);
/// assert_eq!(hash_chunk_count(262_144), 1);
/// assert_eq!(hash_chunk_count(262_145), 2);
/// ```
#[must_use]
pub fn hash_chunk_count(content_size: u32) -> u32 {
    content_size.div_ceil(HASH_CHUNK_SIZE)
}

/// File offset where the metadata block of an entry starts.
///
/// The body is followed by a 4-byte metadata checksum and then the chunk
/// hashes; neither is interpreted.
#[must_use]
pub fn metadata_offset(content_size: u32) -> u64 {
    u64::from(content_size) + CHECKSUM_SIZE + u64::from(hash_chunk_count(content_size)) * CHUNK_HASH_SIZE
}

/// Whether the body has been read yet. Only ever moves from `Unloaded` to `Loaded`.
#[derive(Default)]
enum Content {
    #[default]
    Unloaded,
    Loaded(Vec<u8>),
}

impl Content {
    fn bytes(&self) -> Option<&[u8]> {
        match self {
            Content::Unloaded => None,
            Content::Loaded(bytes) => Some(bytes.as_slice()),
        }
    }
}

impl Debug for Content {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Content::Unloaded => write!(f, "Unloaded"),
            Content::Loaded(bytes) => write!(f, "Loaded({} bytes)", bytes.len()),
        }
    }
}

/// A decoded cache entry.
///
/// Metadata is decoded eagerly when the entry is constructed and is
/// read-only afterwards (available through [`Deref`] to [`Metadata`]). The
/// body is only read on the first call to [`content`](Self::content).
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CacheEntry<S = PathBuf> {
    #[cfg_attr(feature = "serde", serde(rename = "path"))]
    source: S,
    #[cfg_attr(feature = "serde", serde(flatten))]
    metadata: Metadata,
    #[cfg_attr(feature = "serde", serde(skip))]
    content: Content,
}

impl CacheEntry<PathBuf> {
    /// Decode the entry file at `path`.
    pub fn decode(path: impl Into<PathBuf>) -> Result<Self> {
        Self::decode_from(path.into())
    }

    /// The entry file this was decoded from.
    pub fn path(&self) -> &Path {
        &self.source
    }
}

impl<S: Source> CacheEntry<S> {
    /// Decode an entry from any [`Source`].
    ///
    /// The source is opened once, for the duration of this call.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The source can't be opened or read
    /// - The trailer, chunk hashes or metadata don't fit in the available bytes
    /// - The stored key is not valid UTF-8
    #[instrument(skip(source), fields(content_size, version, key))]
    pub fn decode_from(source: S) -> Result<Self> {
        let mut reader = source.open().or_raise(|| ErrorKind::Io)?;
        let (content_size, block) = read_metadata_block(&mut reader)?;
        let metadata = Metadata::parse(content_size, &block)?;
        let span = tracing::Span::current();
        span.record("content_size", content_size);
        span.record("version", metadata.version);
        span.record("key", metadata.key.as_str());
        Ok(Self {
            source,
            metadata,
            content: Content::Unloaded,
        })
    }

    /// The cached body, read from the source on first access.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](ErrorKind::Io) if the source can no longer supply
    /// `content_size` bytes. A failed load leaves the entry unloaded.
    pub fn content(&mut self) -> Result<&[u8]> {
        if self.content.bytes().is_none() {
            let bytes = read_content(&self.source, self.metadata.content_size)?;
            self.content = Content::Loaded(bytes);
        }
        Ok(self.content.bytes().unwrap_or_default())
    }

    /// Consume the entry, returning its body.
    pub fn into_content(self) -> Result<Vec<u8>> {
        match self.content {
            Content::Loaded(bytes) => Ok(bytes),
            Content::Unloaded => read_content(&self.source, self.metadata.content_size),
        }
    }
}

impl<S> CacheEntry<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    // Explicit version of self.deref()
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Consume the entry, keeping only its metadata. A loaded body is dropped.
    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }

    pub fn is_content_loaded(&self) -> bool {
        matches!(self.content, Content::Loaded(_))
    }
}

impl<S> Deref for CacheEntry<S> {
    type Target = Metadata;
    fn deref(&self) -> &Metadata {
        &self.metadata
    }
}

/// Reads the trailer, then the metadata block between the chunk hashes and
/// the trailer.
fn read_metadata_block<R: Read + Seek>(reader: &mut R) -> Result<(u32, Vec<u8>)> {
    let file_size = reader.seek(SeekFrom::End(0)).or_raise(|| ErrorKind::Io)?;
    if file_size < TRAILER_SIZE {
        exn::bail!(ErrorKind::truncated("trailer", TRAILER_SIZE, file_size));
    }
    let metadata_end = file_size - TRAILER_SIZE;
    reader.seek(SeekFrom::Start(metadata_end)).or_raise(|| ErrorKind::Io)?;
    let mut trailer = [0u8; TRAILER_SIZE as usize];
    reader.read_exact(&mut trailer).or_raise(|| ErrorKind::Io)?;
    let content_size = u32::from_be_bytes(trailer);

    let metadata_start = metadata_offset(content_size);
    if metadata_start > metadata_end {
        exn::bail!(ErrorKind::truncated("body and chunk hashes", metadata_start + TRAILER_SIZE, file_size));
    }
    let block_size = usize::try_from(metadata_end - metadata_start).or_raise(|| ErrorKind::ParseError {
        field: "metadata_size",
        value: (metadata_end - metadata_start).to_string(),
    })?;
    tracing::trace!(file_size, content_size, metadata_start, block_size, "located metadata block");
    reader.seek(SeekFrom::Start(metadata_start)).or_raise(|| ErrorKind::Io)?;
    let mut block = vec![0; block_size];
    reader.read_exact(&mut block).or_raise(|| ErrorKind::Io)?;
    Ok((content_size, block))
}

#[instrument(level = "trace", skip(source))]
fn read_content<S: Source>(source: &S, content_size: u32) -> Result<Vec<u8>> {
    let mut reader = source.open().or_raise(|| ErrorKind::Io)?;
    reader.seek(SeekFrom::Start(0)).or_raise(|| ErrorKind::Io)?;
    let length = usize::try_from(content_size).or_raise(|| ErrorKind::ParseError {
        field: "content_size",
        value: content_size.to_string(),
    })?;
    let mut content = vec![0; length];
    reader.read_exact(&mut content).or_raise(|| ErrorKind::Io)?;
    Ok(content)
}

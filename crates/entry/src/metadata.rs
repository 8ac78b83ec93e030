use crate::attrs::{Attributes, parse_attributes};
use crate::consts::{FIELD_SIZE, FIXED_FIELDS};
use crate::error::{ErrorKind, Result};
use crate::header;
use crate::key::SplitKey;
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;
use tracing::instrument;

/// Everything decoded from an entry's trailer and metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Metadata {
    /// Length of the cached body in bytes, as recorded in the trailer
    pub content_size: u32,
    /// Metadata format version
    pub version: u32,
    /// Number of times the entry has been fetched
    pub fetch_count: u32,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::timestamp"))]
    pub last_fetched_at: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::timestamp"))]
    pub last_modified_at: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::timestamp"))]
    pub expire_at: OffsetDateTime,
    /// Ranking score used for eviction
    pub frecency: u32,
    /// Entry flags; only stored from version 2 onwards
    pub flags: Option<u32>,
    /// Lookup key with its tags stripped
    pub key: String,
    /// Tags stripped from the front of the key, leftmost first
    pub key_tags: Vec<String>,
    /// Key exactly as stored
    pub raw_key: String,
    pub attributes: Attributes,
    /// `Content-Type` of the cached response, if recorded
    pub content_type: Option<String>,
    /// `Content-Encoding` of the cached response, if recorded
    pub content_encoding: Option<String>,
}

impl Metadata {
    /// Decodes a metadata block (the bytes between the chunk hashes and the
    /// trailer).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The block is shorter than its fixed header fields
    /// - The declared key length runs past the end of the block
    /// - The key is not valid UTF-8
    #[instrument(level = "trace", skip(block), fields(block_size = block.len()))]
    pub(crate) fn parse(content_size: u32, block: &[u8]) -> Result<Self> {
        let minimum = FIXED_FIELDS * FIELD_SIZE;
        if block.len() < minimum {
            exn::bail!(ErrorKind::truncated("metadata header", minimum as u64, block.len() as u64));
        }
        let mut fields = Fields::new(block);
        let version = fields.u32()?;
        let fetch_count = fields.u32()?;
        let last_fetched_at = fields.u32()?;
        let last_modified_at = fields.u32()?;
        let frecency = fields.u32()?;
        let expire_at = fields.u32()?;
        let key_length = fields.u32()?;
        let flags = match version > 1 {
            true => Some(fields.u32()?),
            false => None,
        };
        let raw_key = fields.key(key_length)?;
        let raw_key = String::from_utf8(raw_key.to_vec()).or_raise(|| ErrorKind::Encoding("key"))?;
        let attributes = parse_attributes(fields.rest());
        let SplitKey { key, tags, .. } = SplitKey::parse(&raw_key);
        Ok(Self {
            content_size,
            version,
            fetch_count,
            last_fetched_at: timestamp("last_fetched_at", last_fetched_at)?,
            last_modified_at: timestamp("last_modified_at", last_modified_at)?,
            expire_at: timestamp("expire_at", expire_at)?,
            frecency,
            flags,
            key,
            key_tags: tags,
            raw_key,
            content_type: header::content_type(&attributes),
            content_encoding: header::content_encoding(&attributes),
            attributes,
        })
    }
}

fn timestamp(field: &'static str, seconds: u32) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(i64::from(seconds)).or_raise(|| ErrorKind::ParseError {
        field,
        value: seconds.to_string(),
    })
}

/// Forward-only reader over a metadata block.
struct Fields<'a> {
    block: &'a [u8],
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(block: &'a [u8]) -> Self {
        Self { block, rest: block }
    }

    fn truncated(&self, region: &'static str, wanted: usize) -> ErrorKind {
        let consumed = self.block.len() - self.rest.len();
        ErrorKind::truncated(region, (consumed + wanted) as u64, self.block.len() as u64)
    }

    fn u32(&mut self) -> Result<u32> {
        let (bytes, rest) = self
            .rest
            .split_first_chunk::<FIELD_SIZE>()
            .ok_or_raise(|| self.truncated("metadata header", FIELD_SIZE))?;
        self.rest = rest;
        Ok(u32::from_be_bytes(*bytes))
    }

    /// Takes `length` key bytes and skips the separator byte after them.
    fn key(&mut self, length: u32) -> Result<&'a [u8]> {
        let length = usize::try_from(length).or_raise(|| ErrorKind::ParseError {
            field: "key_length",
            value: length.to_string(),
        })?;
        let wanted = length.saturating_add(1);
        if self.rest.len() < wanted {
            exn::bail!(self.truncated("key", wanted));
        }
        let (key, rest) = self.rest.split_at(length);
        self.rest = &rest[1..];
        Ok(key)
    }

    fn rest(&self) -> &'a [u8] {
        self.rest
    }
}

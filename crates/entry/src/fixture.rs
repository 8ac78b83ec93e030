//! Builds byte-exact entry images for tests.

use crate::hash_chunk_count;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) fn attribute_table(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut table = Vec::new();
    for (name, value) in pairs {
        table.extend_from_slice(name.as_bytes());
        table.push(0);
        table.extend_from_slice(value.as_bytes());
        table.push(0);
    }
    table
}

pub(crate) struct Fixture {
    pub body: Vec<u8>,
    pub version: u32,
    pub fetch_count: u32,
    pub last_fetched_at: u32,
    pub last_modified_at: u32,
    pub frecency: u32,
    pub expire_at: u32,
    pub flags: u32,
    pub key: Vec<u8>,
    /// Overrides the key length written to the header.
    pub key_length: Option<u32>,
    pub attributes: Vec<u8>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            body: b"body { color: rebeccapurple; }".to_vec(),
            version: 3,
            fetch_count: 7,
            last_fetched_at: 1_700_000_100,
            last_modified_at: 1_700_000_000,
            frecency: 0x4A3B_2C1D,
            expire_at: 1_700_086_400,
            flags: 0,
            key: b"a,:http://example.com/style.css".to_vec(),
            key_length: None,
            attributes: attribute_table(&[
                ("request-method", "GET"),
                (
                    "response-head",
                    "HTTP/1.1 200 OK\r\nContent-Type: text/css\r\nContent-Encoding: gzip\r\nContent-Length: 30\r\n",
                ),
                ("net-response-time-onstart", "42"),
            ]),
        }
    }
}

impl Fixture {
    pub fn metadata_block(&self) -> Vec<u8> {
        let mut block = Vec::new();
        let key_length = self.key_length.unwrap_or(self.key.len() as u32);
        for field in [
            self.version,
            self.fetch_count,
            self.last_fetched_at,
            self.last_modified_at,
            self.frecency,
            self.expire_at,
            key_length,
        ] {
            block.extend_from_slice(&field.to_be_bytes());
        }
        if self.version > 1 {
            block.extend_from_slice(&self.flags.to_be_bytes());
        }
        block.extend_from_slice(&self.key);
        block.push(0);
        block.extend_from_slice(&self.attributes);
        block
    }

    pub fn build(&self) -> Vec<u8> {
        let content_size = self.body.len() as u32;
        let mut image = self.body.clone();
        // Metadata checksum, never interpreted.
        image.extend_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        for chunk in 0..hash_chunk_count(content_size) {
            image.extend_from_slice(&(chunk as u16 ^ 0xA5A5).to_be_bytes());
        }
        image.extend_from_slice(&self.metadata_block());
        image.extend_from_slice(&content_size.to_be_bytes());
        image
    }

    pub fn image(&self) -> Arc<[u8]> {
        Arc::from(self.build())
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

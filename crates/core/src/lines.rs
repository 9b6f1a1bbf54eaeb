//! Line-by-line reading of text objects
//!
//! [`LineReader`] fetches an object in fixed-size ranged reads and hands out
//! one line at a time, so large logs never have to fit in memory at once.

use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::traits::ObjectStoreClient;

/// Bytes fetched per ranged read
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Lines of one object, without their `\n` or `\r\n` terminators
pub struct LineReader<'a> {
    store: &'a dyn ObjectStoreClient,
    path: ResourcePath,
    size: u64,
    offset: u64,
    block_size: u64,
    buffer: Vec<u8>,
}

impl<'a> LineReader<'a> {
    /// Reader over `size` bytes of `path`
    pub(crate) fn new(store: &'a dyn ObjectStoreClient, path: ResourcePath, size: u64) -> Self {
        Self {
            store,
            path,
            size,
            offset: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            buffer: Vec::new(),
        }
    }

    /// Reader over content that is already in memory
    pub(crate) fn from_bytes(store: &'a dyn ObjectStoreClient, path: ResourcePath, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            offset: size,
            buffer: data,
            ..Self::new(store, path, size)
        }
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Next line, or `None` once the object is exhausted
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return self.decode(line).map(Some);
            }

            if self.offset >= self.size {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buffer);
                return self.decode(line).map(Some);
            }

            let block = self
                .store
                .get_range(&self.path, self.offset, Some(self.block_size))
                .await?;
            if block.is_empty() {
                // Object shrank under us
                self.size = self.offset;
                continue;
            }
            self.offset += block.len() as u64;
            self.buffer.extend_from_slice(&block);
        }
    }

    /// Remaining lines, collected
    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    fn decode(&self, line: Vec<u8>) -> Result<String> {
        String::from_utf8(line)
            .map_err(|e| Error::InvalidInput(format!("{} is not UTF-8 text: {e}", self.path)))
    }
}

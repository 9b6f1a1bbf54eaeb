//! ObjectStoreClient trait definition
//!
//! This trait defines the transport boundary: listing, reading, writing and
//! deleting objects addressed by [`ResourcePath`]. It keeps the core
//! independent of the storage SDK behind it.

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::ResourcePath;

/// Metadata for an object or folder-like prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full key of the object
    pub name: String,

    /// Size in bytes (None for directories)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// Entity tag, used as the object checksum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Whether this is a directory/prefix
    pub is_directory: bool,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for a file
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size, humansize::BINARY)),
            creation_time: None,
            last_modified: None,
            etag: None,
            content_type: None,
            is_directory: false,
        }
    }

    /// Create a new ObjectInfo for a directory/prefix
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes: None,
            size_human: None,
            creation_time: None,
            last_modified: None,
            etag: None,
            content_type: None,
            is_directory: true,
        }
    }

    /// Kind label shown to users
    pub fn kind(&self) -> &'static str {
        if self.is_directory { "directory" } else { "file" }
    }
}

/// Transport operations over a hierarchical object store
///
/// Implemented by the `bfs-store` adapter and mocked in tests. Missing
/// objects are reported as [`crate::Error::NotFound`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Full keys under `root.key_path`, recursively, in listing order
    async fn list(&self, root: &ResourcePath) -> Result<Vec<String>>;

    /// Object content as bytes
    async fn get(&self, path: &ResourcePath) -> Result<Vec<u8>>;

    /// Bytes from `offset` to the end, or at most `length` of them
    ///
    /// An `offset` at or past the end of the object is
    /// [`crate::Error::InvalidInput`].
    async fn get_range(
        &self,
        path: &ResourcePath,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Vec<u8>>;

    /// Create or replace an object
    async fn put(&self, path: &ResourcePath, data: Vec<u8>) -> Result<bool>;

    /// Object or prefix metadata
    async fn info(&self, path: &ResourcePath) -> Result<ObjectInfo>;

    /// Delete an object
    async fn remove(&self, path: &ResourcePath) -> Result<bool>;
}

//! bfs-core: Core library for blobfs
//!
//! This crate provides filesystem-style access to URL-addressed objects in
//! hierarchical object storage, including:
//! - Resource URL decoding and wildcard globbing
//! - The ObjectStoreClient trait for transport operations
//! - Table encoding and parallel multi-object loading
//! - A plugin registry that writes function outputs to computed destinations
//! - Configuration and account management
//!
//! This crate is independent of any specific storage SDK; the `bfs-store`
//! crate provides the `object_store` backed implementation.

pub mod account;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod glob;
pub mod lines;
pub mod loader;
pub mod path;
pub mod registry;
pub mod table_io;
pub mod traits;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountManager, RetryConfig, TimeoutConfig};
pub use client::{FileClient, PathSpec, TableReader};
pub use codec::{ArrowCodec, Compression, FileFormat, Table, TabularCodec};
pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use crate::glob::GlobPattern;
pub use lines::LineReader;
pub use loader::{ParallelTableLoader, ReadTask, TransformRegistry};
pub use path::{ResourcePath, StorageKind, StorageSite, decode_path};
pub use registry::{
    DestinationTemplate, FileNames, Invocation, Kwargs, PluginContext, PluginRegistration,
    PluginRegistry, PluginValue, Setting,
};
pub use table_io::{ScopedTableIo, TableIo};
pub use traits::{ObjectInfo, ObjectStoreClient};

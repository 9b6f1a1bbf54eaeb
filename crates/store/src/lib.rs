//! bfs-store: object_store adapter for blobfs
//!
//! This crate provides the implementation of the ObjectStoreClient trait
//! using the object_store crate. It is the only crate that directly
//! depends on a storage SDK.

pub mod backend;
pub mod client;

pub use backend::{BACKEND_ENV, Backend};
pub use client::ObjectStoreAdapter;

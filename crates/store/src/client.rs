//! object_store client implementation
//!
//! Wraps `object_store` and implements the ObjectStoreClient trait from bfs-core.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;

use bfs_core::{Error, ObjectInfo, ObjectStoreClient, ResourcePath, Result};

use crate::backend::Backend;

type StoreKey = (String, String);

/// ObjectStoreClient over one store per (account, container)
pub struct ObjectStoreAdapter {
    backend: Backend,
    stores: RwLock<HashMap<StoreKey, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreAdapter {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn store_for(&self, path: &ResourcePath) -> Result<Arc<dyn ObjectStore>> {
        let key = (path.service_root.clone(), path.container.clone());
        if let Some(store) = self.stores.read().get(&key) {
            return Ok(Arc::clone(store));
        }
        let store = self.backend.open(path)?;
        tracing::debug!(container = %path.container_url(), "opened store");
        Ok(Arc::clone(self.stores.write().entry(key).or_insert(store)))
    }
}

fn location(path: &ResourcePath) -> Path {
    Path::from(path.key_path.as_str())
}

/// Key as the caller wrote it; `Path` percent-encodes reserved characters per segment
fn key_of(location: &Path) -> String {
    location
        .parts()
        .map(|part| percent_decode_str(part.as_ref()).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn map_error(path: &ResourcePath, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => Error::NotFound(path.to_url()),
        object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. } => {
            Error::Conflict(format!("{path}: {err}"))
        }
        object_store::Error::NotSupported { .. } | object_store::Error::NotImplemented => {
            Error::UnsupportedFeature(format!("{path}: {err}"))
        }
        other => Error::Network(format!("{path}: {other}")),
    }
}

fn object_info(meta: ObjectMeta) -> ObjectInfo {
    let name = key_of(&meta.location);
    let mut info = ObjectInfo::file(&name, meta.size as u64);
    info.last_modified = jiff::Timestamp::from_second(meta.last_modified.timestamp()).ok();
    info.etag = meta.e_tag;
    info.content_type = mime_guess::from_path(&name)
        .first()
        .map(|mime| mime.essence_str().to_string());
    info
}

#[async_trait]
impl ObjectStoreClient for ObjectStoreAdapter {
    async fn list(&self, root: &ResourcePath) -> Result<Vec<String>> {
        let store = self.store_for(root)?;
        let prefix = root.key_path.trim_end_matches('/');
        let prefix = (!prefix.is_empty()).then(|| Path::from(prefix));
        let objects: Vec<ObjectMeta> = store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| map_error(root, e))?;

        let mut keys: Vec<String> = objects
            .into_iter()
            .map(|meta| key_of(&meta.location))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, path: &ResourcePath) -> Result<Vec<u8>> {
        let store = self.store_for(path)?;
        let result = store
            .get(&location(path))
            .await
            .map_err(|e| map_error(path, e))?;
        let bytes = result.bytes().await.map_err(|e| map_error(path, e))?;
        Ok(bytes.to_vec())
    }

    async fn get_range(
        &self,
        path: &ResourcePath,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Vec<u8>> {
        let store = self.store_for(path)?;
        let location = location(path);
        let size = store
            .head(&location)
            .await
            .map_err(|e| map_error(path, e))?
            .size;

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start >= size {
            return Err(Error::InvalidInput(format!(
                "{path}: offset {offset} is past the end of a {size} byte object"
            )));
        }
        let end = length.map_or(size, |length| {
            start
                .saturating_add(usize::try_from(length).unwrap_or(usize::MAX))
                .min(size)
        });
        if end == start {
            return Ok(Vec::new());
        }

        let bytes = store
            .get_range(&location, start..end)
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, path: &ResourcePath, data: Vec<u8>) -> Result<bool> {
        let store = self.store_for(path)?;
        store
            .put(&location(path), PutPayload::from(data))
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(true)
    }

    async fn info(&self, path: &ResourcePath) -> Result<ObjectInfo> {
        let store = self.store_for(path)?;
        let key = path.key_path.trim_end_matches('/');
        if !key.is_empty() {
            match store.head(&Path::from(key)).await {
                Ok(meta) => return Ok(object_info(meta)),
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(map_error(path, e)),
            }
        }

        // Folder-like prefix: anything listed below it
        let prefix = (!key.is_empty()).then(|| Path::from(key));
        let listing = store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| map_error(path, e))?;
        // A reachable container is a directory even when it holds nothing
        if key.is_empty() {
            return Ok(ObjectInfo::directory(""));
        }
        if listing.objects.is_empty() && listing.common_prefixes.is_empty() {
            return Err(Error::NotFound(path.to_url()));
        }
        Ok(ObjectInfo::directory(path.key_path.clone()))
    }

    async fn remove(&self, path: &ResourcePath) -> Result<bool> {
        let store = self.store_for(path)?;
        store
            .delete(&location(path))
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(true)
    }
}

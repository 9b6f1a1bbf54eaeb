//! In-memory store used by unit tests

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::traits::{ObjectInfo, ObjectStoreClient};

/// Objects keyed by full URL, listed in key order
#[derive(Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, url: &str, data: impl Into<Vec<u8>>) {
        self.objects.lock().insert(url.to_string(), data.into());
    }

    pub(crate) fn object(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(url).cloned()
    }

    /// URLs written through `put`, in call order
    pub(crate) fn puts(&self) -> Vec<String> {
        self.puts.lock().clone()
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryStore {
    async fn list(&self, root: &ResourcePath) -> Result<Vec<String>> {
        let container = format!("{}/", root.container_url());
        let prefix = root.key_path.trim_end_matches('/');
        Ok(self
            .objects
            .lock()
            .keys()
            .filter_map(|url| url.strip_prefix(&container))
            .filter(|key| {
                prefix.is_empty()
                    || key
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(str::to_string)
            .collect())
    }

    async fn get(&self, path: &ResourcePath) -> Result<Vec<u8>> {
        self.object(&path.to_url())
            .ok_or_else(|| Error::NotFound(path.to_url()))
    }

    async fn get_range(
        &self,
        path: &ResourcePath,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Vec<u8>> {
        let data = self.get(path).await?;
        let size = data.len() as u64;
        if offset >= size {
            return Err(Error::InvalidInput(format!(
                "{path}: offset {offset} is past the end of a {size} byte object"
            )));
        }
        let end = length.map_or(size, |length| offset.saturating_add(length).min(size));
        Ok(data[offset as usize..end as usize].to_vec())
    }

    async fn put(&self, path: &ResourcePath, data: Vec<u8>) -> Result<bool> {
        self.insert(&path.to_url(), data);
        self.puts.lock().push(path.to_url());
        Ok(true)
    }

    async fn info(&self, path: &ResourcePath) -> Result<ObjectInfo> {
        if let Some(data) = self.object(&path.to_url()) {
            return Ok(ObjectInfo::file(&path.key_path, data.len() as u64));
        }
        if !self.list(path).await?.is_empty() {
            return Ok(ObjectInfo::directory(&path.key_path));
        }
        Err(Error::NotFound(path.to_url()))
    }

    async fn remove(&self, path: &ResourcePath) -> Result<bool> {
        self.objects
            .lock()
            .remove(&path.to_url())
            .map(|_| true)
            .ok_or_else(|| Error::NotFound(path.to_url()))
    }
}

//! Caller-facing facade
//!
//! [`FileClient`] exposes filesystem verbs over URL-addressed objects,
//! table loading, and plugin invocation, all through one
//! [`ObjectStoreClient`].

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::{ArrowCodec, Compression, FileFormat, TabularCodec, Table};
use crate::error::{Error, Result};
use crate::glob::GlobPattern;
use crate::lines::LineReader;
use crate::loader::{ParallelTableLoader, ReadTask, TransformRegistry};
use crate::path::{ResourcePath, StorageKind, StorageSite, WILDCARD, decode_path};
use crate::registry::{
    DestinationTemplate, Invocation, Kwargs, PluginContext, PluginRegistry, PluginValue,
};
use crate::table_io::ScopedTableIo;
use crate::traits::{ObjectInfo, ObjectStoreClient};

/// One URL (globbed when it contains `*`) or an explicit list of URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::One(path.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        PathSpec::One(path)
    }
}

impl From<Vec<String>> for PathSpec {
    fn from(paths: Vec<String>) -> Self {
        PathSpec::Many(paths)
    }
}

impl From<Vec<&str>> for PathSpec {
    fn from(paths: Vec<&str>) -> Self {
        PathSpec::Many(paths.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for PathSpec {
    fn from(paths: &[String]) -> Self {
        PathSpec::Many(paths.to_vec())
    }
}

/// Filesystem-style client over an object store
#[derive(Clone)]
pub struct FileClient {
    store: Arc<dyn ObjectStoreClient>,
    codec: Arc<dyn TabularCodec>,
    transforms: TransformRegistry,
    plugins: Arc<PluginRegistry>,
    site: StorageSite,
    worker_count: Option<usize>,
}

impl FileClient {
    /// Client with the Arrow codec and the process-wide plugin registry
    pub fn new(store: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            store,
            codec: Arc::new(ArrowCodec::new()),
            transforms: TransformRegistry::new(),
            plugins: PluginRegistry::global(),
            site: StorageSite::default(),
            worker_count: None,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn TabularCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_plugins(mut self, plugins: Arc<PluginRegistry>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_site(mut self, site: StorageSite) -> Self {
        self.site = site;
        self
    }

    /// Default worker count for parallel reads
    pub fn with_worker_count(mut self, worker_count: Option<usize>) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStoreClient> {
        &self.store
    }

    pub fn codec(&self) -> &dyn TabularCodec {
        self.codec.as_ref()
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn site(&self) -> &StorageSite {
        &self.site
    }

    pub async fn info(&self, path: &str) -> Result<ObjectInfo> {
        self.store.info(&decode_path(path)?).await
    }

    /// Whether an object or folder-like prefix exists
    pub async fn exists(&self, path: &str) -> Result<bool> {
        match self.info(path).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Entity tag of an object
    pub async fn checksum(&self, path: &str) -> Result<Option<String>> {
        Ok(self.info(path).await?.etag)
    }

    pub async fn size(&self, path: &str) -> Result<Option<u64>> {
        Ok(self.info(path).await?.size_bytes)
    }

    pub async fn isdir(&self, path: &str) -> Result<bool> {
        Ok(self.info(path).await?.is_directory)
    }

    pub async fn isfile(&self, path: &str) -> Result<bool> {
        Ok(!self.info(path).await?.is_directory)
    }

    /// Names directly below `path`; sub-folders end with `/`
    ///
    /// With `attach_prefix`, every name is returned as a full URL. Queue
    /// listings are returned as-is.
    pub async fn ls(&self, path: &str, attach_prefix: bool) -> Result<Vec<String>> {
        let root = decode_path(path)?;
        let keys = self.store.list(&root).await?;
        if root.storage_kind == StorageKind::Queue {
            return Ok(keys);
        }
        let names = immediate_children(&keys, &root.key_path);
        tracing::debug!(path = %root, keys = keys.len(), entries = names.len(), "listed");
        if !attach_prefix {
            return Ok(names);
        }
        let base = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        Ok(names.into_iter().map(|name| format!("{base}{name}")).collect())
    }

    /// Full URLs of the objects matching a wildcard pattern
    pub async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = decode_path(pattern)?;
        let glob = GlobPattern::compile(&pattern)?;
        if pattern.storage_kind == StorageKind::Queue {
            return Err(Error::UnsupportedFeature(format!(
                "glob over queue storage: {pattern}"
            )));
        }
        let keys = self
            .store
            .list(&pattern.with_key(glob.literal_root()))
            .await?;
        let relative: Vec<&str> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(glob.literal_root()))
            .collect();
        let matched = glob.filter(&relative);
        tracing::debug!(pattern = %pattern, listed = keys.len(), matched = matched.len(), "globbed");
        Ok(matched
            .into_iter()
            .map(|key| pattern.with_key(key).to_url())
            .collect())
    }

    /// Copy one object; refuses to replace `dst` unless `overwrite` is set
    pub async fn cp(&self, src: &str, dst: &str, overwrite: bool) -> Result<bool> {
        if src == dst {
            return Err(Error::InvalidInput(format!(
                "Source and destination are the same: {src}"
            )));
        }
        let src_path = decode_path(src)?;
        let dst_path = decode_path(dst)?;
        if !overwrite && self.exists(dst).await? {
            return Err(Error::Conflict(format!(
                "{dst} already exists, set overwrite to replace it"
            )));
        }
        let data = self.store.get(&src_path).await?;
        self.store.put(&dst_path, data).await
    }

    pub async fn rm(&self, path: &str) -> Result<bool> {
        self.store.remove(&decode_path(path)?).await
    }

    /// Object content; `.gz` keys are decompressed
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let data = self.store.get(&decode_path(path)?).await?;
        if path.ends_with(".gz") {
            Compression::Gzip.decompress(&data)
        } else {
            Ok(data)
        }
    }

    /// Stored bytes from `offset`, at most `length` of them
    ///
    /// Unlike [`FileClient::get`], `.gz` objects are not decompressed: a
    /// range of compressed bytes has no meaning on its own.
    pub async fn get_range(&self, path: &str, offset: u64, length: Option<u64>) -> Result<Vec<u8>> {
        self.store
            .get_range(&decode_path(path)?, offset, length)
            .await
    }

    pub async fn put(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<bool> {
        self.store.put(&decode_path(path)?, data.into()).await
    }

    pub async fn read_json(&self, path: &str) -> Result<Value> {
        Ok(serde_json::from_slice(&self.get(path).await?)?)
    }

    pub async fn write_json(&self, path: &str, value: &Value) -> Result<bool> {
        self.put(path, serde_json::to_vec(value)?).await
    }

    pub async fn read_lines(&self, path: &str) -> Result<Vec<String>> {
        self.read_line_iter(path).await?.collect().await
    }

    /// Lines of a text object, fetched block by block
    ///
    /// `.gz` objects are downloaded and decompressed whole.
    pub async fn read_line_iter(&self, path: &str) -> Result<LineReader<'_>> {
        let resource = decode_path(path)?;
        if path.ends_with(".gz") {
            let data = self.get(path).await?;
            return Ok(LineReader::from_bytes(self.store.as_ref(), resource, data));
        }
        let size = self.store.info(&resource).await?.size_bytes.ok_or_else(|| {
            Error::InvalidInput(format!("{path} is a directory, not a text object"))
        })?;
        Ok(LineReader::new(self.store.as_ref(), resource, size))
    }

    /// A delimited table as chunks of at most `chunk_size` rows
    ///
    /// Every chunk has the columns of the header line. The delimiter follows
    /// the extension (`.tsv` is tab-separated, anything else a comma).
    pub async fn read_csv_chunks(&self, path: &str, chunk_size: usize) -> Result<Vec<Table>> {
        if chunk_size == 0 {
            return Err(Error::InvalidInput("chunk_size must be at least 1".into()));
        }
        let delimiter = match FileFormat::from_path(path) {
            Ok(FileFormat::Delimited { delimiter, .. }) => delimiter,
            _ => b',',
        };
        let data = self.get(path).await?;
        let chunks = ArrowCodec::new()
            .with_batch_size(chunk_size)
            .decode_delimited_chunks(&data, delimiter)?;
        tracing::debug!(path, chunks = chunks.len(), "read in chunks");
        Ok(chunks)
    }

    /// Builder for table reads
    pub fn reader(&self) -> TableReader<'_> {
        TableReader {
            client: self,
            parallel: false,
            worker_count: None,
            transform: None,
        }
    }

    /// Read and concatenate the tables at `paths`
    pub async fn read(
        &self,
        paths: impl Into<PathSpec>,
        format: FileFormat,
        parallel: bool,
        worker_count: Option<usize>,
    ) -> Result<Table> {
        let mut reader = self.reader().parallel(parallel);
        if let Some(worker_count) = worker_count {
            reader = reader.worker_count(worker_count);
        }
        reader.load(paths, format).await
    }

    /// Single-table read and write helpers
    pub fn table_io(&self) -> ScopedTableIo<'_> {
        ScopedTableIo::new(self)
    }

    pub(crate) async fn read_table(&self, path: &str, format: FileFormat) -> Result<Table> {
        let data = self.store.get(&decode_path(path)?).await?;
        self.codec.decode(&data, format.for_key(path))
    }

    pub(crate) async fn write_table(
        &self,
        path: &str,
        table: &Table,
        format: FileFormat,
    ) -> Result<bool> {
        let data = self.codec.encode(table, format.for_key(path))?;
        self.store.put(&decode_path(path)?, data).await
    }

    /// Register a plugin in this client's registry
    pub fn register<F>(&self, name: impl Into<String>, function: F, template: DestinationTemplate)
    where
        F: Fn(Invocation) -> anyhow::Result<PluginValue> + Send + Sync + 'static,
    {
        self.plugins.register(name, function, template);
    }

    /// Run a registered plugin, writing its outputs through this client's store
    pub async fn invoke(
        &self,
        name: &str,
        args: Vec<PluginValue>,
        kwargs: Kwargs,
    ) -> Result<Option<PluginValue>> {
        let context = PluginContext {
            store: self.store.as_ref(),
            codec: self.codec.as_ref(),
            site: &self.site,
        };
        self.plugins
            .invoke(name, context, Invocation { args, kwargs })
            .await
    }

    async fn expand(&self, paths: PathSpec) -> Result<Vec<String>> {
        match paths {
            PathSpec::One(path) if path.contains(WILDCARD) => self.glob(&path).await,
            PathSpec::One(path) => Ok(vec![path]),
            PathSpec::Many(paths) => Ok(paths),
        }
    }

    fn loader(&self) -> ParallelTableLoader {
        ParallelTableLoader::new(
            Arc::clone(&self.store),
            Arc::clone(&self.codec),
            self.transforms.clone(),
        )
    }
}

fn immediate_children(keys: &[String], key_path: &str) -> Vec<String> {
    let prefix = match key_path.trim_end_matches('/') {
        "" => String::new(),
        trimmed => format!("{trimmed}/"),
    };
    let mut seen = HashSet::new();
    keys.iter()
        .filter_map(|key| key.strip_prefix(prefix.as_str()))
        .filter(|rest| !rest.is_empty())
        .map(|rest| match rest.split_once('/') {
            Some((folder, _)) => format!("{folder}/"),
            None => rest.to_string(),
        })
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Configurable table read
///
/// ```ignore
/// let table = client
///     .reader()
///     .parallel(true)
///     .apply("drop_nulls")
///     .csv("https://acct.blob.core.windows.net/data/2024/*.csv")
///     .await?;
/// ```
#[derive(Clone)]
pub struct TableReader<'a> {
    client: &'a FileClient,
    parallel: bool,
    worker_count: Option<usize>,
    transform: Option<String>,
}

impl TableReader<'_> {
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = Some(worker_count);
        self
    }

    /// Apply a registered transform to every loaded table
    pub fn apply(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    pub async fn csv(self, paths: impl Into<PathSpec>) -> Result<Table> {
        self.load(paths, FileFormat::CSV).await
    }

    pub async fn tsv(self, paths: impl Into<PathSpec>) -> Result<Table> {
        self.load(paths, FileFormat::TSV).await
    }

    pub async fn parquet(self, paths: impl Into<PathSpec>) -> Result<Table> {
        self.load(paths, FileFormat::Columnar).await
    }

    pub async fn pickle(self, paths: impl Into<PathSpec>, compression: Compression) -> Result<Table> {
        self.load(paths, FileFormat::Serialized { compression }).await
    }

    pub async fn load(self, paths: impl Into<PathSpec>, format: FileFormat) -> Result<Table> {
        let paths = paths.into();
        if let Some(name) = &self.transform {
            if !self.client.transforms.contains(name) {
                return Err(Error::InvalidInput(format!("Unknown transform '{name}'")));
            }
        }
        let described = match &paths {
            PathSpec::One(path) => path.clone(),
            PathSpec::Many(paths) => format!("{} paths", paths.len()),
        };
        let urls = self.client.expand(paths).await?;
        if urls.is_empty() {
            return Err(Error::EmptyTaskList(described));
        }
        let tasks = urls
            .iter()
            .map(|url| {
                let path: ResourcePath = decode_path(url)?;
                Ok(ReadTask {
                    format: format.for_key(&path.key_path),
                    path,
                    transform: self.transform.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.client
            .loader()
            .load(
                tasks,
                self.parallel,
                self.worker_count.or(self.client.worker_count),
            )
            .await
    }
}

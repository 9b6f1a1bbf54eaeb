//! Backend selection
//!
//! A [`Backend`] turns the (account, container) of a [`ResourcePath`] into an
//! `object_store` instance. Azure is the production backend; the local and
//! in-memory backends serve tests and offline runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{BackoffConfig, ClientOptions, ObjectStore, RetryConfig};

use bfs_core::{Account, Error, ResourcePath, Result, StorageKind};

/// Environment variable selecting the backend: `azure`, `memory` or `local:<dir>`
pub const BACKEND_ENV: &str = "BFS_BACKEND";

/// Where objects live
#[derive(Debug, Clone)]
pub enum Backend {
    /// Azure storage, with credentials from configured accounts or the environment
    Azure { accounts: Vec<Account> },
    /// A directory tree, `<root>/<account>/<container>/<key>`
    Local { root: PathBuf },
    /// Process-local memory
    Memory,
}

impl Backend {
    /// Parse a backend name as accepted by [`BACKEND_ENV`]
    pub fn parse(spec: &str, accounts: Vec<Account>) -> Result<Self> {
        match spec.split_once(':') {
            Some(("local", root)) if !root.is_empty() => Ok(Backend::Local {
                root: PathBuf::from(root),
            }),
            _ => match spec {
                "" | "azure" => Ok(Backend::Azure { accounts }),
                "memory" => Ok(Backend::Memory),
                other => Err(Error::Config(format!(
                    "Unknown backend '{other}', expected azure, memory or local:<dir>"
                ))),
            },
        }
    }

    /// Backend named by [`BACKEND_ENV`], Azure when unset
    pub fn from_env(accounts: Vec<Account>) -> Result<Self> {
        let spec = std::env::var(BACKEND_ENV).unwrap_or_default();
        Self::parse(&spec, accounts)
    }

    /// Open the store holding `path`'s container
    pub fn open(&self, path: &ResourcePath) -> Result<Arc<dyn ObjectStore>> {
        if path.storage_kind == StorageKind::Queue {
            return Err(Error::UnsupportedFeature(format!(
                "queue storage is not backed by an object store: {}",
                path.container_url()
            )));
        }
        match self {
            Backend::Azure { accounts } => {
                let account = accounts.iter().find(|a| a.name == path.account());
                open_azure(path, account)
            }
            Backend::Local { root } => {
                let dir = root.join(path.account()).join(&path.container);
                std::fs::create_dir_all(&dir)?;
                let store = LocalFileSystem::new_with_prefix(&dir)
                    .map_err(|e| Error::Config(format!("{}: {e}", dir.display())))?;
                Ok(Arc::new(store))
            }
            Backend::Memory => Ok(Arc::new(InMemory::new())),
        }
    }
}

fn open_azure(path: &ResourcePath, account: Option<&Account>) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = MicrosoftAzureBuilder::from_env()
        .with_account(path.account())
        .with_container_name(&path.container);

    if let Some(account) = account {
        if let Some(access_key) = &account.access_key {
            builder = builder.with_access_key(access_key);
        }
        if let Some(endpoint) = &account.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        builder = builder
            .with_use_emulator(account.use_emulator)
            .with_retry(retry_config(account))
            .with_client_options(client_options(account));
    } else {
        tracing::debug!(account = %path.account(), "no configured account, using environment credentials");
    }

    let store = builder
        .build()
        .map_err(|e| Error::Auth(format!("{}: {e}", path.container_url())))?;
    Ok(Arc::new(store))
}

fn retry_config(account: &Account) -> RetryConfig {
    let retry = account.retry_config();
    RetryConfig {
        backoff: BackoffConfig {
            init_backoff: Duration::from_millis(retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(retry.max_backoff_ms),
            ..BackoffConfig::default()
        },
        max_retries: retry.max_attempts as usize,
        ..RetryConfig::default()
    }
}

fn client_options(account: &Account) -> ClientOptions {
    let timeout = account.timeout_config();
    ClientOptions::new()
        .with_connect_timeout(Duration::from_millis(timeout.connect_ms))
        .with_timeout(Duration::from_millis(timeout.read_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfs_core::decode_path;

    #[test]
    fn test_parse_backend() {
        assert!(matches!(
            Backend::parse("", vec![]).unwrap(),
            Backend::Azure { .. }
        ));
        assert!(matches!(
            Backend::parse("memory", vec![]).unwrap(),
            Backend::Memory
        ));
        match Backend::parse("local:/tmp/bfs", vec![]).unwrap() {
            Backend::Local { root } => assert_eq!(root, PathBuf::from("/tmp/bfs")),
            other => panic!("unexpected backend {other:?}"),
        }
        assert!(matches!(
            Backend::parse("s3", vec![]),
            Err(Error::Config(_))
        ));
        assert!(Backend::parse("local:", vec![]).is_err());
    }

    #[test]
    fn test_queue_is_unsupported() {
        let path = decode_path("https://acct.queue.core.windows.net/jobs").unwrap();
        assert!(matches!(
            Backend::Memory.open(&path),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_local_backend_creates_container_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let backend = Backend::Local {
            root: temp_dir.path().to_path_buf(),
        };
        let path = decode_path("https://acct.blob.core.windows.net/data/a.csv").unwrap();
        backend.open(&path).unwrap();
        assert!(temp_dir.path().join("acct").join("data").is_dir());
    }

    #[test]
    fn test_retry_and_timeouts_from_account() {
        let mut account = Account::new("acct");
        account.retry = Some(bfs_core::RetryConfig {
            max_attempts: 7,
            initial_backoff_ms: 50,
            max_backoff_ms: 500,
        });
        let retry = retry_config(&account);
        assert_eq!(retry.max_retries, 7);
        assert_eq!(retry.backoff.init_backoff, Duration::from_millis(50));
        assert_eq!(retry.backoff.max_backoff, Duration::from_millis(500));
    }
}

//! Configuration management
//!
//! This module handles loading, saving, and migrating the blobfs configuration file.
//! The configuration file is stored in TOML format at `<config_dir>/blobfs/config.toml`,
//! or in the directory named by `BFS_CONFIG_DIR`.
//!
//! Changes to schema_version require migration support.

use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::{Error, Result};
use crate::path::StorageSite;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BFS_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Default output format
const DEFAULT_OUTPUT: &str = "human";

/// Default color setting
const DEFAULT_COLOR: &str = "auto";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Configured storage accounts
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Config {
    /// Account settings for a URL's account name
    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Workers for parallel reads (logical CPUs when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,

    /// Scheme of URLs built from account names
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Domain of URLs built from account names
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Table format when none is given
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_scheme() -> String {
    StorageSite::default().scheme
}

fn default_domain() -> String {
    StorageSite::default().domain
}

fn default_format() -> String {
    "csv".to_string()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
            worker_count: None,
            scheme: default_scheme(),
            domain: default_domain(),
            format: default_format(),
        }
    }
}

impl Defaults {
    pub fn site(&self) -> StorageSite {
        StorageSite {
            scheme: self.scheme.clone(),
            domain: self.domain.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            accounts: Vec::new(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_path = resolve_config_path(std::env::var_os(CONFIG_DIR_ENV))?;
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade bfs.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        tracing::debug!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "migrating configuration"
        );
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

fn resolve_config_path(dir_override: Option<OsString>) -> Result<PathBuf> {
    if let Some(dir) = dir_override.filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join(CONFIG_FILE));
    }
    let config_dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
    Ok(config_dir.join("blobfs").join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.output, "human");
        assert_eq!(config.defaults.color, "auto");
        assert!(config.defaults.progress);
        assert_eq!(config.defaults.site(), StorageSite::default());
        assert_eq!(config.defaults.format, "csv");
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_config_dir_override() {
        let path = resolve_config_path(Some(OsString::from("/tmp/bfs-test"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/bfs-test/config.toml"));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.defaults.worker_count = Some(4);
        config.accounts.push(Account::new("prod").with_access_key("key"));

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.accounts.len(), 1);
        assert_eq!(loaded.account("prod").unwrap().access_key.as_deref(), Some("key"));
        assert_eq!(loaded.defaults.worker_count, Some(4));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            "schema_version = 1\n[defaults]\ndomain = \"localhost\"\n",
        )
        .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.defaults.domain, "localhost");
        assert_eq!(config.defaults.scheme, "https");
        assert!(config.defaults.worker_count.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (manager, _temp_dir) = temp_config_manager();
        manager.save(&Config::default()).unwrap();
        let mode = std::fs::metadata(manager.config_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("newer than supported")
        );
    }
}

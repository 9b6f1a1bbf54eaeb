//! Storage account management
//!
//! Accounts hold the credentials and connection settings used when a URL
//! names `<account>.<kind>.<domain>`.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Retry configuration for an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration for an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// A storage account and how to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account name, the first label of the URL authority
    pub name: String,

    /// Shared access key; environment credentials are used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Endpoint override, e.g. a local emulator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Talk to the local storage emulator
    #[serde(default)]
    pub use_emulator: bool,

    /// Retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

impl Account {
    /// Create a new account with no credentials
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access_key: None,
            endpoint: None,
            use_emulator: false,
            retry: None,
            timeout: None,
        }
    }

    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Get the effective retry configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }
}

/// Manager for account operations
pub struct AccountManager {
    config_manager: ConfigManager,
}

impl AccountManager {
    /// Create a new AccountManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new AccountManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// List all configured accounts
    pub fn list(&self) -> Result<Vec<Account>> {
        let config = self.config_manager.load()?;
        Ok(config.accounts)
    }

    /// Get an account by name
    pub fn get(&self, name: &str) -> Result<Account> {
        let config = self.config_manager.load()?;
        config
            .accounts
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))
    }

    /// Add or update an account
    pub fn set(&self, account: Account) -> Result<()> {
        let mut config = self.config_manager.load()?;

        config.accounts.retain(|a| a.name != account.name);
        config.accounts.push(account);

        self.config_manager.save(&config)
    }

    /// Remove an account
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.accounts.len();

        config.accounts.retain(|a| a.name != name);

        if config.accounts.len() == original_len {
            return Err(Error::AccountNotFound(name.to_string()));
        }

        self.config_manager.save(&config)
    }

    /// Check if an account exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.accounts.iter().any(|a| a.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_account_manager() -> (AccountManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_manager = ConfigManager::with_path(config_path);
        let account_manager = AccountManager::with_config_manager(config_manager);
        (account_manager, temp_dir)
    }

    #[test]
    fn test_account_new() {
        let account = Account::new("prod");
        assert_eq!(account.name, "prod");
        assert!(account.access_key.is_none());
        assert!(!account.use_emulator);
        assert_eq!(account.retry_config().max_attempts, 3);
        assert_eq!(account.timeout_config().read_ms, 30000);
    }

    #[test]
    fn test_account_manager_set_and_get() {
        let (manager, _temp_dir) = temp_account_manager();

        manager
            .set(Account::new("prod").with_access_key("c2VjcmV0"))
            .unwrap();

        let retrieved = manager.get("prod").unwrap();
        assert_eq!(retrieved.access_key.as_deref(), Some("c2VjcmV0"));
    }

    #[test]
    fn test_account_manager_list_and_update() {
        let (manager, _temp_dir) = temp_account_manager();

        manager.set(Account::new("a")).unwrap();
        manager.set(Account::new("b")).unwrap();
        manager
            .set(Account::new("a").with_endpoint("http://127.0.0.1:10000"))
            .unwrap();

        let accounts = manager.list().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(
            manager.get("a").unwrap().endpoint.as_deref(),
            Some("http://127.0.0.1:10000")
        );
    }

    #[test]
    fn test_account_manager_remove() {
        let (manager, _temp_dir) = temp_account_manager();

        manager.set(Account::new("prod")).unwrap();
        assert!(manager.exists("prod").unwrap());

        manager.remove("prod").unwrap();
        assert!(!manager.exists("prod").unwrap());
    }

    #[test]
    fn test_account_manager_not_found() {
        let (manager, _temp_dir) = temp_account_manager();

        assert!(matches!(
            manager.remove("nonexistent"),
            Err(Error::AccountNotFound(_))
        ));
        assert!(matches!(
            manager.get("nonexistent"),
            Err(Error::AccountNotFound(_))
        ));
    }
}

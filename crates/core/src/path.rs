//! Path parsing and resolution
//!
//! Handles parsing of resource URLs in the format:
//! `<scheme>://<account>.<kind>.<domain>/<container>[/<key>]`
//!
//! Decoding is purely syntactic. Wildcards and bracket characters in the key
//! are kept verbatim so glob patterns survive the round trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Wildcard character accepted in key paths
pub const WILDCARD: char = '*';

/// Storage flavour named by the second authority label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// `blob`: flat namespace, `/` is only a naming convention
    Flat,
    /// `dfs`: hierarchical namespace
    Hierarchical,
    /// `queue`: message queues, listed as raw names
    Queue,
}

impl StorageKind {
    /// Resolve an authority label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "blob" => Some(StorageKind::Flat),
            "dfs" => Some(StorageKind::Hierarchical),
            "queue" => Some(StorageKind::Queue),
            _ => None,
        }
    }

    /// Authority label of this kind
    pub const fn label(&self) -> &'static str {
        match self {
            StorageKind::Flat => "blob",
            StorageKind::Hierarchical => "dfs",
            StorageKind::Queue => "queue",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown storage kind '{s}'")))
    }
}

/// Scheme and domain used when a service root has to be built from an account name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSite {
    pub scheme: String,
    pub domain: String,
}

impl Default for StorageSite {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            domain: "core.windows.net".to_string(),
        }
    }
}

impl StorageSite {
    /// Service root for an account, e.g. `https://acct.blob.core.windows.net`
    pub fn service_root(&self, account: &str, kind: StorageKind) -> String {
        format!("{}://{account}.{}.{}", self.scheme, kind.label(), self.domain)
    }
}

/// A decoded resource URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    /// `<scheme>://<authority>` without a trailing slash
    pub service_root: String,
    /// Kind inferred from the authority
    pub storage_kind: StorageKind,
    /// Container name
    pub container: String,
    /// Key below the container (empty for the container root)
    pub key_path: String,
}

impl ResourcePath {
    /// Create a new ResourcePath
    pub fn new(
        service_root: impl Into<String>,
        storage_kind: StorageKind,
        container: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Self {
        Self {
            service_root: service_root.into(),
            storage_kind,
            container: container.into(),
            key_path: key_path.into(),
        }
    }

    /// Storage account, the first authority label
    pub fn account(&self) -> &str {
        let authority = self
            .service_root
            .split_once("://")
            .map_or(self.service_root.as_str(), |(_, rest)| rest);
        authority.split('.').next().unwrap_or(authority)
    }

    /// Render the URL this path was decoded from
    pub fn to_url(&self) -> String {
        if self.key_path.is_empty() {
            self.container_url()
        } else {
            format!("{}/{}/{}", self.service_root, self.container, self.key_path)
        }
    }

    /// URL of the container root
    pub fn container_url(&self) -> String {
        format!("{}/{}", self.service_root, self.container)
    }

    /// Whether the key addresses a folder-like prefix
    pub fn is_dir(&self) -> bool {
        self.key_path.is_empty() || self.key_path.ends_with('/')
    }

    /// Whether the key contains a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.key_path.contains(WILDCARD)
    }

    /// Same container, different key
    pub fn with_key(&self, key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            ..self.clone()
        }
    }

    /// Join a child path component
    pub fn join(&self, child: &str) -> Self {
        let base = self.key_path.trim_end_matches('/');
        let child = child.trim_start_matches('/');
        let key = if base.is_empty() {
            child.to_string()
        } else {
            format!("{base}/{child}")
        };
        self.with_key(key)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

impl FromStr for ResourcePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_path(s)
    }
}

fn malformed(url: &str, reason: &str) -> Error {
    Error::MalformedPath(format!("{url}: {reason}"))
}

/// Decode a resource URL into its parts
///
/// Fails with [`Error::MalformedPath`] when the URL lacks a scheme, the
/// authority is not `<account>.<kind>.<domain>`, the kind label is unknown, or
/// there is no container segment.
pub fn decode_path(url: &str) -> Result<ResourcePath> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| malformed(url, "missing scheme"))?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return Err(malformed(url, "invalid scheme"));
    }

    let (authority, path) = rest
        .split_once('/')
        .ok_or_else(|| malformed(url, "missing container"))?;

    let labels: Vec<&str> = authority.split('.').collect();
    if labels.len() < 3 || labels.iter().any(|label| label.is_empty()) {
        return Err(malformed(
            url,
            "authority must look like <account>.<kind>.<domain>",
        ));
    }
    let storage_kind = StorageKind::from_label(labels[1])
        .ok_or_else(|| malformed(url, "unknown storage kind"))?;

    let service_root = format!("{scheme}://{authority}");
    url::Url::parse(&service_root).map_err(|e| malformed(url, &e.to_string()))?;

    let (container, key_path) = path.split_once('/').unwrap_or((path, ""));
    if container.is_empty() {
        return Err(malformed(url, "empty container"));
    }

    Ok(ResourcePath {
        service_root,
        storage_kind,
        container: container.to_string(),
        key_path: key_path.to_string(),
    })
}

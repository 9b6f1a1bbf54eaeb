//! Error types for bfs-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for bfs-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bfs-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL that does not follow `<scheme>://<account>.<kind>.<domain>/<container>/<key>`
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// Glob pattern without any `*`
    #[error("Pattern has no `*` wildcard: {0}")]
    NoWildcard(String),

    /// Glob pattern with a `*` in the first segment below the container
    #[error("Cannot use `*` in the root folder of a container: {0}")]
    RootWildcard(String),

    /// A table read was requested with nothing to read
    #[error("Nothing to read: {0}")]
    EmptyTaskList(String),

    /// First failing task of a table load
    #[error("Failed to load {path}: {source}")]
    TaskFailure {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// A plugin returned something other than a table or a sequence of tables
    #[error("Plugin '{name}' returned {found}, expected a table or a sequence of tables")]
    ReturnShape { name: String, found: String },

    /// A plugin returned a different number of tables than a tag has destinations
    #[error(
        "Plugin '{name}' returned {returned} tables but tag '{tag}' resolves {destinations} destinations"
    )]
    OutputCountMismatch {
        name: String,
        tag: String,
        returned: usize,
        destinations: usize,
    },

    /// Account not found in the configuration
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad argument from the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feature not supported by backend
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// File extension or format name with no codec
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Arrow encode/decode failure
    #[error("Codec error: {0}")]
    Codec(#[from] arrow::error::ArrowError),

    /// Parquet encode/decode failure
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Transform applied to a loaded table failed
    #[error("Transform '{name}' failed: {source}")]
    Transform { name: String, source: anyhow::Error },

    /// No plugin registered under the name
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// A plugin function returned an error
    #[error("Plugin '{name}' failed: {source}")]
    Plugin { name: String, source: anyhow::Error },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap the error of a single read task with the path it was reading
    pub fn task_failure(path: impl ToString, source: Error) -> Self {
        Error::TaskFailure {
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedPath(_)
            | Error::NoWildcard(_)
            | Error::RootWildcard(_)
            | Error::InvalidInput(_)
            | Error::InvalidUrl(_)
            | Error::Config(_) => 2, // UsageError
            Error::Network(_) => 3,  // NetworkError
            Error::Auth(_) => 4,     // AuthError
            Error::NotFound(_) | Error::AccountNotFound(_) | Error::PluginNotFound(_) => 5, // NotFound
            Error::Conflict(_) => 6, // Conflict
            Error::UnsupportedFeature(_) | Error::UnsupportedFormat(_) => 7, // UnsupportedFeature
            Error::TaskFailure { source, .. } => source.exit_code(),
            _ => 1, // GeneralError
        }
    }
}

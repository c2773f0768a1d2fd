//! Error types for topogen.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for topogen.
#[derive(Error, Debug)]
pub enum TopogenError {
    #[error(
        "Base config not found at {0}. Run the config bootstrap first to produce a homeserver config."
    )]
    MissingBaseConfig(PathBuf),

    #[error("Failed to parse base config {path}: {source}")]
    BaseConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for topogen operations.
pub type Result<T> = std::result::Result<T, TopogenError>;

//! Error types for leadsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the domain model and the fixture loader.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure (fixture file missing, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The status ↔ container mapping is not a bijection.
    #[error("invalid container map: {0}")]
    InvalidContainerMap(String),

    /// A status string matched no synonym while the policy forbids defaulting.
    #[error("unrecognized status '{0}'")]
    UnrecognizedStatus(String),

    /// A non-blank lead row carries no id, so it cannot be joined.
    #[error("lead at row {row} has no id")]
    MissingLeadId { row: usize },

    /// A value that must be one of a fixed set was something else.
    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },
}

/// Errors raised while loading or validating [`crate::config::SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required settings are absent. All are reported together.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A setting is present but cannot be parsed.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The config file exists but could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`crate::config::FileConfig`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}

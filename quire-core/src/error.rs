//! Error types for quire-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML/JSON parse error, with the line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration parsed but describes an unusable setup.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Rejected destination key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("destination key is empty")]
    Empty,

    #[error("destination key must be relative: {0}")]
    Absolute(String),

    #[error("destination key has an invalid segment: {0}")]
    BadSegment(String),
}

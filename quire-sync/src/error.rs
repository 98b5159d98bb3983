//! Error types for quire-sync.
//!
//! Three tiers, matching how far a failure reaches:
//! - [`StorageError`] — one backend call.
//! - [`SyncError`] — one content item; recorded in the run report, the run goes on.
//! - [`PublishError`] — the whole run; aborts before completion.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use quire_core::{ConfigError, KeyError};
use quire_renderer::RenderError;

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by a remote store. `transient` marks it as worth retrying.
    #[error("remote store error: {message}")]
    Remote { message: String, transient: bool },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl StorageError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Timeout(_) => true,
            StorageError::Remote { transient, .. } => *transient,
            StorageError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            StorageError::NotFound(_) | StorageError::InvalidKey(_) | StorageError::Cancelled => {
                false
            }
        }
    }
}

/// Failure of one content item. The run continues.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Reading the local source failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure that aborts a publish run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The source tree could not be listed or read.
    #[error("cannot enumerate sources at {path}: {source}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required layout template is missing.
    #[error("required template missing: {path}")]
    TemplateMissing { path: PathBuf },

    #[error("render error: {0}")]
    Render(RenderError),

    #[error("invalid destination key: {0}")]
    Key(#[from] KeyError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage setup failed: {0}")]
    Backend(StorageError),

    #[error("publish run cancelled")]
    Cancelled,
}

impl From<RenderError> for PublishError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::TemplateMissing { path } => PublishError::TemplateMissing { path },
            other => PublishError::Render(other),
        }
    }
}

/// Convenience constructor for [`StorageError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`PublishError::Enumeration`].
pub(crate) fn enum_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Enumeration {
        path: path.into(),
        source,
    }
}

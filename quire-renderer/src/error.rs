//! Error types for quire-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// A layout file exists but cannot be used.
    #[error("invalid layout {path}: {message}")]
    Layout { path: PathBuf, message: String },

    /// A required layout file does not exist.
    #[error("required template missing: {path}")]
    TemplateMissing { path: PathBuf },

    /// Filesystem error while loading layouts.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

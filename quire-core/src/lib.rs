//! Quire core library — domain types, site configuration, errors.
//!
//! Public API surface:
//! - [`types`] — destination keys, content items, article metadata
//! - [`config`] — [`SiteConfig`] load / validate / backend selection
//! - [`error`] — [`ConfigError`], [`KeyError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{FeedConfig, PublishTuning, SiteConfig, StorageTarget};
pub use error::{ConfigError, KeyError};
pub use types::{
    ArticleMetadata, ContentItem, ContentKind, DestinationKey, FileItem, TextItem,
};

//! Storage backend abstraction.
//!
//! A backend is a thin adapter over one object store. It reports raw results;
//! the policy that turns lookup errors into "changed" lives in
//! [`crate::lookup`].

use std::path::Path;

use async_trait::async_trait;

use quire_core::DestinationKey;

use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

/// Whether a backend can report a content tag for a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSupport {
    Supported,
    /// Every item is treated as changed and written on every run.
    Unsupported,
}

/// One completed write, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectWritten {
    pub key: DestinationKey,
    pub content_type: String,
    pub bytes: u64,
}

/// Remote side of a change decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTag {
    Present(Fingerprint),
    /// The store confirmed there is no object at the key.
    Absent,
    /// The lookup failed for any other reason, after retries.
    LookupFailed(String),
}

impl RemoteTag {
    /// True only for a present tag equal to `local`.
    pub fn matches(&self, local: &Fingerprint) -> bool {
        matches!(self, RemoteTag::Present(remote) if remote == local)
    }
}

/// Object store operations used by a publish run.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name for logs, e.g. `s3`.
    fn name(&self) -> &'static str;

    fn tag_support(&self) -> TagSupport;

    /// Stored tag at `key`. `Ok(None)` means the object is confirmed absent.
    async fn lookup_tag(&self, key: &DestinationKey) -> Result<Option<Fingerprint>, StorageError>;

    /// Store a text body, publicly readable, with the given content type.
    async fn put_text(
        &self,
        key: &DestinationKey,
        body: &str,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError>;

    /// Store a file's bytes as-is, streamed from `path`.
    async fn put_file(
        &self,
        key: &DestinationKey,
        path: &Path,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError>;

    /// Store a redirect at `key` pointing at `location`.
    async fn put_redirect(
        &self,
        key: &DestinationKey,
        location: &str,
    ) -> Result<ObjectWritten, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_equal_present_tag_matches() {
        let local = Fingerprint::from_etag("abc");
        assert!(RemoteTag::Present(Fingerprint::from_etag("\"abc\"")).matches(&local));
        assert!(!RemoteTag::Present(Fingerprint::from_etag("abd")).matches(&local));
        assert!(!RemoteTag::Absent.matches(&local));
        assert!(!RemoteTag::LookupFailed("503".into()).matches(&local));
    }
}

//! Change detection: local fingerprint against the remote tag.

use std::sync::Arc;

use quire_core::ContentItem;

use crate::backend::{RemoteTag, StorageBackend, TagSupport};
use crate::cancel::CancelSignal;
use crate::error::SyncError;
use crate::fingerprint::{fingerprint_bytes_with, fingerprint_file, Fingerprint, MultipartPolicy};
use crate::lookup::lookup_remote_tag;
use crate::retry::RetryPolicy;

/// Why an item counts as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// No object at the key.
    NewObject,
    /// Stored tag differs from the local fingerprint.
    ContentDiffers,
    /// The remote tag could not be read.
    LookupFailed,
    /// The backend keeps no tags.
    NoTagSupport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRecord {
    Unchanged,
    Changed { reason: ChangeReason },
}

impl ChangeRecord {
    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeRecord::Changed { .. })
    }
}

/// Everything the detector learned about one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub record: ChangeRecord,
    /// `None` when the backend keeps no tags and nothing was hashed.
    pub local: Option<Fingerprint>,
    pub remote: RemoteTag,
}

pub struct ChangeDetector {
    backend: Arc<dyn StorageBackend>,
    retry: RetryPolicy,
    cancel: CancelSignal,
    multipart: MultipartPolicy,
}

impl ChangeDetector {
    pub fn new(backend: Arc<dyn StorageBackend>, retry: RetryPolicy, cancel: CancelSignal) -> Self {
        Self {
            backend,
            retry,
            cancel,
            multipart: MultipartPolicy::STANDARD,
        }
    }

    /// Fingerprint of the bytes that would be uploaded for `item`.
    pub async fn local_fingerprint(&self, item: &ContentItem) -> Result<Fingerprint, SyncError> {
        match item {
            ContentItem::Text(text) => Ok(fingerprint_bytes_with(text.body.as_bytes(), self.multipart)),
            ContentItem::File(file) => fingerprint_file(&file.path, self.multipart).await,
        }
    }

    /// Decide whether `item` must be uploaded.
    ///
    /// Only a local read failure is an error. Lookup problems count as change.
    pub async fn decide(&self, item: &ContentItem) -> Result<Decision, SyncError> {
        if self.backend.tag_support() == TagSupport::Unsupported {
            return Ok(Decision {
                record: ChangeRecord::Changed {
                    reason: ChangeReason::NoTagSupport,
                },
                local: None,
                remote: RemoteTag::Absent,
            });
        }

        let local = self.local_fingerprint(item).await?;
        let remote = lookup_remote_tag(self.backend.as_ref(), item.key(), &self.retry, &self.cancel).await;

        let record = match &remote {
            tag if tag.matches(&local) => ChangeRecord::Unchanged,
            RemoteTag::Present(_) => ChangeRecord::Changed {
                reason: ChangeReason::ContentDiffers,
            },
            RemoteTag::Absent => ChangeRecord::Changed {
                reason: ChangeReason::NewObject,
            },
            RemoteTag::LookupFailed(_) => ChangeRecord::Changed {
                reason: ChangeReason::LookupFailed,
            },
        };

        tracing::debug!(
            key = %item.key(),
            fingerprint = %local,
            etag = ?remote,
            changed = record.is_changed(),
            "change decision"
        );
        Ok(Decision {
            record,
            local: Some(local),
            remote,
        })
    }
}

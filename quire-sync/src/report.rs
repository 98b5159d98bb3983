//! Structured result of a publish run.

use quire_core::DestinationKey;

use crate::backend::ObjectWritten;
use crate::detector::ChangeReason;
use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Uploaded,
    Unchanged,
    /// Dry run: changed, not written.
    WouldUpload,
    Failed,
}

/// What happened to one content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub key: DestinationKey,
    pub content_type: String,
    pub status: ItemStatus,
    pub reason: Option<ChangeReason>,
    pub fingerprint: Option<Fingerprint>,
    pub written: Vec<ObjectWritten>,
    /// Primary written, redirect alias not.
    pub alias_error: Option<String>,
    pub error: Option<String>,
}

impl ItemReport {
    pub(crate) fn new(key: DestinationKey, content_type: &str, status: ItemStatus) -> Self {
        Self {
            key,
            content_type: content_type.to_string(),
            status,
            reason: None,
            fingerprint: None,
            written: Vec::new(),
            alias_error: None,
            error: None,
        }
    }

    /// Counts toward the feed gate.
    pub fn is_change(&self) -> bool {
        matches!(self.status, ItemStatus::Uploaded | ItemStatus::WouldUpload)
    }
}

/// The feed step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Nothing changed, so the feed was left alone.
    NotNeeded,
    Published,
    /// Rebuilt, but identical to the stored feed.
    Unchanged,
    WouldPublish,
    Failed(String),
}

impl FeedOutcome {
    pub fn regenerated(&self) -> bool {
        !matches!(self, FeedOutcome::NotNeeded)
    }
}

/// Summary of a publish run that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// One entry per enumerated item, in enumeration order.
    pub items: Vec<ItemReport>,
    pub feed: FeedOutcome,
    pub dry_run: bool,
}

impl PublishReport {
    pub fn examined(&self) -> usize {
        self.items.len()
    }

    /// Items written (or, in a dry run, that would have been).
    pub fn uploaded(&self) -> usize {
        self.items.iter().filter(|i| i.is_change()).count()
    }

    pub fn unchanged(&self) -> usize {
        self.count(ItemStatus::Unchanged)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn alias_failures(&self) -> usize {
        self.items.iter().filter(|i| i.alias_error.is_some()).count()
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// No item, alias or feed failures.
    pub fn completed_cleanly(&self) -> bool {
        self.failed() == 0
            && self.alias_failures() == 0
            && !matches!(self.feed, FeedOutcome::Failed(_))
    }
}

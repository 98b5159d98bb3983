//! Upload executor: applies a change decision to the backend.
//!
//! A changed text item is written, then a redirect alias at `t/<key>`
//! pointing at `/<key>`. The alias is only attempted once the primary write
//! succeeded, and its failure never undoes the primary. Static files get no
//! alias.
//!
//! Primary writes are transfers: they get no whole-call deadline, the backend
//! bounds each request. Redirect aliases are single requests.

use std::sync::Arc;

use quire_core::{ContentItem, DestinationKey};

use crate::backend::{ObjectWritten, StorageBackend};
use crate::cancel::CancelSignal;
use crate::detector::ChangeRecord;
use crate::error::{StorageError, SyncError};
use crate::retry::{with_retry, with_retry_transfer, RetryPolicy};

/// Key prefix of redirect aliases.
pub const ALIAS_PREFIX: &str = "t";

/// Result of executing one item.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Remote copy already matches.
    Skipped,
    Uploaded {
        written: Vec<ObjectWritten>,
        /// Set when the primary was written but its alias was not.
        alias_error: Option<StorageError>,
    },
    /// Dry run: the item would have been uploaded.
    WouldUpload,
}

impl UploadOutcome {
    pub fn is_upload(&self) -> bool {
        !matches!(self, UploadOutcome::Skipped)
    }
}

/// `t/<key>` alias key and its `/<key>` target.
pub fn alias_for(key: &DestinationKey) -> Result<(DestinationKey, String), StorageError> {
    let alias = DestinationKey::join(ALIAS_PREFIX, key.as_str())
        .map_err(|e| StorageError::InvalidKey(e.to_string()))?;
    Ok((alias, format!("/{key}")))
}

pub struct UploadExecutor {
    backend: Arc<dyn StorageBackend>,
    retry: RetryPolicy,
    cancel: CancelSignal,
    dry_run: bool,
}

impl UploadExecutor {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        retry: RetryPolicy,
        cancel: CancelSignal,
        dry_run: bool,
    ) -> Self {
        Self {
            backend,
            retry,
            cancel,
            dry_run,
        }
    }

    pub async fn upload(
        &self,
        item: &ContentItem,
        record: &ChangeRecord,
    ) -> Result<UploadOutcome, SyncError> {
        let key = item.key();
        if !record.is_changed() {
            tracing::debug!(key = %key, "checksums match; not uploading");
            return Ok(UploadOutcome::Skipped);
        }
        if self.dry_run {
            tracing::info!(key = %key, content_type = item.content_type(), "[dry-run] would upload");
            return Ok(UploadOutcome::WouldUpload);
        }

        let backend = self.backend.as_ref();
        match item {
            ContentItem::Text(text) => {
                let content_type = text.content_type();
                let primary = with_retry_transfer(&self.retry, &self.cancel, "put_text", key, || {
                    backend.put_text(key, &text.body, content_type)
                })
                .await?;
                log_written(&primary);

                let mut written = vec![primary];
                let alias_error = match self.write_alias(key).await {
                    Ok(alias) => {
                        log_written(&alias);
                        written.push(alias);
                        None
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "redirect alias failed; primary object kept");
                        Some(err)
                    }
                };
                Ok(UploadOutcome::Uploaded {
                    written,
                    alias_error,
                })
            }
            ContentItem::File(file) => {
                let content_type = file.content_type.as_str();
                let primary = with_retry_transfer(&self.retry, &self.cancel, "put_file", key, || {
                    backend.put_file(key, &file.path, content_type)
                })
                .await?;
                log_written(&primary);
                Ok(UploadOutcome::Uploaded {
                    written: vec![primary],
                    alias_error: None,
                })
            }
        }
    }

    async fn write_alias(&self, key: &DestinationKey) -> Result<ObjectWritten, StorageError> {
        let (alias, location) = alias_for(key)?;
        let backend = self.backend.as_ref();
        with_retry(&self.retry, &self.cancel, "put_redirect", &alias, || {
            backend.put_redirect(&alias, &location)
        })
        .await
    }
}

fn log_written(w: &ObjectWritten) {
    tracing::info!(key = %w.key, content_type = %w.content_type, bytes = w.bytes, "uploaded");
}

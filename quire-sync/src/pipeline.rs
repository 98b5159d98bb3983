//! Publish orchestration.
//!
//! ```text
//! Start -> Enumerate -> per item { Detect -> Skip | Upload } -> Tally
//!       -> (changed > 0 ? build + Detect/Upload rss.xml : skip) -> Done
//! ```
//!
//! Items are processed by a bounded pool. Reports land in an index-addressed
//! buffer, so their order is the enumeration order whatever the completion
//! order. The feed is built from the enumeration-ordered article list.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use quire_core::{ContentItem, ContentKind, DestinationKey, SiteConfig, TextItem};
use quire_renderer::{FeedBuilder, SiteRenderer};

use crate::backend::StorageBackend;
use crate::cancel::CancelSignal;
use crate::detector::{ChangeDetector, ChangeRecord};
use crate::enumerate::plan_site;
use crate::error::PublishError;
use crate::executor::{UploadExecutor, UploadOutcome};
use crate::report::{FeedOutcome, ItemReport, ItemStatus, PublishReport};
use crate::retry::RetryPolicy;

pub const FEED_KEY: &str = "rss.xml";

/// Knobs for one publish run.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub dry_run: bool,
    /// Items in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub cancel: CancelSignal,
}

impl PublishOptions {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            dry_run: false,
            concurrency: config.publish.concurrency.max(1),
            retry: RetryPolicy::from(&config.publish),
            cancel: CancelSignal::never(),
        }
    }
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::from_config(&SiteConfig::default())
    }
}

struct Workers {
    detector: ChangeDetector,
    executor: UploadExecutor,
}

impl Workers {
    /// Detect and upload one item. Never fails the run.
    async fn process(&self, item: &ContentItem) -> ItemReport {
        let key = item.key();
        let mut report = ItemReport::new(key.clone(), item.content_type(), ItemStatus::Failed);

        let decision = match self.detector.decide(item).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(key = %key, content_type = item.content_type(), error = %err, "cannot read item source");
                report.error = Some(err.to_string());
                return report;
            }
        };
        report.fingerprint = decision.local.clone();
        if let ChangeRecord::Changed { reason } = decision.record {
            report.reason = Some(reason);
        }

        match self.executor.upload(item, &decision.record).await {
            Ok(UploadOutcome::Skipped) => report.status = ItemStatus::Unchanged,
            Ok(UploadOutcome::WouldUpload) => report.status = ItemStatus::WouldUpload,
            Ok(UploadOutcome::Uploaded {
                written,
                alias_error,
            }) => {
                report.status = ItemStatus::Uploaded;
                report.written = written;
                report.alias_error = alias_error.map(|e| e.to_string());
            }
            Err(err) => {
                tracing::warn!(key = %key, content_type = item.content_type(), error = %err, "upload failed");
                report.error = Some(err.to_string());
            }
        }
        report
    }
}

/// Publish the site at `source` to `backend`.
///
/// Item failures are recorded in the report and the run goes on. Only
/// enumeration, template and cancellation problems abort.
pub async fn publish(
    source: &Path,
    config: &SiteConfig,
    backend: Arc<dyn StorageBackend>,
    options: PublishOptions,
) -> Result<PublishReport, PublishError> {
    let renderer = SiteRenderer::new(source).inspect_err(|e| {
        tracing::error!(source = %source.display(), error = %e, "cannot load layouts");
    })?;
    let plan = plan_site(source, config, &renderer).inspect_err(|e| {
        tracing::error!(source = %source.display(), error = %e, "cannot enumerate site");
    })?;
    tracing::info!(
        items = plan.items.len(),
        backend = backend.name(),
        dry_run = options.dry_run,
        "publishing"
    );

    let cancel = options.cancel.clone();
    if cancel.is_cancelled() {
        return Err(PublishError::Cancelled);
    }

    let workers = Workers {
        detector: ChangeDetector::new(backend.clone(), options.retry.clone(), cancel.clone()),
        executor: UploadExecutor::new(
            backend.clone(),
            options.retry.clone(),
            cancel.clone(),
            options.dry_run,
        ),
    };

    let changed = AtomicUsize::new(0);
    let mut slots: Vec<Option<ItemReport>> = vec![None; plan.items.len()];
    {
        let workers = &workers;
        let changed = &changed;
        let mut results = stream::iter(plan.items.iter().enumerate())
            .map(|(idx, item)| async move {
                let report = workers.process(item).await;
                if report.is_change() {
                    changed.fetch_add(1, Ordering::SeqCst);
                }
                (idx, report)
            })
            .buffer_unordered(options.concurrency.max(1));
        while let Some((idx, report)) = results.next().await {
            slots[idx] = Some(report);
        }
    }

    if cancel.is_cancelled() {
        tracing::error!("publish run cancelled");
        return Err(PublishError::Cancelled);
    }

    let changed = changed.load(Ordering::SeqCst);
    let feed = if changed == 0 {
        tracing::info!("no changes; feed not regenerated");
        FeedOutcome::NotNeeded
    } else {
        publish_feed(&workers, &renderer, config, &plan.articles).await?
    };
    if cancel.is_cancelled() {
        tracing::error!("publish run cancelled");
        return Err(PublishError::Cancelled);
    }

    let report = PublishReport {
        items: slots.into_iter().flatten().collect(),
        feed,
        dry_run: options.dry_run,
    };
    tracing::info!(
        examined = report.examined(),
        uploaded = report.uploaded(),
        unchanged = report.unchanged(),
        failed = report.failed(),
        feed = ?report.feed,
        "publish run complete"
    );
    Ok(report)
}

async fn publish_feed(
    workers: &Workers,
    renderer: &SiteRenderer,
    config: &SiteConfig,
    articles: &[quire_core::ArticleMetadata],
) -> Result<FeedOutcome, PublishError> {
    let body = match FeedBuilder::new(&config.rss).build(renderer, articles, Utc::now()) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(error = %err, "cannot render feed");
            return Ok(FeedOutcome::Failed(err.to_string()));
        }
    };
    let item: ContentItem = TextItem {
        key: DestinationKey::parse(FEED_KEY)?,
        body,
        kind: ContentKind::Feed,
    }
    .into();

    let report = workers.process(&item).await;
    Ok(match report.status {
        ItemStatus::Uploaded => FeedOutcome::Published,
        ItemStatus::Unchanged => FeedOutcome::Unchanged,
        ItemStatus::WouldUpload => FeedOutcome::WouldPublish,
        ItemStatus::Failed => FeedOutcome::Failed(report.error.unwrap_or_default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("layouts")).unwrap();
        std::fs::create_dir_all(root.join("posts_source")).unwrap();
        std::fs::write(root.join("layouts/header.inc"), "<title>{title}</title>").unwrap();
        std::fs::write(root.join("layouts/footer.inc"), "").unwrap();
        std::fs::write(root.join("posts_source/2024-01-05-a.md"), "# A\n").unwrap();
        dir
    }

    fn config() -> SiteConfig {
        SiteConfig {
            bucket: Some("blog".into()),
            ..SiteConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_layout_aborts_before_any_write() {
        let dir = site();
        std::fs::remove_file(dir.path().join("layouts/footer.inc")).unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let err = publish(dir.path(), &config(), backend.clone(), PublishOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::TemplateMissing { .. }));
        assert!(backend.events().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancelled() {
        let dir = site();
        let (handle, signal) = crate::cancel::cancel_pair();
        handle.cancel();
        let options = PublishOptions {
            cancel: signal,
            ..PublishOptions::default()
        };
        let backend = Arc::new(MemoryBackend::new());
        let err = publish(dir.path(), &config(), backend.clone(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Cancelled));
        assert!(backend.events().is_empty());
    }

    #[tokio::test]
    async fn first_run_publishes_feed() {
        let dir = site();
        let backend = Arc::new(MemoryBackend::new());
        let report = publish(dir.path(), &config(), backend.clone(), PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(report.feed, FeedOutcome::Published);
        let rss = backend.object(FEED_KEY).unwrap();
        assert_eq!(rss.content_type, "application/rss+xml");
        assert!(backend.object("t/rss.xml").is_some());
    }
}

//! `quire publish` — render the site and upload what changed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use quire_core::config;
use quire_sync::{
    backends, cancel_pair, publish, FeedOutcome, ItemStatus, PublishOptions, PublishReport,
};

/// Exit status for a run that completed with failed items.
const EXIT_ITEM_FAILURES: u8 = 2;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Site configuration (YAML or JSON).
    #[arg(long, short, default_value = "quire.yaml")]
    pub config: PathBuf,

    /// Site source directory, holding `layouts/` and `posts_source/`.
    #[arg(long, short, default_value = ".")]
    pub source: PathBuf,

    /// Decide what would be uploaded without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Items processed at once (overrides `publish.concurrency`).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl PublishArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let site = config::load_at(&self.config)
            .with_context(|| format!("cannot load config {}", self.config.display()))?;
        let backend = backends::from_config(&site)
            .await
            .context("cannot set up storage backend")?;

        let (handle, signal) = cancel_pair();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; cancelling publish run");
                handle.cancel();
            }
        });

        let mut options = PublishOptions::from_config(&site);
        options.dry_run = self.dry_run;
        options.cancel = signal;
        if let Some(n) = self.concurrency {
            options.concurrency = n.max(1);
        }

        let report = publish(&self.source, &site, backend, options)
            .await
            .with_context(|| format!("publish of {} aborted", self.source.display()))?;

        print_report(&report);
        if report.failed() > 0 {
            Ok(ExitCode::from(EXIT_ITEM_FAILURES))
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn feed_label(feed: &FeedOutcome) -> String {
    match feed {
        FeedOutcome::NotNeeded => "not regenerated".to_string(),
        FeedOutcome::Published => "published".to_string(),
        FeedOutcome::Unchanged => "regenerated, unchanged".to_string(),
        FeedOutcome::WouldPublish => "would publish".to_string(),
        FeedOutcome::Failed(err) => format!("failed: {err}"),
    }
}

fn print_report(report: &PublishReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let mark = if report.completed_cleanly() {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };

    println!(
        "{prefix}{mark} {} examined, {} uploaded, {} unchanged, {} failed; feed {}",
        report.examined(),
        report.uploaded(),
        report.unchanged(),
        report.failed(),
        feed_label(&report.feed)
    );

    for item in &report.items {
        match item.status {
            ItemStatus::Uploaded => println!("  ✎  {}", item.key),
            ItemStatus::WouldUpload => println!("  ~  {}", item.key),
            ItemStatus::Unchanged => println!("  ·  {}", item.key),
            ItemStatus::Failed => println!(
                "  {}  {} ({})",
                "✗".red().bold(),
                item.key,
                item.error.as_deref().unwrap_or("unknown error")
            ),
        }
        if let Some(err) = &item.alias_error {
            println!("     {} redirect alias: {err}", "!".yellow());
        }
    }
}

//! RSS feed assembly from per-article metadata.

use chrono::{DateTime, NaiveDate, Utc};

use quire_core::{ArticleMetadata, FeedConfig};

use crate::context::{ChannelCtx, FeedCtx, FeedItemCtx};
use crate::engine::SiteRenderer;
use crate::error::RenderError;

/// Builds the `rss.xml` document for a publish run.
pub struct FeedBuilder<'a> {
    config: &'a FeedConfig,
}

fn rfc2822_midnight(date: NaiveDate) -> String {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().to_rfc2822())
        .unwrap_or_default()
}

impl<'a> FeedBuilder<'a> {
    pub fn new(config: &'a FeedConfig) -> Self {
        Self { config }
    }

    /// Canonical URL of an article: base URL + posts path + article url.
    pub fn article_link(&self, article: &ArticleMetadata) -> String {
        format!("{}{}{}", self.config.url, self.config.posts_dir, article.url)
    }

    /// Feed payload, most recent first.
    ///
    /// `articles` is expected in enumeration order (filename descending); the
    /// sort by date is stable, so same-day articles keep that order. Articles
    /// without a publish date are left out.
    pub fn context(&self, articles: &[ArticleMetadata], now: DateTime<Utc>) -> FeedCtx {
        let mut dated: Vec<(&ArticleMetadata, NaiveDate)> = articles
            .iter()
            .filter_map(|a| match a.date {
                Some(date) => Some((a, date)),
                None => {
                    tracing::warn!(slug = %a.slug, "article has no publish date; left out of feed");
                    None
                }
            })
            .collect();
        dated.sort_by(|a, b| b.1.cmp(&a.1));

        let items = dated
            .into_iter()
            .map(|(article, date)| FeedItemCtx {
                title: article.title.clone(),
                link: self.article_link(article),
                author: article.author.clone(),
                description: article.abstract_text.clone(),
                pub_date: rfc2822_midnight(date),
            })
            .collect();

        FeedCtx {
            channel: ChannelCtx {
                title: self.config.title.clone(),
                link: self.config.url.clone(),
                description: self.config.description.clone(),
                language: self.config.lang.clone(),
                last_build_date: now.to_rfc2822(),
                generator_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            items,
        }
    }

    /// Render the feed XML.
    pub fn build(
        &self,
        renderer: &SiteRenderer,
        articles: &[ArticleMetadata],
        now: DateTime<Utc>,
    ) -> Result<String, RenderError> {
        renderer.render_feed(&self.context(articles, now))
    }
}

//! Source enumeration: turns a site checkout into an ordered publish plan.
//!
//! Layout of a site source directory:
//!
//! ```text
//! <source>/
//!   layouts/header.inc, layouts/footer.inc
//!   posts_source/*.md      -> posts/<slug>
//!   css/, 404/ (asset_dirs) -> same directory name
//! ```
//!
//! Scans are shallow. All markdown is rendered here, before any backend
//! call, so a broken source tree aborts the run before anything is written.

use std::path::{Path, PathBuf};

use quire_core::{
    ArticleMetadata, ContentItem, ContentKind, DestinationKey, FileItem, SiteConfig, TextItem,
};
use quire_renderer::{markdown, IndexEntry, RenderedDocument, SiteRenderer};

use crate::error::{enum_err, PublishError};

pub const POSTS_SOURCE_DIR: &str = "posts_source";
pub const POSTS_DIR: &str = "posts";
pub const INDEX_KEY: &str = "index.html";

/// Everything a run will publish, in a fixed order.
#[derive(Debug, Clone, Default)]
pub struct PublishPlan {
    /// Front page, then posts, then asset directories.
    pub items: Vec<ContentItem>,
    /// Post metadata, filename descending.
    pub articles: Vec<ArticleMetadata>,
}

/// Regular files directly inside `dir`, sorted by file name.
fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, PublishError> {
    let entries = std::fs::read_dir(dir).map_err(|e| enum_err(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| enum_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => files.push((name, path)),
            Err(raw) => {
                tracing::warn!(file = ?raw, dir = %dir.display(), "skipping non-UTF-8 file name");
            }
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn is_markdown(name: &str) -> bool {
    Path::new(name).extension().is_some_and(|ext| ext == "md")
}

fn read_source(path: &Path) -> Result<String, PublishError> {
    std::fs::read_to_string(path).map_err(|e| enum_err(path, e))
}

fn render_markdown(
    name: &str,
    path: &Path,
    config: &SiteConfig,
    kind: ContentKind,
) -> Result<RenderedDocument, PublishError> {
    let text = read_source(path)?;
    let mut doc = markdown::render_document(name, &text, &config.rss.author, kind);
    doc.meta.url.push_str(config.page_extension());
    Ok(doc)
}

/// Enumerate and render the site at `source`.
pub fn plan_site(
    source: &Path,
    config: &SiteConfig,
    renderer: &SiteRenderer,
) -> Result<PublishPlan, PublishError> {
    let posts_dir = source.join(POSTS_SOURCE_DIR);
    let mut posts: Vec<(String, PathBuf)> = list_files(&posts_dir)?
        .into_iter()
        .filter(|(name, _)| is_markdown(name))
        .collect();
    posts.sort_by(|a, b| b.0.cmp(&a.0));

    let mut docs = Vec::with_capacity(posts.len());
    for (name, path) in &posts {
        docs.push(render_markdown(name, path, config, ContentKind::Article)?);
    }

    let entries: Vec<IndexEntry> = docs
        .iter()
        .map(|doc| IndexEntry {
            path: doc.meta.url.clone(),
            title: doc.meta.title.clone(),
        })
        .collect();
    let sidebar = renderer.render_index(&entries, "")?;

    let mut plan = PublishPlan::default();
    plan.items.push(
        TextItem {
            key: DestinationKey::parse(INDEX_KEY)?,
            body: renderer.render_front_page(&entries)?,
            kind: ContentKind::Page,
        }
        .into(),
    );

    for doc in docs {
        plan.items.push(
            TextItem {
                key: DestinationKey::join(POSTS_DIR, &doc.meta.url)?,
                body: renderer.render_article(&doc.meta.title, &sidebar, &doc.html)?,
                kind: ContentKind::Article,
            }
            .into(),
        );
        plan.articles.push(doc.meta);
    }

    for dir_name in &config.asset_dirs {
        let dir = source.join(dir_name);
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "asset directory not found; skipping");
            continue;
        }
        for (name, path) in list_files(&dir)? {
            if is_markdown(&name) {
                let doc = render_markdown(&name, &path, config, ContentKind::Page)?;
                plan.items.push(
                    TextItem {
                        key: DestinationKey::join(dir_name, &doc.meta.url)?,
                        body: renderer.render_article(&doc.meta.title, &sidebar, &doc.html)?,
                        kind: ContentKind::Page,
                    }
                    .into(),
                );
            } else {
                plan.items.push(
                    FileItem {
                        key: DestinationKey::join(dir_name, &name)?,
                        content_type: config.content_type_for(&path),
                        path,
                    }
                    .into(),
                );
            }
        }
    }

    tracing::debug!(
        items = plan.items.len(),
        articles = plan.articles.len(),
        "enumerated site"
    );
    Ok(plan)
}

//! # quire-renderer
//!
//! Turns markdown sources into the HTML pages and RSS feed that the sync
//! engine publishes. Page chrome comes from the site's own
//! `layouts/header.inc` (with a `{title}` placeholder) and
//! `layouts/footer.inc`, wrapped around the embedded tera page templates.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use quire_core::ContentKind;
//! use quire_renderer::{markdown, SiteRenderer};
//!
//! fn render(site: &Path) -> Result<String, quire_renderer::RenderError> {
//!     let renderer = SiteRenderer::new(site)?;
//!     let doc = markdown::render_document("2024-01-05-hello.md", "# Hi", "Ann", ContentKind::Article);
//!     renderer.render_article(&doc.meta.title, "", &doc.html)
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod feed;
pub mod layout;
pub mod markdown;

pub use context::IndexEntry;
pub use engine::{SiteRenderer, FRONT_PAGE_TITLE};
pub use error::RenderError;
pub use feed::FeedBuilder;
pub use layout::Layout;
pub use markdown::RenderedDocument;

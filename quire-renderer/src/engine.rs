//! Tera rendering engine — [`SiteRenderer`].
//!
//! # Template names
//!
//! | Name                     | Source   |
//! |--------------------------|----------|
//! | `index_list.html.tera`   | embedded |
//! | `article.html.tera`      | embedded |
//! | `frontpage.html.tera`    | embedded |
//! | `feed.xml.tera`          | embedded |
//!
//! The site's header and footer ([`Layout`]) are filled in before rendering
//! and passed as `header` / `footer`. None of the names end in `.html`, so
//! tera does not autoescape: bodies are inserted as produced by the markdown
//! converter, and the feed template escapes explicitly.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{to_tera_context, ArticleCtx, FeedCtx, FrontPageCtx, IndexCtx, IndexEntry};
use crate::error::RenderError;
use crate::layout::{Layout, FOOTER_TEMPLATE, HEADER_TEMPLATE};

const TPLS: &[(&str, &str)] = &[
    ("index_list.html.tera", include_str!("templates/index_list.html.tera")),
    ("article.html.tera", include_str!("templates/article.html.tera")),
    ("frontpage.html.tera", include_str!("templates/frontpage.html.tera")),
    ("feed.xml.tera", include_str!("templates/feed.xml.tera")),
];

/// Heading of the front page. The `span` carries the refresh click hook.
pub const FRONT_PAGE_TITLE: &str = r#"The blog archiv<span id="ref">e</span>"#;

/// Posts are published under this key prefix.
pub const POSTS_PREFIX: &str = "posts/";

fn read_layout(site_dir: &Path, name: &str) -> Result<String, RenderError> {
    let path: PathBuf = site_dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RenderError::TemplateMissing { path }),
        Err(e) => Err(RenderError::Io { path, source: e }),
    }
}

/// Remove `<...>` tags, keeping the text between them.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders pages and the feed for one site.
///
/// Create once per publish run with [`SiteRenderer::new`] and reuse.
pub struct SiteRenderer {
    tera: Tera,
    layout: Layout,
}

impl SiteRenderer {
    /// Load the site's layouts from `<site_dir>/layouts/`.
    ///
    /// A missing header or footer is [`RenderError::TemplateMissing`]; a
    /// malformed header is [`RenderError::Layout`].
    pub fn new(site_dir: &Path) -> Result<Self, RenderError> {
        let header = read_layout(site_dir, HEADER_TEMPLATE)?;
        let footer = read_layout(site_dir, FOOTER_TEMPLATE)?;
        Self::from_layouts(&header, &footer)
    }

    /// Build from in-memory layout sources.
    pub fn from_layouts(header: &str, footer: &str) -> Result<Self, RenderError> {
        let layout = Layout::parse(header, footer)?;
        let mut tera = Tera::default();
        tera.add_raw_templates(TPLS.to_vec())?;
        Ok(SiteRenderer { tera, layout })
    }

    /// Post list with links prefixed by `prefix`.
    pub fn render_index(&self, posts: &[IndexEntry], prefix: &str) -> Result<String, RenderError> {
        let ctx = to_tera_context(&IndexCtx { prefix, posts })?;
        Ok(self.tera.render("index_list.html.tera", &ctx)?)
    }

    /// Full article page: layout, sidebar `index` and the converted `body`.
    pub fn render_article(&self, title: &str, index: &str, body: &str) -> Result<String, RenderError> {
        let header = self.layout.header(title);
        let ctx = to_tera_context(&ArticleCtx {
            header: &header,
            index,
            body,
            footer: self.layout.footer(),
        })?;
        Ok(self.tera.render("article.html.tera", &ctx)?)
    }

    /// The site's `index.html`, listing every post.
    pub fn render_front_page(&self, posts: &[IndexEntry]) -> Result<String, RenderError> {
        let index = self.render_index(posts, POSTS_PREFIX)?;
        let header = self.layout.header(&strip_tags(FRONT_PAGE_TITLE));
        let ctx = to_tera_context(&FrontPageCtx {
            header: &header,
            heading: FRONT_PAGE_TITLE,
            index: &index,
            footer: self.layout.footer(),
        })?;
        Ok(self.tera.render("frontpage.html.tera", &ctx)?)
    }

    /// RSS 2.0 document.
    pub fn render_feed(&self, feed: &FeedCtx) -> Result<String, RenderError> {
        let ctx = to_tera_context(feed)?;
        Ok(self.tera.render("feed.xml.tera", &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "<html><head><title>{title}</title></head><body>\n";
    const FOOTER: &str = "</body></html>\n";

    fn renderer() -> SiteRenderer {
        SiteRenderer::from_layouts(HEADER, FOOTER).expect("renderer")
    }

    fn entries() -> Vec<IndexEntry> {
        vec![
            IndexEntry { path: "2024-02-01-b".to_string(), title: "B".to_string() },
            IndexEntry { path: "2024-01-05-a".to_string(), title: "A".to_string() },
        ]
    }

    #[test]
    fn missing_layout_is_template_missing() {
        let site = TempDir::new().unwrap();
        let err = SiteRenderer::new(site.path()).err().expect("should fail");
        match err {
            RenderError::TemplateMissing { path } => assert!(path.ends_with("layouts/header.inc")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn layouts_loaded_from_site_dir() {
        let site = TempDir::new().unwrap();
        std::fs::create_dir_all(site.path().join("layouts")).unwrap();
        std::fs::write(site.path().join(HEADER_TEMPLATE), HEADER).unwrap();
        std::fs::write(site.path().join(FOOTER_TEMPLATE), FOOTER).unwrap();
        let r = SiteRenderer::new(site.path()).expect("renderer");
        let page = r.render_article("T", "", "<p>x</p>").unwrap();
        assert!(page.starts_with("<html><head><title>T</title>"));
        assert!(page.trim_end().ends_with("</body></html>"));
    }

    #[test]
    fn existing_site_header_with_literal_braces_renders() {
        let header = "<html><head><style>p {{ margin: 0 }}</style><title>{title}</title></head>\n";
        let r = SiteRenderer::from_layouts(header, FOOTER).expect("renderer");
        let page = r.render_article("Hello", "", "<p>x</p>").unwrap();
        assert!(page.starts_with("<html><head><style>p { margin: 0 }</style><title>Hello</title>"));
    }

    #[test]
    fn tera_syntax_in_footer_is_left_alone() {
        let r = SiteRenderer::from_layouts(HEADER, "{% raw %}{{ x }}</body>\n").expect("renderer");
        let page = r.render_article("T", "", "").unwrap();
        assert!(page.contains("{% raw %}{{ x }}</body>"));
    }

    #[test]
    fn malformed_header_is_layout_error() {
        let err = SiteRenderer::from_layouts("<title>{{ title }</title>", FOOTER)
            .err()
            .expect("should fail");
        assert!(matches!(err, RenderError::Layout { .. }), "got: {err}");
    }

    #[test]
    fn index_lists_posts_in_given_order() {
        let html = renderer().render_index(&entries(), "").unwrap();
        let b = html.find("2024-02-01-b").unwrap();
        let a = html.find("2024-01-05-a").unwrap();
        assert!(b < a);
        assert!(html.starts_with("<p><ul><li>"));
    }

    #[test]
    fn empty_index_has_no_list() {
        let html = renderer().render_index(&[], "").unwrap();
        assert_eq!(html.trim_end(), "<p></p>");
    }

    #[test]
    fn article_embeds_sidebar_and_body() {
        let page = renderer()
            .render_article("Hello", "<p>INDEX</p>", "<h1>Body</h1>\n")
            .unwrap();
        assert!(page.contains("<title>Hello</title>"));
        assert!(page.contains("bd-sidebar\">\n<p>INDEX</p>"));
        assert!(page.contains("<h1>Body</h1>"));
    }

    #[test]
    fn front_page_uses_plain_title_and_posts_prefix() {
        let page = renderer().render_front_page(&entries()).unwrap();
        assert!(page.contains("<title>The blog archive</title>"));
        assert!(page.contains(r#"<h1>The blog archiv<span id="ref">e</span></h1>"#));
        assert!(page.contains(r#"href="posts/2024-02-01-b""#));
        assert!(page.contains("/refresh"));
    }

    #[test]
    fn strip_tags_handles_unclosed() {
        assert_eq!(strip_tags("a<b>c</b>d"), "acd");
        assert_eq!(strip_tags("a<b"), "a<b");
    }
}

//! Renderer integration: site layouts on disk, markdown sources, feed.

use chrono::{NaiveDate, Utc};
use quire_core::{ContentKind, FeedConfig};
use quire_renderer::{markdown, FeedBuilder, IndexEntry, RenderError, SiteRenderer};
use tempfile::TempDir;

fn make_site() -> TempDir {
    let site = TempDir::new().expect("site");
    let layouts = site.path().join("layouts");
    std::fs::create_dir_all(&layouts).expect("mkdir");
    std::fs::write(
        layouts.join("header.inc"),
        "<!doctype html>\n<html><head><title>{title}</title></head><body>\n",
    )
    .expect("header");
    std::fs::write(layouts.join("footer.inc"), "</body></html>\n").expect("footer");
    site
}

#[test]
fn article_page_from_markdown_source() {
    let site = make_site();
    let renderer = SiteRenderer::new(site.path()).expect("renderer");

    let source = "Title: Hello there\nAbstract: A first post\n\n# Hello\n\nSome ~~old~~ text.\n";
    let doc = markdown::render_document("2024-01-05-hello.md", source, "Ann", ContentKind::Article);
    let index = renderer
        .render_index(
            &[IndexEntry {
                path: doc.meta.url.clone(),
                title: doc.meta.title.clone(),
            }],
            "",
        )
        .expect("index");
    let page = renderer
        .render_article(&doc.meta.title, &index, &doc.html)
        .expect("article");

    assert!(page.contains("<title>Hello there</title>"));
    assert!(page.contains("<h1>Hello</h1>"));
    assert!(page.contains("<del>old</del>"));
    assert!(page.contains(r#"<a href="2024-01-05-hello">Hello there</a>"#));
    assert!(!page.contains("Abstract:"), "front matter must not leak into body");
}

#[test]
fn footer_missing_is_fatal() {
    let site = make_site();
    std::fs::remove_file(site.path().join("layouts/footer.inc")).expect("rm");
    match SiteRenderer::new(site.path()) {
        Err(RenderError::TemplateMissing { path }) => {
            assert!(path.ends_with("footer.inc"), "got {}", path.display())
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected TemplateMissing"),
    }
}

#[test]
fn feed_lists_articles_newest_first() {
    let site = make_site();
    let renderer = SiteRenderer::new(site.path()).expect("renderer");
    let config = FeedConfig {
        url: "https://blog.example/".to_string(),
        posts_dir: "posts/".to_string(),
        title: "Blog".to_string(),
        description: "Notes".to_string(),
        lang: "en".to_string(),
        author: "Ann".to_string(),
    };
    let docs: Vec<_> = ["2024-02-01-b.md", "2024-01-05-a.md", "2023-12-31-c.md"]
        .iter()
        .map(|name| markdown::render_document(name, "body\n", "Ann", ContentKind::Article).meta)
        .collect();
    assert_eq!(docs[0].date, NaiveDate::from_ymd_opt(2024, 2, 1));

    let xml = FeedBuilder::new(&config)
        .build(&renderer, &docs, Utc::now())
        .expect("feed");
    let b = xml.find("posts/2024-02-01-b").expect("b");
    let a = xml.find("posts/2024-01-05-a").expect("a");
    let c = xml.find("posts/2023-12-31-c").expect("c");
    assert!(b < a && a < c, "feed order must be most recent first");
    assert_eq!(xml.matches("<item>").count(), 3);
}

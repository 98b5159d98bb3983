//! Markdown sources: front matter and HTML conversion.
//!
//! Front matter follows the `Key: value` header convention: a run of
//! `key: value` lines at the very top of the file, ended by a blank line.
//! Lines indented by four or more spaces continue the previous value. An
//! optional `---` line may open and close the block.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pulldown_cmark::{html, Options, Parser};

use quire_core::types::{
    date_from_file_name, slug_from_file_name, title_from_file_name, ArticleMetadata, ContentKind,
};

/// Parsed front matter. Keys are lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    fields: BTreeMap<String, String>,
}

impl FrontMatter {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A markdown source converted to an HTML fragment plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub meta: ArticleMetadata,
    pub html: String,
}

fn meta_line(line: &str) -> Option<(&str, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let (key, value) = line.trim_start().split_once(':')?;
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key, value.trim()))
}

fn continuation_line(line: &str) -> Option<&str> {
    line.strip_prefix("    ").map(str::trim)
}

/// Split `text` into front matter and the remaining markdown body.
pub fn split_front_matter(text: &str) -> (FrontMatter, &str) {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;
    let mut rest = text;
    let mut first = true;

    while !rest.is_empty() {
        let (line, after) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        let line = line.trim_end_matches('\r');

        if first && line.trim() == "---" {
            first = false;
            rest = after;
            continue;
        }
        first = false;

        if line.trim().is_empty() {
            rest = after;
            break;
        }
        if !fields.is_empty() && (line.trim() == "---" || line.trim() == "...") {
            rest = after;
            break;
        }
        if let Some((key, value)) = meta_line(line) {
            let key = key.to_ascii_lowercase();
            fields.insert(key.clone(), value.to_string());
            last_key = Some(key);
        } else if let (Some(value), Some(key)) = (continuation_line(line), last_key.as_ref()) {
            if let Some(existing) = fields.get_mut(key) {
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(value);
            }
        } else {
            // Not front matter: leave the line in the body.
            break;
        }
        rest = after;
    }

    if fields.is_empty() {
        return (FrontMatter::default(), text);
    }
    (FrontMatter { fields }, rest)
}

/// Convert a markdown body to an HTML fragment.
///
/// Tables, footnotes and strikethrough are enabled.
pub fn to_html(body: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(body, options);
    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

/// Render one markdown source file.
///
/// `file_name` is the source's base name (`2024-01-05-hello.md`); missing
/// front matter fields fall back to filename-derived values and
/// `default_author`.
pub fn render_document(
    file_name: &str,
    text: &str,
    default_author: &str,
    kind: ContentKind,
) -> RenderedDocument {
    let (front, body) = split_front_matter(text);
    let slug = slug_from_file_name(file_name);

    let date = match front.get("date") {
        Some(raw) => parse_date(raw).or_else(|| {
            tracing::warn!(file = file_name, date = raw, "unparseable date in front matter");
            date_from_file_name(file_name)
        }),
        None => date_from_file_name(file_name),
    };

    let meta = ArticleMetadata {
        title: front
            .get("title")
            .map(str::to_string)
            .unwrap_or_else(|| title_from_file_name(file_name)),
        url: slug.clone(),
        slug,
        author: front.get("author").unwrap_or(default_author).to_string(),
        date,
        abstract_text: front
            .get("abstract")
            .or_else(|| front.get("summary"))
            .unwrap_or_default()
            .to_string(),
        kind,
    };

    RenderedDocument {
        meta,
        html: to_html(body),
    }
}

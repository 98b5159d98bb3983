//! Domain types for a publish run.
//!
//! Destination keys are always forward-slash separated strings, independent of
//! the host platform. Local sources use `PathBuf`.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::KeyError;

// ---------------------------------------------------------------------------
// DestinationKey
// ---------------------------------------------------------------------------

/// Relative, forward-slash separated key of a published resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DestinationKey(String);

impl DestinationKey {
    /// Validate `raw` as a destination key.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.starts_with('/') || raw.starts_with('\\') {
            return Err(KeyError::Absolute(raw.to_string()));
        }
        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(KeyError::BadSegment(raw.to_string()));
            }
        }
        Ok(Self(raw.to_string()))
    }

    /// `<prefix>/<name>`, or just `<name>` when `prefix` is empty.
    pub fn join(prefix: &str, name: &str) -> Result<Self, KeyError> {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            Self::parse(name)
        } else {
            Self::parse(&format!("{prefix}/{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for DestinationKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DestinationKey> for String {
    fn from(k: DestinationKey) -> Self {
        k.0
    }
}

impl AsRef<str> for DestinationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ContentKind
// ---------------------------------------------------------------------------

pub const TEXT_HTML: &str = "text/html";
pub const RSS_XML: &str = "application/rss+xml";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// What a rendered text resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Article,
    Page,
    Feed,
}

impl ContentKind {
    /// MIME type stored alongside a text resource of this kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            ContentKind::Article | ContentKind::Page => TEXT_HTML,
            ContentKind::Feed => RSS_XML,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Article => write!(f, "article"),
            ContentKind::Page => write!(f, "page"),
            ContentKind::Feed => write!(f, "feed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

/// A rendered text resource, uploaded from memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextItem {
    pub key: DestinationKey,
    pub body: String,
    pub kind: ContentKind,
}

impl TextItem {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

/// A static file, streamed from disk as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub key: DestinationKey,
    pub path: PathBuf,
    pub content_type: String,
}

/// A unit of publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    Text(TextItem),
    File(FileItem),
}

impl ContentItem {
    pub fn key(&self) -> &DestinationKey {
        match self {
            ContentItem::Text(t) => &t.key,
            ContentItem::File(f) => &f.key,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            ContentItem::Text(t) => t.content_type(),
            ContentItem::File(f) => &f.content_type,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ContentItem::Text(_))
    }
}

impl From<TextItem> for ContentItem {
    fn from(t: TextItem) -> Self {
        ContentItem::Text(t)
    }
}

impl From<FileItem> for ContentItem {
    fn from(f: FileItem) -> Self {
        ContentItem::File(f)
    }
}

// ---------------------------------------------------------------------------
// ArticleMetadata
// ---------------------------------------------------------------------------

/// Per-article facts extracted while rendering, consumed by the feed.
///
/// Held only for the duration of one publish run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: String,
    /// Filename stem, e.g. `2024-01-05-hello-world`.
    pub slug: String,
    /// Path relative to the posts directory, e.g. `2024-01-05-hello-world`.
    pub url: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub kind: ContentKind,
}

/// Title derived from a markdown filename: extension dropped, dashes to spaces.
pub fn title_from_file_name(name: &str) -> String {
    slug_from_file_name(name).replace('-', " ")
}

/// `2024-01-05-hello.md` → `2024-01-05-hello`.
pub fn slug_from_file_name(name: &str) -> String {
    name.strip_suffix(".md").unwrap_or(name).to_string()
}

/// Leading `YYYY-MM-DD` of a filename, if present and a real date.
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let prefix = name.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Template contexts — serializable rendering payloads.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// One entry of the post list shown in the sidebar and on the front page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Link target relative to the page embedding the list.
    pub path: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct IndexCtx<'a> {
    pub prefix: &'a str,
    pub posts: &'a [IndexEntry],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ArticleCtx<'a> {
    /// Header with the title filled in.
    pub header: &'a str,
    pub index: &'a str,
    pub body: &'a str,
    pub footer: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FrontPageCtx<'a> {
    /// Header with the tag-stripped title filled in.
    pub header: &'a str,
    /// Title with markup for the page heading.
    pub heading: &'a str,
    pub index: &'a str,
    pub footer: &'a str,
}

/// RSS channel header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCtx {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub last_build_date: String,
    pub generator_version: String,
}

/// A single RSS item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItemCtx {
    pub title: String,
    pub link: String,
    pub author: String,
    pub description: String,
    pub pub_date: String,
}

/// Full feed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCtx {
    pub channel: ChannelCtx,
    pub items: Vec<FeedItemCtx>,
}

pub(crate) fn to_tera_context<T: Serialize>(value: &T) -> Result<tera::Context, RenderError> {
    tera::Context::from_serialize(value).map_err(RenderError::from)
}

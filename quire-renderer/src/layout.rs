//! Site layouts: `layouts/header.inc` and `layouts/footer.inc`.
//!
//! The header is a placeholder template: `{title}` is replaced by the page
//! title, and `{{` / `}}` stand for literal braces. Any other placeholder or a
//! lone brace is an error. The footer is inserted verbatim.

use std::path::PathBuf;

use crate::error::RenderError;

pub const HEADER_TEMPLATE: &str = "layouts/header.inc";
pub const FOOTER_TEMPLATE: &str = "layouts/footer.inc";

const TITLE_FIELD: &str = "title";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Title,
}

/// Parsed layouts of one site.
#[derive(Debug, Clone)]
pub struct Layout {
    header: Vec<Piece>,
    footer: String,
}

impl Layout {
    /// Parse `header` and keep `footer` as-is.
    pub fn parse(header: &str, footer: &str) -> Result<Self, RenderError> {
        Ok(Self {
            header: parse_header(header)?,
            footer: footer.to_string(),
        })
    }

    /// The header with `title` filled in.
    pub fn header(&self, title: &str) -> String {
        let mut out = String::new();
        for piece in &self.header {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Title => out.push_str(title),
            }
        }
        out
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }
}

fn layout_err(message: String) -> RenderError {
    RenderError::Layout {
        path: PathBuf::from(HEADER_TEMPLATE),
        message,
    }
}

fn parse_header(source: &str) -> Result<Vec<Piece>, RenderError> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((at, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                text.push('{');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(layout_err(format!("unclosed '{{' at byte {at}")));
                }
                if field.trim() != TITLE_FIELD {
                    return Err(layout_err(format!(
                        "unknown placeholder '{{{field}}}' at byte {at}; only '{{title}}' is available"
                    )));
                }
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                pieces.push(Piece::Title);
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                text.push('}');
            }
            '}' => {
                return Err(layout_err(format!(
                    "single '}}' at byte {at}; write '}}}}' for a literal brace"
                )));
            }
            other => text.push(other),
        }
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(pieces)
}

//! Document parsing: front-matter metadata and author-declared segments.
//!
//! Front matter is a flat `key: value` block between two `---` lines. Anything
//! malformed falls back to empty metadata with the whole input as body; parse
//! errors never reach the pagination core.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::block::FenceTracker;

/// Optional document metadata used for the cover card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Cover icon.
    pub emoji: Option<String>,
}

/// One author-declared portion of the body. Order is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub text: String,
}

/// A parsed document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub metadata: Metadata,
    pub body: String,
    pub segments: Vec<Segment>,
}

/// Parses raw markdown with optional front matter.
pub fn parse_document(raw: &str) -> Document {
    let (metadata, body) = match split_front_matter(raw) {
        Some((front, body)) => match parse_front_matter(front) {
            Some(metadata) => (metadata, body),
            None => {
                debug!("Malformed front matter, falling back to empty metadata");
                (Metadata::default(), raw)
            }
        },
        None => (Metadata::default(), raw),
    };

    let body = body.trim().to_string();
    let segments = split_segments(&body)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment {
            index,
            text: text.to_string(),
        })
        .collect();

    Document {
        metadata,
        body,
        segments,
    }
}

/// Reads and parses a markdown file.
pub async fn load_document(path: impl AsRef<Path>) -> std::io::Result<Document> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(parse_document(&raw))
}

/// Splits a body on separator lines (three or more `-`, nothing else) outside
/// fenced code. Segments are trimmed; empty ones are dropped.
pub fn split_segments(body: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut fences = FenceTracker::default();

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);

        if fences.advance(content) || fences.open().is_some() {
            continue;
        }
        if is_separator(content) {
            segments.push(&body[start..line_start]);
            start = offset;
        }
    }
    segments.push(&body[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-')
}

// ────────────────────────────────────────────────────────────────────────────
// Front matter
// ────────────────────────────────────────────────────────────────────────────

/// Returns `(front_matter, rest)` when `raw` opens with a `---` line that has
/// a matching closing `---` line.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let mut lines = raw.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let mut offset = first.len();
    for line in lines {
        if line.trim_end() == "---" {
            return Some((&raw[first.len()..offset], &raw[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parses flat `key: value` pairs. Returns `None` if any non-empty, non-comment
/// line is not a pair.
fn parse_front_matter(front: &str) -> Option<Metadata> {
    let mut metadata = Metadata::default();
    for line in front.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once(':')?;
        let value = unquote(value.trim());
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "title" => metadata.title = Some(value.to_string()),
            "subtitle" => metadata.subtitle = Some(value.to_string()),
            "emoji" => metadata.emoji = Some(value.to_string()),
            _ => {}
        }
    }
    Some(metadata)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

//! Block segmentation: splits a segment into typed blocks, without looking at
//! costs.
//!
//! Rules:
//! - A heading line is always a block of its own.
//! - A fenced code block (opening fence through closing fence, or end of input)
//!   is one block.
//! - An image reference line is one block.
//! - Consecutive list lines (plus indented continuation lines) form one block;
//!   likewise consecutive quote lines, paragraph lines, and blank lines.
//!
//! Every block keeps its line terminators, so concatenating the blocks'
//! `text` reproduces the input exactly.

use crate::models::block::FenceTracker;
use crate::models::{Block, BlockKind};

/// Classification of a single source line, before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Heading(BlockKind),
    Image,
    List,
    Quote,
    Blank,
    /// Indented non-blank line; continues a preceding list item.
    Indented,
    Text,
}

fn classify(line: &str) -> LineClass {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineClass::Blank;
    }
    if let Some(kind) = heading_kind(trimmed) {
        return LineClass::Heading(kind);
    }
    if trimmed.starts_with("![") {
        return LineClass::Image;
    }
    if trimmed.starts_with('>') {
        return LineClass::Quote;
    }
    if is_list_marker(trimmed) {
        return LineClass::List;
    }
    if line.starts_with(' ') || line.starts_with('\t') {
        return LineClass::Indented;
    }
    LineClass::Text
}

fn heading_kind(trimmed: &str) -> Option<BlockKind> {
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some(match level {
        1 => BlockKind::Heading1,
        2 => BlockKind::Heading2,
        _ => BlockKind::Heading3,
    })
}

fn is_list_marker(trimmed: &str) -> bool {
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
        return true;
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && {
        let rest = &trimmed[digits..];
        rest.starts_with(". ") || rest.starts_with(") ")
    }
}

fn close<'a>(
    text: &'a str,
    open: &mut Option<(BlockKind, usize)>,
    end: usize,
    blocks: &mut Vec<Block<'a>>,
) {
    if let Some((kind, start)) = open.take() {
        if end > start {
            blocks.push(Block {
                kind,
                start,
                text: &text[start..end],
            });
        }
    }
}

/// Splits `text` into an ordered sequence of typed blocks.
pub fn segment_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks: Vec<Block<'_>> = Vec::new();
    // (kind, start) of the block being accumulated.
    let mut open: Option<(BlockKind, usize)> = None;
    let mut fences = FenceTracker::default();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);

        if fences.open().is_some() {
            if fences.advance(content) {
                close(text, &mut open, offset, &mut blocks);
            }
            continue;
        }
        if fences.advance(content) {
            close(text, &mut open, line_start, &mut blocks);
            open = Some((BlockKind::CodeFence, line_start));
            continue;
        }

        let class = classify(content);
        let current = open.map(|(kind, _)| kind);

        let (kind, standalone) = match class {
            LineClass::Heading(kind) => (kind, true),
            LineClass::Image => (BlockKind::ImageRef, true),
            LineClass::List => (BlockKind::ListItem, false),
            LineClass::Quote => (BlockKind::Quote, false),
            LineClass::Blank => (BlockKind::Blank, false),
            LineClass::Indented if current == Some(BlockKind::ListItem) => {
                (BlockKind::ListItem, false)
            }
            LineClass::Indented | LineClass::Text => (BlockKind::Paragraph, false),
        };

        if standalone {
            close(text, &mut open, line_start, &mut blocks);
            blocks.push(Block {
                kind,
                start: line_start,
                text: line,
            });
            continue;
        }

        if current != Some(kind) {
            close(text, &mut open, line_start, &mut blocks);
            open = Some((kind, line_start));
        }
    }

    close(text, &mut open, text.len(), &mut blocks);
    blocks
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

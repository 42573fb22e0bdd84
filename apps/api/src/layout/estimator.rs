//! Height estimation. Pure and line-additive.
//!
//! No cross-block layout interactions are modeled: the estimate of a run of
//! blocks is the sum of the blocks' estimates, and a block's estimate is the sum
//! of its lines plus the kind's block margin. Refinement relies on this to
//! re-estimate candidate cuts without touching the oracle.

use crate::layout::cost_model::{CostModel, KindMetrics};
use crate::models::block::is_fence_delimiter;
use crate::models::{Block, BlockKind};

/// Estimated height of one source line (without its terminator) of the given kind.
pub fn estimate_line(kind: BlockKind, line: &str, model: &CostModel) -> u32 {
    if kind == BlockKind::CodeFence && is_fence_delimiter(line) {
        return model.code_fence_px;
    }
    let metrics = model.metrics(kind);
    line_cost(metrics, line.trim().chars().count())
}

fn line_cost(metrics: &KindMetrics, chars: usize) -> u32 {
    if metrics.line_height_px <= 0.0 {
        return metrics.line_fixed_px;
    }
    let visual = metrics.visual_lines(chars) as f32;
    metrics.line_fixed_px + (visual * metrics.line_height_px).ceil() as u32
}

/// Estimated height of a single block.
pub fn estimate_block(block: &Block<'_>, model: &CostModel) -> u32 {
    let lines: u32 = match block.kind {
        // A blank block may hold several empty lines; `lines()` would fold
        // trailing ones, so count terminators instead.
        BlockKind::Blank => {
            let count = block.text.matches('\n').count().max(1) as u32;
            count * model.blank.line_fixed_px
        }
        kind => block
            .lines()
            .map(|line| estimate_line(kind, line, model))
            .sum(),
    };
    lines + model.metrics(block.kind).block_margin_px
}

/// Estimated height of a contiguous run of blocks.
pub fn estimate_blocks(blocks: &[Block<'_>], model: &CostModel) -> u32 {
    blocks.iter().map(|b| estimate_block(b, model)).sum()
}

/// Estimated content height of arbitrary markdown.
pub fn estimate_markdown(text: &str, model: &CostModel) -> u32 {
    let blocks = crate::layout::segmenter::segment_blocks(text);
    estimate_blocks(&blocks, model)
}

/// Greedy wrap of one line into visual-line pieces of at most `capacity`
/// characters. Returns byte ranges that tile `line` exactly.
///
/// A piece ends after the last whitespace that fits; whitespace directly after a
/// full window is kept with the piece. Runs without whitespace (CJK text, URLs)
/// are hard-split at `capacity` characters.
pub fn wrap_line(line: &str, capacity: usize) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    if capacity == 0 || chars.len() <= capacity {
        return vec![(0, line.len())];
    }

    let byte_at = |idx: usize| chars.get(idx).map(|(b, _)| *b).unwrap_or(line.len());
    let mut pieces = Vec::new();
    let mut pos = 0usize;

    while chars.len() - pos > capacity {
        let window_end = pos + capacity;
        // Look one past the window so a space right after a full line is kept.
        let break_at = (pos + 1..=window_end)
            .rev()
            .find(|&i| chars.get(i).is_some_and(|(_, c)| c.is_whitespace()))
            .map(|i| i + 1)
            .unwrap_or(window_end);
        pieces.push((byte_at(pos), byte_at(break_at)));
        pos = break_at;
    }
    if pos < chars.len() {
        pieces.push((byte_at(pos), line.len()));
    }
    pieces
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

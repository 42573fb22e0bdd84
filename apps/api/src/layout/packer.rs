//! Card packing: greedy, order-preserving bin-packing of blocks into cards
//! using estimated heights only. No oracle calls happen here.
//!
//! # Algorithm
//! 1. Walk blocks in order, keeping an accumulator card and its running height.
//! 2. A block whose estimate alone exceeds `safe_height` flushes the
//!    accumulator and is decomposed into line pieces, which are packed with the
//!    same greedy rule into cards of their own.
//! 3. A block that would push the running height past `safe_height` flushes the
//!    accumulator and starts the next card. Ties favor inclusion.
//! 4. Everything else is appended.
//!
//! Blank blocks never open a card: they stay with the card before them, since
//! leading whitespace renders as nothing and would otherwise produce an empty
//! card. A blank that does not fit is kept as trailing whitespace at zero cost
//! and seals the card, so the card's estimate stays within `safe_height`.

use std::mem;

use crate::layout::cost_model::{CardBudget, CostModel};
use crate::layout::estimator::{estimate_block, estimate_line, wrap_line};
use crate::models::block::Fence;
use crate::models::{Block, BlockKind, Card, Fragment};

/// Packs a segment's blocks into provisional cards.
///
/// `source` is the segment text the blocks were carved from.
pub fn pack_cards<'a>(
    source: &'a str,
    blocks: &[Block<'a>],
    budget: &CardBudget,
    model: &CostModel,
) -> Vec<Card<'a>> {
    let limit = budget.safe_height;
    let mut cards = Vec::new();
    let mut acc: Vec<Fragment<'a>> = Vec::new();
    let mut running = 0u32;
    let mut sealed = false;

    for (index, block) in blocks.iter().enumerate() {
        let mut fragment = Fragment {
            block: index,
            kind: block.kind,
            start: block.start,
            text: block.text,
            whole_block: true,
            cost: estimate_block(block, model),
        };

        let blank = block.kind == BlockKind::Blank;

        if fragment.cost > limit && !blank {
            if !acc.is_empty() {
                cards.push(Card::from_fragments(source, mem::take(&mut acc)));
                running = 0;
                sealed = false;
            }
            cards.extend(pack_fragments(source, decompose(&fragment, model), limit));
            continue;
        }

        let overflows = running + fragment.cost > limit;
        if (overflows || sealed) && !acc.is_empty() && !blank {
            cards.push(Card::from_fragments(source, mem::take(&mut acc)));
            running = 0;
            sealed = false;
        }

        if blank && acc.is_empty() {
            if let Some(last) = cards.pop() {
                // Re-open the previous card so the blank trails it. Nothing
                // follows it on that card.
                if last.estimated_px + fragment.cost > limit {
                    fragment.cost = 0;
                }
                let mut fragments = last.fragments;
                fragments.push(fragment);
                cards.push(Card::from_fragments(source, fragments));
                continue;
            }
        }

        if blank && overflows && !acc.is_empty() {
            fragment.cost = 0;
            sealed = true;
        }

        running += fragment.cost;
        acc.push(fragment);
    }

    if !acc.is_empty() {
        cards.push(Card::from_fragments(source, acc));
    }
    cards
}

/// Plain greedy packing of already-decomposed pieces. A piece that alone
/// exceeds `limit` still gets a card of its own; blank pieces never open one.
pub fn pack_fragments<'a>(
    source: &'a str,
    pieces: Vec<Fragment<'a>>,
    limit: u32,
) -> Vec<Card<'a>> {
    let mut cards = Vec::new();
    let mut acc: Vec<Fragment<'a>> = Vec::new();
    let mut running = 0u32;
    let mut sealed = false;

    for mut piece in pieces {
        let blank = is_blank(&piece);
        let overflows = running + piece.cost > limit;
        if (overflows || sealed) && !acc.is_empty() && !blank {
            cards.push(Card::from_fragments(source, mem::take(&mut acc)));
            running = 0;
            sealed = false;
        }
        if blank && overflows && !acc.is_empty() {
            piece.cost = 0;
            sealed = true;
        }
        running += piece.cost;
        acc.push(piece);
    }

    if !acc.is_empty() {
        cards.push(Card::from_fragments(source, acc));
    }
    cards
}

// ────────────────────────────────────────────────────────────────────────────
// Line-level decomposition
// ────────────────────────────────────────────────────────────────────────────

/// Decomposes a whole-block fragment into line pieces. Pieces already below
/// block granularity are irreducible and returned as-is.
///
/// - Paragraph, list and quote lines wrap into visual-line pieces.
/// - Code lines are atomic; the opening and closing fences stay attached to
///   the neighbouring code line.
/// - Every other kind splits per source line.
///
/// Pieces tile the fragment exactly; costs are per-piece estimates, with the
/// block margin charged to the last piece.
pub fn decompose<'a>(fragment: &Fragment<'a>, model: &CostModel) -> Vec<Fragment<'a>> {
    if !fragment.whole_block {
        return vec![*fragment];
    }

    let metrics = model.metrics(fragment.kind);
    let mut pieces: Vec<Fragment<'a>> = Vec::new();
    let mut offset = 0usize;

    for line in fragment.text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);

        let ranges = if fragment.kind.wraps() {
            wrap_line(content, metrics.line_capacity)
        } else {
            vec![(0, content.len())]
        };

        if ranges.len() == 1 {
            let cost = estimate_line(fragment.kind, content, model);
            pieces.push(piece(fragment, line_start, line, cost));
            continue;
        }

        let last = ranges.len() - 1;
        for (i, (s, e)) in ranges.into_iter().enumerate() {
            let end = if i == last { line.len() } else { e };
            let mut cost = metrics.line_px();
            if i == 0 {
                cost += metrics.line_fixed_px;
            }
            pieces.push(piece(fragment, line_start + s, &line[s..end], cost));
        }
    }

    if fragment.kind == BlockKind::CodeFence {
        pieces = attach_fences(fragment, pieces);
    }
    if let Some(last) = pieces.last_mut() {
        last.cost += metrics.block_margin_px;
    }
    pieces
}

fn piece<'a>(
    fragment: &Fragment<'a>,
    relative_start: usize,
    text: &'a str,
    cost: u32,
) -> Fragment<'a> {
    Fragment {
        block: fragment.block,
        kind: fragment.kind,
        start: fragment.start + relative_start,
        text,
        whole_block: false,
        cost,
    }
}

/// Merges the fence delimiter lines of a decomposed code block into their
/// neighbouring code line, so no card ever holds a bare fence.
fn attach_fences<'a>(block: &Fragment<'a>, pieces: Vec<Fragment<'a>>) -> Vec<Fragment<'a>> {
    let mut merged: Vec<Fragment<'a>> = Vec::with_capacity(pieces.len());
    let count = pieces.len();
    let opener = pieces.first().and_then(|p| Fence::parse(p.text.trim_end()));

    for (i, current) in pieces.into_iter().enumerate() {
        let joins_previous = match merged.last() {
            // Opening fence waiting for its first code line.
            Some(_) if i == 1 && opener.is_some() => true,
            // Closing fence.
            Some(_) if i == count - 1 => {
                opener.is_some_and(|fence| fence.is_closed_by(current.text.trim_end()))
            }
            _ => false,
        };
        match merged.pop() {
            Some(prev) if joins_previous => merged.push(join(block, &prev, &current)),
            Some(prev) => {
                merged.push(prev);
                merged.push(current);
            }
            None => merged.push(current),
        }
    }
    merged
}

/// Joins two adjacent pieces of the same block.
fn join<'a>(block: &Fragment<'a>, a: &Fragment<'a>, b: &Fragment<'a>) -> Fragment<'a> {
    let start = a.start - block.start;
    let end = b.end() - block.start;
    Fragment {
        start: a.start,
        text: &block.text[start..end],
        cost: a.cost + b.cost,
        ..*a
    }
}

/// True for pieces that render as nothing.
pub fn is_blank(fragment: &Fragment<'_>) -> bool {
    fragment.text.trim().is_empty()
}

/// Checks that `cards` tile `source` exactly: every card non-empty, fragments
/// contiguous and in block order, nothing missing at either end.
pub fn check_lossless<'c, 'a: 'c>(
    source: &str,
    cards: impl IntoIterator<Item = &'c Card<'a>>,
) -> Result<(), String> {
    let mut position = 0usize;
    let mut last_block = 0usize;
    for (i, card) in cards.into_iter().enumerate() {
        if card.fragments.is_empty() {
            return Err(format!("card {i} has no content"));
        }
        for fragment in &card.fragments {
            if fragment.block < last_block {
                return Err(format!(
                    "card {i}: block {} placed after block {last_block}",
                    fragment.block
                ));
            }
            last_block = fragment.block;
            if fragment.start != position {
                return Err(format!(
                    "card {i}: fragment starts at byte {} but previous content ended at {position}",
                    fragment.start
                ));
            }
            position = fragment.end();
        }
    }
    if position != source.len() {
        return Err(format!(
            "cards cover {position} of {} source bytes",
            source.len()
        ));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

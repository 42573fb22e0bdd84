//! Refinement loop: verifies provisional cards against the render oracle and
//! splits the ones that overflow.
//!
//! # Architecture
//! - Cards are processed from an explicit worklist in content order; a split
//!   pushes both halves back onto the front, left first, so oracle calls stay
//!   sequential and ordered.
//! - A split is a growth pass over the card's line pieces: pieces are added
//!   while their heuristic cost, rescaled by how far the oracle disagreed with
//!   the estimate, stays within `hard_height`. The cut is always strict, so
//!   each half is smaller than its parent.
//! - Depth is bounded by `max_depth`. A card still over `hard_height` at the
//!   limit, or with no valid cut, is emitted as `OverflowUnsplittable`.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::layout::cost_model::{CardBudget, CostModel, INNER_PADDING_PX};
use crate::layout::packer::{decompose, is_blank};
use crate::models::{Card, CardStatus, Fragment};
use crate::oracle::{OracleError, RenderOracle};
use crate::render::CardTemplate;

/// A card in a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedCard<'a> {
    pub card: Card<'a>,
    pub measured_px: u32,
    pub status: CardStatus,
    /// Number of splits between the packer's card and this one.
    pub depth: u8,
}

/// Drives provisional cards through the oracle until every card is accepted
/// or flagged. Output order equals input order.
pub async fn refine_cards<'a>(
    cards: Vec<Card<'a>>,
    oracle: &dyn RenderOracle,
    template: &CardTemplate,
    budget: &CardBudget,
    model: &CostModel,
    max_depth: u8,
) -> Result<Vec<RefinedCard<'a>>, OracleError> {
    let mut pending: VecDeque<(Card<'a>, u8)> = cards.into_iter().map(|c| (c, 0)).collect();
    let mut done = Vec::with_capacity(pending.len());

    while let Some((card, depth)) = pending.pop_front() {
        let markup = template.measurement(card.content(), &card.fence_repair());
        let measured_px = oracle.measure(&markup).await?;

        if measured_px <= budget.hard_height {
            done.push(RefinedCard {
                card,
                measured_px,
                status: CardStatus::Accepted,
                depth,
            });
            continue;
        }

        let split = if depth < max_depth {
            split_card(&card, measured_px, budget.hard_height, model)
        } else {
            None
        };

        match split {
            Some((left, right)) => {
                debug!(
                    depth,
                    measured_px,
                    left_px = left.estimated_px,
                    right_px = right.estimated_px,
                    "Card over hard height, splitting"
                );
                pending.push_front((right, depth + 1));
                pending.push_front((left, depth + 1));
            }
            None => {
                warn!(
                    depth,
                    measured_px,
                    hard_height = budget.hard_height,
                    "Card still overflows and cannot be split further"
                );
                done.push(RefinedCard {
                    card,
                    measured_px,
                    status: CardStatus::OverflowUnsplittable,
                    depth,
                });
            }
        }
    }

    Ok(done)
}

// ────────────────────────────────────────────────────────────────────────────
// Splitting
// ────────────────────────────────────────────────────────────────────────────

/// A line piece of a card, remembering which card fragment it came from.
#[derive(Debug, Clone, Copy)]
struct Unit<'a> {
    piece: Fragment<'a>,
    origin: usize,
}

/// Splits an overflowing card into two strictly smaller cards, or returns
/// `None` when the card is a single irreducible unit.
///
/// The growth budget is `hard_height` mapped back into estimate units using
/// the card's own measured/estimated ratio (both including inner padding).
pub fn split_card<'a>(
    card: &Card<'a>,
    measured_px: u32,
    hard_height: u32,
    model: &CostModel,
) -> Option<(Card<'a>, Card<'a>)> {
    let units: Vec<Unit<'a>> = card
        .fragments
        .iter()
        .enumerate()
        .flat_map(|(origin, fragment)| {
            decompose(fragment, model)
                .into_iter()
                .map(move |piece| Unit { piece, origin })
        })
        .collect();

    if units.len() < 2 || measured_px == 0 {
        return None;
    }

    let estimated_total = u64::from(card.estimated_px + INNER_PADDING_PX);
    let allowed_total = estimated_total * u64::from(hard_height) / u64::from(measured_px);
    let allowed = allowed_total.saturating_sub(u64::from(INNER_PADDING_PX));

    let mut running = 0u64;
    let mut grown = 0usize;
    for unit in &units {
        if running + u64::from(unit.piece.cost) > allowed {
            break;
        }
        running += u64::from(unit.piece.cost);
        grown += 1;
    }

    let cut = choose_cut(&units, grown.max(1))?;
    Some(rebuild(card, &units, cut))
}

/// Picks the cut index nearest to `target`: first looking back (so the left
/// card stays within budget), then forward. A cut is valid when both sides are
/// non-empty, the left side renders something, and the right side does not
/// open on a blank piece.
fn choose_cut(units: &[Unit<'_>], target: usize) -> Option<usize> {
    let valid = |k: usize| {
        k >= 1
            && k < units.len()
            && !is_blank(&units[k].piece)
            && units[..k].iter().any(|u| !is_blank(&u.piece))
    };
    let target = target.min(units.len() - 1);
    (1..=target)
        .rev()
        .find(|&k| valid(k))
        .or_else(|| (target + 1..units.len()).find(|&k| valid(k)))
}

/// Builds the two halves. Fragments that land entirely on one side are kept
/// whole; only the straddled fragment stays in pieces.
fn rebuild<'a>(card: &Card<'a>, units: &[Unit<'a>], cut: usize) -> (Card<'a>, Card<'a>) {
    let (left_units, right_units) = units.split_at(cut);
    let straddled = match (left_units.last(), right_units.first()) {
        (Some(l), Some(r)) if l.origin == r.origin => Some(l.origin),
        _ => None,
    };

    let side = |side_units: &[Unit<'a>]| -> Vec<Fragment<'a>> {
        let mut out = Vec::new();
        let mut last_origin = None;
        for unit in side_units {
            if Some(unit.origin) == straddled {
                out.push(unit.piece);
            } else if last_origin != Some(unit.origin) {
                out.push(card.fragments[unit.origin]);
            }
            last_origin = Some(unit.origin);
        }
        out
    };

    (
        Card::from_fragments(card.source, side(left_units)),
        Card::from_fragments(card.source, side(right_units)),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::models::block::{open_fence_at, BlockKind};

/// A contiguous slice of one block placed on a card: either the whole block or a
/// single line piece produced when the block had to be decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// Index of the owning block within its segment.
    pub block: usize,
    pub kind: BlockKind,
    /// Byte offset of `text` within the segment.
    pub start: usize,
    pub text: &'a str,
    pub whole_block: bool,
    /// Estimated height in pixels.
    pub cost: u32,
}

impl Fragment<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// A provisional card: an ordered, non-empty run of fragments over one segment.
///
/// Cards are never mutated after construction; splitting builds two new cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card<'a> {
    /// The full segment text the fragments point into.
    pub source: &'a str,
    pub fragments: Vec<Fragment<'a>>,
    pub estimated_px: u32,
}

impl<'a> Card<'a> {
    pub fn from_fragments(source: &'a str, fragments: Vec<Fragment<'a>>) -> Self {
        let estimated_px = fragments.iter().map(|f| f.cost).sum();
        Self {
            source,
            fragments,
            estimated_px,
        }
    }

    /// Byte range of the card within its segment. Fragments are contiguous.
    pub fn span(&self) -> (usize, usize) {
        let start = self.fragments.first().map(|f| f.start).unwrap_or(0);
        let end = self.fragments.last().map(|f| f.end()).unwrap_or(start);
        (start, end)
    }

    /// Raw markdown of the card, exactly as it appears in the segment.
    pub fn content(&self) -> &'a str {
        let (start, end) = self.span();
        &self.source[start..end]
    }

    /// Which synthetic fences the card needs to render as valid markdown when
    /// it was cut inside a code block.
    /// The synthetic fences reuse the enclosing block's own delimiter.
    pub fn fence_repair(&self) -> FenceRepair {
        let cut_code = |f: &&Fragment<'_>| f.kind == BlockKind::CodeFence && !f.whole_block;
        let open = self
            .fragments
            .first()
            .filter(cut_code)
            .and_then(|f| open_fence_at(self.source, f.start))
            .map(|fence| fence.opener());
        let close = self
            .fragments
            .last()
            .filter(cut_code)
            .and_then(|f| open_fence_at(self.source, f.end()))
            .map(|fence| fence.closer());
        FenceRepair { open, close }
    }
}

/// Synthetic fence lines to add around a card's markdown. Never touches the
/// card's source range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceRepair {
    /// Opening fence line, info string included.
    pub open: Option<String>,
    pub close: Option<String>,
}


/// Terminal state of a card after refinement.
///
/// Per card: `Provisional → Measured → {Accepted | SplitPending}`, and
/// `SplitPending` turns into two provisional cards. Only the terminal states are
/// materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    /// Measured height is within the hard frame height.
    Accepted,
    /// Still over the hard height, but either irreducible or at the depth limit.
    /// Emitted anyway so no content is lost; callers should warn.
    OverflowUnsplittable,
}

/// A finalized card, owned and detached from the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCard {
    /// 1-based position across the whole document.
    pub ordinal: usize,
    /// Index of the author-declared segment the card was cut from.
    pub segment: usize,
    pub content: String,
    pub estimated_height: u32,
    pub measured_height: u32,
    pub status: CardStatus,
    /// Number of oracle-driven splits between the packer's card and this one.
    pub split_depth: u8,
    #[serde(skip)]
    pub fence_repair: FenceRepair,
}

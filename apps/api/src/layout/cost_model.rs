//! Static per-kind cost model and the card height budget.
//!
//! Heights are CSS pixels at the card's base typography: 42px body text at
//! line-height 1.7 inside a 1080×1440 frame. Line capacities are average
//! characters per rendered line, calibrated for CJK-heavy text. Real wrapping
//! depends on glyph widths the model never sees; refinement against the oracle
//! absorbs the difference.

use serde::{Deserialize, Serialize};

use crate::models::BlockKind;

// ────────────────────────────────────────────────────────────────────────────
// Card budget
// ────────────────────────────────────────────────────────────────────────────

/// Frame vertical padding of `.card-inner` (60px top + 60px bottom). The oracle
/// measures the inner frame, so measured heights include it.
pub const INNER_PADDING_PX: u32 = 120;

/// Frame dimensions and the two height ceilings used during pagination.
///
/// `safe_height` caps the estimated content height during heuristic packing.
/// `hard_height` is the only value an oracle measurement is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardBudget {
    pub frame_width: u32,
    pub frame_height: u32,
    pub safe_height: u32,
    pub hard_height: u32,
}

/// Returns the default budget for a 1080×1440 (3:4) card.
///
/// safe = 1440 − 120 (inner padding) − 100 (container padding) − 80 (page
/// number band) − 40 (margin) = 1100.
/// hard = 1440 − 100 (container padding) = 1340.
pub fn default_budget() -> CardBudget {
    CardBudget {
        frame_width: 1080,
        frame_height: 1440,
        safe_height: 1100,
        hard_height: 1340,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-kind metrics
// ────────────────────────────────────────────────────────────────────────────

/// Cost parameters for one block kind.
///
/// One source line costs `line_fixed_px + ceil(visual_lines × line_height_px)`,
/// where `visual_lines = max(1, ceil(chars / line_capacity))`. A block adds
/// `block_margin_px` once. Kinds with `line_height_px == 0` are fixed-cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindMetrics {
    pub line_fixed_px: u32,
    pub line_height_px: f32,
    pub line_capacity: usize,
    pub block_margin_px: u32,
}

impl KindMetrics {
    const fn fixed(px: u32) -> Self {
        Self {
            line_fixed_px: px,
            line_height_px: 0.0,
            line_capacity: 0,
            block_margin_px: 0,
        }
    }

    /// Number of rendered lines a source line of `chars` characters occupies.
    pub fn visual_lines(&self, chars: usize) -> usize {
        if self.line_capacity == 0 {
            return 1;
        }
        chars.div_ceil(self.line_capacity).max(1)
    }

    /// Height of one rendered line, rounded up to whole pixels.
    pub fn line_px(&self) -> u32 {
        self.line_height_px.ceil() as u32
    }
}

/// Complete static cost model: one `KindMetrics` per block kind, plus the cost
/// of a code fence delimiter line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub heading1: KindMetrics,
    pub heading2: KindMetrics,
    pub heading3: KindMetrics,
    pub paragraph: KindMetrics,
    pub list_item: KindMetrics,
    pub quote: KindMetrics,
    pub code: KindMetrics,
    pub image: KindMetrics,
    pub blank: KindMetrics,
    /// Opening or closing ``` line, including the `<pre>` padding it stands for.
    pub code_fence_px: u32,
}

impl CostModel {
    pub fn metrics(&self, kind: BlockKind) -> &KindMetrics {
        match kind {
            BlockKind::Heading1 => &self.heading1,
            BlockKind::Heading2 => &self.heading2,
            BlockKind::Heading3 => &self.heading3,
            BlockKind::Paragraph => &self.paragraph,
            BlockKind::ListItem => &self.list_item,
            BlockKind::Quote => &self.quote,
            BlockKind::CodeFence => &self.code,
            BlockKind::ImageRef => &self.image,
            BlockKind::Blank => &self.blank,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Default table
// ────────────────────────────────────────────────────────────────────────────

/// Calibrated against the card stylesheet in `render::markup`.
static DEFAULT_COST_MODEL: CostModel = CostModel {
    // h1: 72px × 1.3 + 40px margin
    heading1: KindMetrics::fixed(130),
    // h2: 56px × 1.4 + 50/25px margins
    heading2: KindMetrics::fixed(110),
    // h3: 48px + 40/20px margins
    heading3: KindMetrics::fixed(90),
    // p: 42px × 1.7, ~28 CJK characters per line, 35px margin-bottom
    paragraph: KindMetrics {
        line_fixed_px: 0,
        line_height_px: 42.0 * 1.7,
        line_capacity: 28,
        block_margin_px: 35,
    },
    // li: 42px × 1.6, 60px list indent, 20px margin-bottom per item
    list_item: KindMetrics {
        line_fixed_px: 20,
        line_height_px: 42.0 * 1.6,
        line_capacity: 26,
        block_margin_px: 0,
    },
    // blockquote: 8px border + 40px/30px horizontal padding, ~100px per line
    quote: KindMetrics {
        line_fixed_px: 30,
        line_height_px: 70.0,
        line_capacity: 24,
        block_margin_px: 0,
    },
    // pre: 36px × 1.5 monospace, pre-wrap
    code: KindMetrics {
        line_fixed_px: 0,
        line_height_px: 36.0 * 1.5,
        line_capacity: 36,
        block_margin_px: 0,
    },
    image: KindMetrics::fixed(300),
    blank: KindMetrics::fixed(20),
    code_fence_px: 80,
};

/// Returns the default static cost model.
pub fn default_cost_model() -> &'static CostModel {
    &DEFAULT_COST_MODEL
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

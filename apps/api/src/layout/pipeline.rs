//! Pagination pipeline: segment → blocks → heuristic cards → verified cards.
//!
//! One document runs as a single sequential pipeline: the only suspension
//! point is the oracle call inside refinement. A fatal oracle error discards
//! everything produced for the document so far.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::document::{Document, Metadata};
use crate::layout::cost_model::{CardBudget, CostModel};
use crate::layout::packer::{check_lossless, pack_cards};
use crate::layout::refine::refine_cards;
use crate::layout::segmenter::segment_blocks;
use crate::models::{Card, CardStatus, PageCard};
use crate::oracle::{OracleError, RenderOracle};
use crate::render::CardTemplate;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Render oracle timed out")]
    OracleTimeout,

    #[error("Render oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Cards no longer reproduce their segment. Always a packing bug.
    #[error("Invariant violation in segment {segment}: {detail}")]
    InvariantViolation { segment: usize, detail: String },
}

impl From<OracleError> for PipelineError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout => PipelineError::OracleTimeout,
            OracleError::Unavailable(msg) => PipelineError::OracleUnavailable(msg),
            OracleError::InvalidResponse(msg) => {
                PipelineError::OracleUnavailable(format!("invalid response: {msg}"))
            }
        }
    }
}

/// Final, ordered card list for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub metadata: Metadata,
    pub cards: Vec<PageCard>,
    /// Cards emitted as `OverflowUnsplittable`. Callers should warn when > 0.
    pub overflow_count: usize,
}

/// Pagination settings shared by every document a service handles.
#[derive(Debug, Clone)]
pub struct Paginator {
    budget: CardBudget,
    model: CostModel,
    template: CardTemplate,
    max_depth: u8,
}

impl Paginator {
    pub fn new(budget: CardBudget, model: CostModel, max_depth: u8) -> Self {
        Self {
            budget,
            model,
            template: CardTemplate::new(&budget),
            max_depth,
        }
    }

    pub fn template(&self) -> &CardTemplate {
        &self.template
    }

    /// Heuristic pass for one segment: blocks packed by estimate only.
    fn plan<'a>(&self, index: usize, source: &'a str) -> Result<Vec<Card<'a>>, PipelineError> {
        let blocks = segment_blocks(source);
        let cards = pack_cards(source, &blocks, &self.budget, &self.model);
        check_lossless(source, &cards)
            .map_err(|detail| PipelineError::InvariantViolation { segment: index, detail })?;
        debug!(
            segment = index,
            blocks = blocks.len(),
            cards = cards.len(),
            "Packed segment"
        );
        Ok(cards)
    }

    /// Paginates a whole document. Either every card is returned, in order,
    /// or a single fatal error.
    pub async fn paginate(
        &self,
        document: &Document,
        oracle: &dyn RenderOracle,
    ) -> Result<Pagination, PipelineError> {
        let mut cards: Vec<PageCard> = Vec::new();

        for segment in &document.segments {
            let source = segment.text.as_str();
            let provisional = self.plan(segment.index, source)?;
            let refined = refine_cards(
                provisional,
                oracle,
                &self.template,
                &self.budget,
                &self.model,
                self.max_depth,
            )
            .await?;

            check_lossless(source, refined.iter().map(|r| &r.card)).map_err(|detail| {
                PipelineError::InvariantViolation {
                    segment: segment.index,
                    detail,
                }
            })?;

            for refined_card in refined {
                cards.push(PageCard {
                    ordinal: cards.len() + 1,
                    segment: segment.index,
                    content: refined_card.card.content().to_string(),
                    estimated_height: refined_card.card.estimated_px,
                    measured_height: refined_card.measured_px,
                    status: refined_card.status,
                    split_depth: refined_card.depth,
                    fence_repair: refined_card.card.fence_repair(),
                });
            }
        }

        let overflow_count = cards
            .iter()
            .filter(|c| c.status == CardStatus::OverflowUnsplittable)
            .count();

        info!(
            chars = document.body.chars().count(),
            segments = document.segments.len(),
            cards = cards.len(),
            overflow = overflow_count,
            "Paginated document"
        );

        Ok(Pagination {
            metadata: document.metadata.clone(),
            cards,
            overflow_count,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::document::parse_document;
    use crate::layout::cost_model::{default_budget, default_cost_model};
    use crate::oracle::EstimateOracle;
    use crate::render::CardMarkup;

    fn paginator() -> Paginator {
        Paginator::new(default_budget(), *default_cost_model(), 6)
    }

    fn estimate_oracle() -> EstimateOracle {
        EstimateOracle::new(*default_cost_model())
    }

    /// Returns `height` for every call, failing with a timeout on call
    /// `fail_on` (1-based) if set.
    struct ScriptedOracle {
        height: u32,
        fail_on: Option<u32>,
        calls: AtomicU32,
    }

    impl ScriptedOracle {
        fn new(height: u32, fail_on: Option<u32>) -> Self {
            Self {
                height,
                fail_on,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RenderOracle for ScriptedOracle {
        async fn measure(&self, _markup: &CardMarkup) -> Result<u32, OracleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(call) {
                return Err(OracleError::Timeout);
            }
            Ok(self.height)
        }
    }

    /// Keeps the markdown of every measurement; height is per source line.
    struct RecordingOracle {
        px_per_line: u32,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RenderOracle for RecordingOracle {
        async fn measure(&self, markup: &CardMarkup) -> Result<u32, OracleError> {
            self.seen.lock().unwrap().push(markup.source.clone());
            Ok(markup.source.lines().count() as u32 * self.px_per_line)
        }
    }

    // ── example scenarios ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_title_and_short_line_is_one_card() {
        let doc = parse_document("# Title\nShort line.");
        let result = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();

        assert_eq!(result.cards.len(), 1);
        let card = &result.cards[0];
        assert_eq!(card.content, "# Title\nShort line.");
        assert_eq!(card.status, CardStatus::Accepted);
        assert_eq!(card.ordinal, 1);
        assert_eq!(result.overflow_count, 0);
    }

    #[tokio::test]
    async fn test_three_segments_give_three_cards() {
        let doc = parse_document("First part.\n---\n## Second\nbody\n---\n- third");
        let result = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();

        let contents: Vec<&str> = result.cards.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["First part.", "## Second\nbody", "- third"]);
        let segments: Vec<usize> = result.cards.iter().map(|c| c.segment).collect();
        assert_eq!(segments, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_long_paragraph_matches_heuristic_count() {
        let doc = parse_document(&"字".repeat(5000));
        let result = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();

        assert_eq!(result.cards.len(), 12);
        assert!(result.cards.iter().all(|c| c.status == CardStatus::Accepted));
        assert!(result.cards.iter().all(|c| c.measured_height <= 1340));
        let rejoined: String = result.cards.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rejoined, "字".repeat(5000));
    }

    #[tokio::test]
    async fn test_oversized_code_block_is_flagged_not_looped() {
        let doc = parse_document(&format!("```\n{}\n```", "x".repeat(4000)));
        let oracle = ScriptedOracle::new(5000, None);
        let result = paginator().paginate(&doc, &oracle).await.unwrap();

        assert_eq!(result.cards.len(), 1);
        assert_eq!(result.cards[0].status, CardStatus::OverflowUnsplittable);
        assert_eq!(result.overflow_count, 1);
        assert!(oracle.calls.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test]
    async fn test_oracle_timeout_fails_whole_document() {
        let doc = parse_document("one\n---\ntwo\n---\nthree\n---\nfour");
        let oracle = ScriptedOracle::new(400, Some(2));
        let err = paginator().paginate(&doc, &oracle).await.unwrap_err();

        assert!(matches!(err, PipelineError::OracleTimeout));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    // ── properties ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_every_segment_is_reproduced_in_order() {
        let raw = format!(
            "---\ntitle: Mixed\n---\n# Intro\n{}\n\n> {}\n---\n```rust\n{}```\n\n- {}\n",
            "word ".repeat(400),
            "引用".repeat(300),
            "let x = 1;\n".repeat(60),
            "item ".repeat(100),
        );
        let doc = parse_document(&raw);
        let result = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();

        for segment in &doc.segments {
            let rejoined: String = result
                .cards
                .iter()
                .filter(|c| c.segment == segment.index)
                .map(|c| c.content.as_str())
                .collect();
            assert_eq!(rejoined, segment.text);
        }
        let ordinals: Vec<usize> = result.cards.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, (1..=result.cards.len()).collect::<Vec<_>>());
        assert_eq!(result.metadata.title.as_deref(), Some("Mixed"));
    }

    #[tokio::test]
    async fn test_oracle_calls_follow_content_order_across_segments() {
        let first: String = (0..30).map(|i| format!("- item {i:02}\n")).collect();
        let doc = parse_document(&format!("{first}---\nsecond segment\n---\n## third\nbody"));
        let oracle = RecordingOracle {
            px_per_line: 150,
            seen: Mutex::new(Vec::new()),
        };
        let result = paginator().paginate(&doc, &oracle).await.unwrap();
        let seen = oracle.seen.lock().unwrap().clone();

        assert!(seen.len() > result.cards.len(), "expected at least one split");
        let positions: Vec<(usize, usize)> = seen
            .iter()
            .map(|measured| {
                doc.segments
                    .iter()
                    .find_map(|s| s.text.find(measured.as_str()).map(|at| (s.index, at)))
                    .unwrap()
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] <= w[1]), "{positions:?}");
        assert_eq!(seen[seen.len() - 2..], ["second segment", "## third\nbody"]);
    }

    #[tokio::test]
    async fn test_cut_tilde_block_reopens_with_its_own_fence() {
        let raw = format!("~~~python\n{}~~~\nafter", "print(1)\n".repeat(80));
        let doc = parse_document(&raw);
        let result = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();

        let (last, code_cards) = result.cards.split_last().unwrap();
        assert_eq!(last.content, "after");
        assert!(code_cards.len() > 1);
        assert_eq!(code_cards[0].fence_repair.open, None);
        for card in &code_cards[1..] {
            assert_eq!(card.fence_repair.open.as_deref(), Some("~~~python"));
        }
        for card in &code_cards[..code_cards.len() - 1] {
            assert_eq!(card.fence_repair.close.as_deref(), Some("~~~"));
        }
        assert_eq!(code_cards[code_cards.len() - 1].fence_repair.close, None);
    }

    #[tokio::test]
    async fn test_pagination_is_idempotent() {
        let raw = format!("# T\n{}\n\n```\n{}```\n", "段".repeat(2000), "x\n".repeat(80));
        let doc = parse_document(&raw);
        let first = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();
        let second = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_split_depth_never_exceeds_limit() {
        let doc = parse_document(&"- a\n".repeat(200));
        let oracle = ScriptedOracle::new(9000, None);
        let limited = Paginator::new(default_budget(), *default_cost_model(), 3);
        let result = limited.paginate(&doc, &oracle).await.unwrap();

        assert!(result.cards.iter().all(|c| c.split_depth <= 3));
        assert_eq!(result.overflow_count, result.cards.len());
    }

    #[tokio::test]
    async fn test_empty_document_has_no_cards() {
        let doc = parse_document("   \n\n");
        let result = paginator().paginate(&doc, &estimate_oracle()).await.unwrap();
        assert!(result.cards.is_empty());
    }

    #[test]
    fn test_oracle_errors_map_to_pipeline_errors() {
        assert!(matches!(
            PipelineError::from(OracleError::Timeout),
            PipelineError::OracleTimeout
        ));
        assert!(matches!(
            PipelineError::from(OracleError::InvalidResponse("bad".into())),
            PipelineError::OracleUnavailable(_)
        ));
    }
}

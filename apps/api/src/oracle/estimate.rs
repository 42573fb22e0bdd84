use async_trait::async_trait;

use crate::layout::cost_model::{CostModel, INNER_PADDING_PX};
use crate::layout::estimator::estimate_markdown;
use crate::oracle::{OracleError, RenderOracle};
use crate::render::CardMarkup;

/// Offline oracle: reports the heuristic estimate of the card's markdown plus
/// the inner frame padding, the same quantity a browser reports for
/// `.card-inner`. Used when no measurement service is configured.
#[derive(Debug, Clone)]
pub struct EstimateOracle {
    model: CostModel,
}

impl EstimateOracle {
    pub fn new(model: CostModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl RenderOracle for EstimateOracle {
    async fn measure(&self, markup: &CardMarkup) -> Result<u32, OracleError> {
        Ok(estimate_markdown(&markup.source, &self.model) + INNER_PADDING_PX)
    }
}

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::layout::Paginator;
use crate::oracle::{CardRenderer, RenderOracle};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub paginator: Arc<Paginator>,
    /// Measurement oracle. Default: EstimateOracle. Swap via ORACLE_URL.
    pub oracle: Arc<dyn RenderOracle>,
    /// `None` when RENDERER_URL is unset.
    pub renderer: Option<Arc<dyn CardRenderer>>,
    /// Bounds how many documents are paginated at once. Oracle calls within a
    /// document stay sequential.
    pub permits: Arc<Semaphore>,
}

//! Measurement and rasterization collaborators.
//!
//! The pagination core only sees these two traits. `RenderOracle` is the
//! authoritative height measurement; `CardRenderer` produces the final image.
//! Both are expensive, so callers keep invocations sequential per document.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::render::CardMarkup;

pub mod estimate;
pub mod http;

pub use estimate::EstimateOracle;
pub use http::{HttpCardRenderer, HttpRenderOracle};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle call timed out")]
    Timeout,

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Measures the real content height of a card's markup, in pixels.
///
/// Implementations must be deterministic for identical markup and frame.
#[async_trait]
pub trait RenderOracle: Send + Sync {
    async fn measure(&self, markup: &CardMarkup) -> Result<u32, OracleError>;
}

/// Rasterizes finalized markup into a fixed-size image.
#[async_trait]
pub trait CardRenderer: Send + Sync {
    async fn rasterize(
        &self,
        markup: &CardMarkup,
        width: u32,
        height: u32,
    ) -> Result<Bytes, OracleError>;
}

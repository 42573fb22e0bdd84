//! HTTP collaborators backed by an external headless-browser service.
//!
//! `POST {url}/measure` with `{html, width, height}` returns `{"height": px}`,
//! the scroll height of the card's measure target. `POST {url}/rasterize` with
//! the same body returns the PNG bytes of the full frame.
//!
//! Timeouts are reported immediately. Connection failures, 429 and 5xx are
//! retried with exponential backoff before surfacing as `Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::oracle::{CardRenderer, OracleError, RenderOracle};
use crate::render::markup::MEASURE_SELECTOR;
use crate::render::CardMarkup;

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(250);

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    html: &'a str,
    width: u32,
    height: u32,
    selector: &'a str,
}

#[derive(Debug, Deserialize)]
struct MeasureResponse {
    height: f64,
}

/// Shared transport: one pooled client, one base URL, bounded retries.
#[derive(Debug, Clone)]
struct ServiceClient {
    client: Client,
    base_url: String,
    backoff: Duration,
}

impl ServiceClient {
    fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            backoff: BACKOFF_BASE,
        })
    }

    async fn post(&self, path: &str, body: &RenderRequest<'_>) -> Result<Response, OracleError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error: Option<OracleError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: base, then 2×base
                let delay = self.backoff * (1 << (attempt - 1));
                warn!(
                    "Render service call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() => return Err(OracleError::Timeout),
                Err(e) => {
                    last_error = Some(OracleError::Unavailable(e.to_string()));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                warn!("Render service returned {}: {}", status, text);
                last_error = Some(OracleError::Unavailable(format!("status {status}: {text}")));
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(OracleError::InvalidResponse(format!("status {status}: {text}")));
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| {
            OracleError::Unavailable(format!("no response after {MAX_RETRIES} attempts"))
        }))
    }
}

fn body_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::InvalidResponse(e.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Measurement
// ────────────────────────────────────────────────────────────────────────────

/// Measures card markup in a real browser page sized to the frame.
#[derive(Debug, Clone)]
pub struct HttpRenderOracle {
    service: ServiceClient,
    width: u32,
    height: u32,
}

impl HttpRenderOracle {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        (width, height): (u32, u32),
    ) -> Result<Self, OracleError> {
        Ok(Self {
            service: ServiceClient::new(base_url, timeout)?,
            width,
            height,
        })
    }
}

#[async_trait]
impl RenderOracle for HttpRenderOracle {
    async fn measure(&self, markup: &CardMarkup) -> Result<u32, OracleError> {
        let request = RenderRequest {
            html: &markup.html,
            width: self.width,
            height: self.height,
            selector: MEASURE_SELECTOR,
        };
        let response = self.service.post("measure", &request).await?;
        let measured: MeasureResponse = response.json().await.map_err(body_error)?;

        if !measured.height.is_finite() || measured.height < 0.0 {
            return Err(OracleError::InvalidResponse(format!(
                "height must be a non-negative number, got {}",
                measured.height
            )));
        }
        let height = measured.height.ceil() as u32;
        debug!(measured_px = height, "Measured card");
        Ok(height)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rasterization
// ────────────────────────────────────────────────────────────────────────────

/// Rasterizes finalized card markup into PNG bytes.
#[derive(Debug, Clone)]
pub struct HttpCardRenderer {
    service: ServiceClient,
}

impl HttpCardRenderer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            service: ServiceClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl CardRenderer for HttpCardRenderer {
    async fn rasterize(
        &self,
        markup: &CardMarkup,
        width: u32,
        height: u32,
    ) -> Result<Bytes, OracleError> {
        let request = RenderRequest {
            html: &markup.html,
            width,
            height,
            selector: MEASURE_SELECTOR,
        };
        let response = self.service.post("rasterize", &request).await?;
        let bytes = response.bytes().await.map_err(body_error)?;
        if bytes.is_empty() {
            return Err(OracleError::InvalidResponse("empty image".to_string()));
        }
        Ok(bytes)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

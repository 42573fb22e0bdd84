use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version, and which collaborators are wired in.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let oracle = if state.config.oracle_url.is_some() {
        "http"
    } else {
        "estimate"
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cardpack",
        "oracle": oracle,
        "renderer": state.renderer.is_some(),
    }))
}

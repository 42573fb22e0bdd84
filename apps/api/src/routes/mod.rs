pub mod cards;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/paginate", post(cards::handle_paginate))
        .route("/api/v1/render", post(cards::handle_render))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use bytes::Bytes;
    use serde_json::{json, Value};
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::layout::{default_budget, default_cost_model, Paginator};
    use crate::oracle::{CardRenderer, EstimateOracle, OracleError, RenderOracle};
    use crate::render::CardMarkup;

    struct StubRenderer;

    #[async_trait]
    impl CardRenderer for StubRenderer {
        async fn rasterize(
            &self,
            _markup: &CardMarkup,
            _width: u32,
            _height: u32,
        ) -> Result<Bytes, OracleError> {
            Ok(Bytes::from_static(b"\x89PNG"))
        }
    }

    struct DownOracle;

    #[async_trait]
    impl RenderOracle for DownOracle {
        async fn measure(&self, _markup: &CardMarkup) -> Result<u32, OracleError> {
            Err(OracleError::Unavailable("connection refused".to_string()))
        }
    }

    fn config(output_dir: &Path) -> Config {
        Config {
            port: 0,
            rust_log: "info".to_string(),
            budget: default_budget(),
            max_refine_depth: 6,
            oracle_url: None,
            renderer_url: None,
            oracle_timeout_secs: 30,
            oracle_concurrency: 2,
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn state_with(
        oracle: Arc<dyn RenderOracle>,
        renderer: Option<Arc<dyn CardRenderer>>,
        output_dir: &Path,
    ) -> AppState {
        AppState {
            config: config(output_dir),
            paginator: Arc::new(Paginator::new(default_budget(), *default_cost_model(), 6)),
            oracle,
            renderer,
            permits: Arc::new(Semaphore::new(2)),
        }
    }

    fn default_state(output_dir: &Path) -> AppState {
        state_with(
            Arc::new(EstimateOracle::new(*default_cost_model())),
            Some(Arc::new(StubRenderer)),
            output_dir,
        )
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = build_router(default_state(dir.path()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["oracle"], "estimate");
    }

    #[tokio::test]
    async fn test_paginate_returns_ordered_cards() {
        let dir = tempfile::tempdir().unwrap();
        let markdown = "---\ntitle: Demo\n---\n# One\ntext\n---\n# Two\nmore text";
        let (status, body) = post_json(
            build_router(default_state(dir.path())),
            "/api/v1/paginate",
            json!({ "markdown": markdown }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["title"], "Demo");
        assert_eq!(body["overflow_count"], 0);
        let cards = body["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0]["content"], "# One\ntext");
        assert_eq!(cards[0]["status"], "accepted");
        assert_eq!(cards[1]["ordinal"], 2);
        assert_eq!(cards[1]["segment"], 1);
    }

    #[tokio::test]
    async fn test_paginate_waits_for_a_free_permit() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = default_state(dir.path());
        state.permits = Arc::new(Semaphore::new(1));
        let held = state.permits.clone().acquire_owned().await.unwrap();

        let mut request = tokio::spawn(post_json(
            build_router(state),
            "/api/v1/paginate",
            json!({ "markdown": "# Waiting" }),
        ));
        let early = tokio::time::timeout(Duration::from_millis(100), &mut request).await;
        assert!(early.is_err(), "request completed while the only permit was held");

        drop(held);
        let (status, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cards"][0]["content"], "# Waiting");
    }

    #[tokio::test]
    async fn test_paginate_rejects_empty_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            build_router(default_state(dir.path())),
            "/api/v1/paginate",
            json!({ "markdown": "  \n" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_paginate_reports_unavailable_oracle() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(DownOracle), None, dir.path());
        let (status, body) = post_json(
            build_router(state),
            "/api/v1/paginate",
            json!({ "markdown": "# Title" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "ORACLE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_render_writes_images_to_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        let markdown = "---\ntitle: Cover\n---\nfirst\n---\nsecond";
        let (status, body) = post_json(
            build_router(default_state(dir.path())),
            "/api/v1/render",
            json!({ "markdown": markdown }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let files: Vec<PathBuf> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| PathBuf::from(f.as_str().unwrap()))
            .collect();
        let names: Vec<&str> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["cover.png", "card_1.png", "card_2.png"]);

        let job_dir = dir.path().join(body["job_id"].as_str().unwrap());
        for file in &files {
            assert!(file.starts_with(&job_dir));
            assert_eq!(std::fs::read(file).unwrap(), b"\x89PNG");
        }
    }

    #[tokio::test]
    async fn test_render_without_renderer_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            Arc::new(EstimateOracle::new(*default_cost_model())),
            None,
            dir.path(),
        );
        let (status, body) = post_json(
            build_router(state),
            "/api/v1/render",
            json!({ "markdown": "# Title" }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "RENDERER_NOT_CONFIGURED");
    }
}

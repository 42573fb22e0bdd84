use anyhow::Context;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::parse_document;
use crate::errors::AppError;
use crate::layout::Pagination;
use crate::render::render_document;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaginateRequest {
    pub markdown: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub job_id: Uuid,
    /// Written image paths, cover first, then cards in order.
    pub files: Vec<String>,
    pub pagination: Pagination,
}

/// POST /api/v1/paginate
pub async fn handle_paginate(
    State(state): State<AppState>,
    Json(req): Json<PaginateRequest>,
) -> Result<Json<Pagination>, AppError> {
    let _permit = state
        .permits
        .acquire()
        .await
        .context("Pagination semaphore closed")?;
    let pagination = paginate_markdown(&state, &req.markdown).await?;
    Ok(Json(pagination))
}

/// POST /api/v1/render
pub async fn handle_render(
    State(state): State<AppState>,
    Json(req): Json<PaginateRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    let renderer = state
        .renderer
        .clone()
        .ok_or(AppError::RendererNotConfigured)?;

    let _permit = state
        .permits
        .acquire()
        .await
        .context("Pagination semaphore closed")?;
    let pagination = paginate_markdown(&state, &req.markdown).await?;
    let images = render_document(&pagination, state.paginator.template(), renderer.as_ref()).await?;

    let job_id = Uuid::new_v4();
    let dir = state.config.output_dir.join(job_id.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut files = Vec::with_capacity(images.len());
    for image in &images {
        let path = dir.join(&image.name);
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        files.push(path.display().to_string());
    }

    info!(%job_id, files = files.len(), "Wrote rendered cards");
    Ok(Json(RenderResponse {
        job_id,
        files,
        pagination,
    }))
}

async fn paginate_markdown(state: &AppState, markdown: &str) -> Result<Pagination, AppError> {
    if markdown.trim().is_empty() {
        return Err(AppError::Validation("markdown must not be empty".to_string()));
    }

    let document = parse_document(markdown);
    let pagination = state
        .paginator
        .paginate(&document, state.oracle.as_ref())
        .await?;

    if pagination.overflow_count > 0 {
        warn!(
            overflow = pagination.overflow_count,
            cards = pagination.cards.len(),
            "Some cards still overflow the frame"
        );
    }
    Ok(pagination)
}

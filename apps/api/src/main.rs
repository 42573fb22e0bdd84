mod config;
mod document;
mod errors;
mod layout;
mod models;
mod oracle;
mod render;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::document::load_document;
use crate::layout::{default_cost_model, Paginator};
use crate::oracle::{CardRenderer, EstimateOracle, HttpCardRenderer, HttpRenderOracle, RenderOracle};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparsable values or an invalid budget)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cardpack v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Card budget: {}x{} frame, safe {}px, hard {}px, max depth {}",
        config.budget.frame_width,
        config.budget.frame_height,
        config.budget.safe_height,
        config.budget.hard_height,
        config.max_refine_depth
    );

    let timeout = Duration::from_secs(config.oracle_timeout_secs);
    let frame = (config.budget.frame_width, config.budget.frame_height);

    // Measurement oracle (EstimateOracle unless ORACLE_URL is set)
    let oracle: Arc<dyn RenderOracle> = match &config.oracle_url {
        Some(url) => {
            info!("Render oracle: {url}");
            Arc::new(HttpRenderOracle::new(url, timeout, frame)?)
        }
        None => {
            warn!("ORACLE_URL not set; measuring with the offline estimate oracle");
            Arc::new(EstimateOracle::new(*default_cost_model()))
        }
    };

    // Card renderer (optional)
    let renderer: Option<Arc<dyn CardRenderer>> = match &config.renderer_url {
        Some(url) => {
            info!("Card renderer: {url}");
            Some(Arc::new(HttpCardRenderer::new(url, timeout)?))
        }
        None => None,
    };

    let paginator = Arc::new(Paginator::new(
        config.budget,
        *default_cost_model(),
        config.max_refine_depth,
    ));

    // `cardpack <file.md>` paginates one document and prints the plan.
    if let Some(path) = std::env::args().nth(1) {
        return paginate_file(Path::new(&path), &paginator, oracle.as_ref()).await;
    }

    let state = AppState {
        config: config.clone(),
        paginator,
        oracle,
        renderer,
        permits: Arc::new(Semaphore::new(config.oracle_concurrency)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn paginate_file(path: &Path, paginator: &Paginator, oracle: &dyn RenderOracle) -> Result<()> {
    let document = load_document(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let pagination = paginator.paginate(&document, oracle).await?;
    if pagination.overflow_count > 0 {
        warn!(
            overflow = pagination.overflow_count,
            "Some cards still overflow the frame"
        );
    }
    println!("{}", serde_json::to_string_pretty(&pagination)?);
    Ok(())
}

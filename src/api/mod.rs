// src/api/mod.rs
// =============================================================================
// The HTTP front end.
//
// POST /v1/crawl  {"url": "...", "depth": n}  -> the serialized page tree
// GET  /v1/health                             -> liveness probe
//
// Malformed request bodies are rejected by the Json extractor before they
// reach the core. CORS is wide open: any origin, GET/POST/OPTIONS, a fixed
// header allow-list.
// =============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::crawler::{Crawler, PageNode};

#[derive(Debug, Deserialize)]
struct CrawlRequest {
    url: String,
    depth: i64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

// Binds the listener and serves the API until the process exits
pub async fn serve(addr: SocketAddr, crawler: Crawler) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app(crawler)).await?;
    Ok(())
}

fn app(crawler: Crawler) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::CONTENT_LANGUAGE,
            header::ORIGIN,
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/v1/crawl", post(crawl))
        .route("/v1/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(crawler))
}

async fn crawl(
    State(crawler): State<Arc<Crawler>>,
    Json(request): Json<CrawlRequest>,
) -> Json<PageNode> {
    info!(url = %request.url, depth = request.depth, "request received");

    // Negative depths behave like zero: the root comes back untouched.
    let depth = request.depth.max(0) as usize;
    Json(crawler.crawl(&request.url, depth).await)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

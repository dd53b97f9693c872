//! Newsdesk HTTP surface.
//!
//! Exposes a health check and an endpoint that runs the pipeline once per
//! request and returns the output document.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /` | `{"status": "online", ...}` |
//! | `POST /run?region=<r>` | Runs the pipeline for `r` (default `Global`) |
//!
//! A failed run answers `500` with `{"error": <kind>, "detail": <message>}`
//! and leaves the history store untouched.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Routing, request decoding, and error mapping live here.
//! Runs are delegated to a [`PipelineRunner`], normally
//! [`nodes::NewsPipeline`].

mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::{get, post};
use axum::Router;
use nodes::NewsPipeline;
use pipeline::{PipelineError, PipelineOutput, Region};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// Something that can run the pipeline for a region.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run(
        &self,
        region: &Region,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError>;
}

#[async_trait]
impl PipelineRunner for NewsPipeline {
    async fn run(
        &self,
        region: &Region,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        NewsPipeline::run(self, region, cancel).await
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn PipelineRunner>,
    /// Cancelled when the server shuts down; every run gets a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(runner: Arc<dyn PipelineRunner>, shutdown: CancellationToken) -> Self {
        Self { runner, shutdown }
    }
}

/// Builds the router with request tracing and permissive CORS.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/run", post(routes::run_pipeline))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router on `addr` until `state.shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

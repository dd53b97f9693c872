use axum::extract::{Query, State};
use axum::Json;
use pipeline::{PipelineOutput, Region};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RunParams {
    region: Option<String>,
}

/// `GET /`
pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "Newsdesk API is running.",
    }))
}

/// `POST /run?region=<name>`
///
/// Blank or missing regions run as `Global`. The run is cancelled if the
/// server begins shutting down.
pub(crate) async fn run_pipeline(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> Result<Json<PipelineOutput>, ApiError> {
    let region = params
        .region
        .and_then(Region::new)
        .unwrap_or_else(Region::global);
    info!(region = %region, "run requested");

    let output = state
        .runner
        .run(&region, state.shutdown.child_token())
        .await?;
    Ok(Json(output))
}

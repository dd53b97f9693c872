use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;

/// Errors returned from the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The run aborted; nothing was written to history.
    #[error("Pipeline execution failed: {0}")]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Pipeline(PipelineError::Cancelled(_)) => "cancelled",
            ApiError::Pipeline(PipelineError::DeadlineExceeded(_)) => "deadline_exceeded",
            ApiError::Pipeline(PipelineError::StageLimitExceeded { .. }) => "stage_limit_exceeded",
            ApiError::Pipeline(_) => "pipeline_failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        let body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

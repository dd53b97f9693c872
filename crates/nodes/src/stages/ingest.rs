use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    PipelineConfig, RunContext, RunState, StageError, StageHandler, StateUpdate, TrendSource,
};
use tracing::{info, warn};

/// Fetches raw trends for the run's region.
///
/// An empty or failed fetch is a soft failure: it is recorded in `errors`
/// with `current_step` set to `ingest_fail` or `ingest_error`, and the run
/// continues.
pub struct IngestStage {
    source: Arc<dyn TrendSource>,
    config: Arc<PipelineConfig>,
}

impl IngestStage {
    pub fn new(source: Arc<dyn TrendSource>, config: Arc<PipelineConfig>) -> Self {
        Self { source, config }
    }
}

#[async_trait]
impl StageHandler for IngestStage {
    async fn run(&self, state: &RunState, _ctx: &RunContext) -> Result<StateUpdate, StageError> {
        let query = self.config.feed_for(&state.region);
        let update = match self.source.fetch_trends(&query).await {
            Ok(trends) if !trends.is_empty() => {
                info!(region = state.region.as_str(), trends = trends.len(), "ingested trends");
                StateUpdate::new()
                    .raw_trends(trends)
                    .current_step("ingest")
                    .revision_count(0)
            }
            Ok(_) => {
                warn!(region = state.region.as_str(), "no trends found");
                StateUpdate::new()
                    .errors(state.errors_with("No trends found."))
                    .current_step("ingest_fail")
            }
            Err(error) => {
                warn!(region = state.region.as_str(), error = %error, "ingestion failed");
                StateUpdate::new()
                    .errors(state.errors_with(format!("Ingestion failed: {error}")))
                    .current_step("ingest_error")
            }
        };
        Ok(update)
    }
}

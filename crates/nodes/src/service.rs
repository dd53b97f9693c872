//! The run service: one region in, one output document out.
//!
//! Wraps the executor with the steps around a run: load history before,
//! shape the output document after. [`NewsPipeline::run_detailed`] never
//! writes; callers that persist the output record history with
//! [`NewsPipeline::record_history`] once the output is safely stored, so a
//! failed run or a failed output write leaves the store untouched.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use pipeline::{
    HistoryStore, PipelineConfig, PipelineError, PipelineOutput, Region, RoutingTable, RunState,
    StoreError,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::{blocking_runtime, ExecutorConfig, PipelineExecutor, RunOutcome};
use crate::stages::{standard_registry, Collaborators};

/// A finished run: the output document plus the executor's record of it.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: PipelineOutput,
    pub outcome: RunOutcome,
    /// Titles selected by this run, to be appended to history.
    pub covered: Vec<String>,
}

/// Runs the standard news pipeline against a shared history store.
///
/// Cheap to share behind an `Arc`; concurrent runs share nothing but the
/// history store.
pub struct NewsPipeline {
    executor: PipelineExecutor,
    history: Arc<dyn HistoryStore>,
}

impl NewsPipeline {
    pub fn new(executor: PipelineExecutor, history: Arc<dyn HistoryStore>) -> Self {
        Self { executor, history }
    }

    /// Builds the standard routing table and stage registry from `config`.
    pub fn from_config(
        config: &PipelineConfig,
        collaborators: Collaborators,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self, PipelineError> {
        let routing = RoutingTable::standard(config.revision_policy());
        let registry = standard_registry(&collaborators, config);
        let executor = PipelineExecutor::new(routing, registry, ExecutorConfig::from(&config.engine))?;
        Ok(Self::new(executor, history))
    }

    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    /// Runs the pipeline for `region`, records the covered titles, and returns
    /// the output document.
    ///
    /// For callers that hand the document straight back (the HTTP surface).
    /// A history write failure is logged; the document is still returned.
    pub async fn run(
        &self,
        region: &Region,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let report = self.run_detailed(region, cancel).await?;
        if let Err(error) = self.record_history(&report).await {
            warn!(error = %error, "could not record covered titles in history");
        }
        Ok(report.output)
    }

    /// Runs the pipeline without writing history, returning the output
    /// document, the stage trace, final state, and the covered titles.
    pub async fn run_detailed(
        &self,
        region: &Region,
        cancel: CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let history = self.history.load().await;
        info!(region = %region, history = history.len(), "starting run");

        let outcome = self
            .executor
            .run(RunState::new(region, history), cancel)
            .await?;

        let covered: Vec<String> = outcome
            .state
            .selected_trends
            .iter()
            .map(|trend| trend.title.clone())
            .collect();
        let output = PipelineOutput::new(
            outcome.state.articles.clone(),
            outcome.state.evaluation_score,
            started.elapsed(),
            Utc::now(),
        );
        info!(
            run_id = %outcome.run_id,
            articles = output.articles.len(),
            evaluation_score = output.evaluation_score,
            execution_time_seconds = output.execution_time_seconds,
            "run complete"
        );
        Ok(RunReport {
            output,
            outcome,
            covered,
        })
    }

    /// Appends the titles a finished run covered to the history store.
    pub async fn record_history(&self, report: &RunReport) -> Result<(), StoreError> {
        self.history.append(&report.covered).await
    }

    /// Blocking variant of [`run`](Self::run) on a private current-thread runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn run_blocking(
        &self,
        region: &Region,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        blocking_runtime()?.block_on(self.run(region, cancel))
    }
}

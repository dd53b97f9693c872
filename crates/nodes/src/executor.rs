//! The step-function loop that drives a run to termination.
//!
//! ```text
//! current = entry
//! loop {
//!     update = handler(current).run(&state, &ctx)
//!     state  = state.merge(update)
//!     next   = routing.route(current, &state)
//!     if next == END { break }
//!     current = next
//! }
//! ```
//!
//! Stages run strictly one at a time. The executor owns the only mutable
//! [`RunState`]; handlers see a shared borrow and hand back a [`StateUpdate`].
//! Three guards end a run early, all fatal: the stage-invocation ceiling, the
//! optional run deadline, and the caller's cancellation token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline::{
    EngineSection, Next, PipelineError, RoutingTable, RunContext, RunId, RunState, Stage,
    StageError, StageHandler, StateUpdate,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps each stage to the handler that implements it.
#[derive(Clone, Default)]
pub struct StageRegistry {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `stage`, replacing any earlier registration.
    pub fn register(self, stage: Stage, handler: impl StageHandler + 'static) -> Self {
        self.register_arc(stage, Arc::new(handler))
    }

    pub fn register_arc(mut self, stage: Stage, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(stage, handler);
        self
    }

    pub fn get(&self, stage: Stage) -> Option<&Arc<dyn StageHandler>> {
        self.handlers.get(&stage)
    }

    /// Stages with a registered handler, in stage order.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.handlers.keys().copied().collect();
        stages.sort();
        stages
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stages())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Execution guards applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Total stage invocations allowed per run, counting re-entries.
    pub max_stage_invocations: u32,
    /// Whole-run deadline. `None` disables it.
    pub run_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_stage_invocations: 64,
            run_timeout: None,
        }
    }
}

impl From<&EngineSection> for ExecutorConfig {
    fn from(section: &EngineSection) -> Self {
        Self {
            max_stage_invocations: section.max_stage_invocations,
            run_timeout: section.run_timeout(),
        }
    }
}

/// One completed stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub stage: Stage,
    pub elapsed: Duration,
    /// Where the routing table sent execution afterwards.
    pub next: Next,
}

/// A run that reached the terminal marker.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub state: RunState,
    pub trace: Vec<TraceEntry>,
}

impl RunOutcome {
    /// Stages in the order they ran.
    pub fn path(&self) -> Vec<Stage> {
        self.trace.iter().map(|entry| entry.stage).collect()
    }

    pub fn invocations(&self) -> usize {
        self.trace.len()
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Drives runs over a fixed routing table and handler registry.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    routing: RoutingTable,
    registry: StageRegistry,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    /// Creates an executor, checking that every stage in `routing` has a handler.
    pub fn new(
        routing: RoutingTable,
        registry: StageRegistry,
        config: ExecutorConfig,
    ) -> Result<Self, PipelineError> {
        if let Some(missing) = routing
            .stages()
            .into_iter()
            .find(|stage| registry.get(*stage).is_none())
        {
            return Err(PipelineError::MissingHandler(missing));
        }
        Ok(Self {
            routing,
            registry,
            config,
        })
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Runs from the entry stage to `END`.
    ///
    /// Cancelling `cancel` stops the run at the next suspension point inside
    /// the current stage.
    pub async fn run(
        &self,
        initial: RunState,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let run_id = RunId::new_random();
        let span = info_span!("pipeline_run", run_id = %run_id, region = %initial.region);

        async move {
            // Child token so a deadline can stop in-flight handlers without
            // cancelling the caller's token.
            let token = cancel.child_token();
            let drive = self.drive(run_id, initial, token.clone());

            let result = match self.config.run_timeout {
                Some(limit) => match tokio::time::timeout(limit, drive).await {
                    Ok(result) => result,
                    Err(_) => {
                        token.cancel();
                        Err(PipelineError::DeadlineExceeded(limit))
                    }
                },
                None => drive.await,
            };

            match &result {
                Ok(outcome) => info!(
                    invocations = outcome.invocations(),
                    revision_count = outcome.state.revision_count,
                    articles = outcome.state.articles.len(),
                    errors = outcome.state.errors.len(),
                    "run finished"
                ),
                Err(error) => tracing::error!(error = %error, "run aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Blocking variant of [`run`](Self::run) on a private current-thread runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn run_blocking(
        &self,
        initial: RunState,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        blocking_runtime()?.block_on(self.run(initial, cancel))
    }

    async fn drive(
        &self,
        run_id: RunId,
        initial: RunState,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let mut state = initial;
        let mut current = self.routing.entry();
        let mut trace = Vec::new();
        let mut invocation: u32 = 0;

        loop {
            if invocation >= self.config.max_stage_invocations {
                return Err(PipelineError::StageLimitExceeded {
                    limit: self.config.max_stage_invocations,
                    next: current,
                });
            }
            invocation += 1;

            let handler = self
                .registry
                .get(current)
                .ok_or(PipelineError::MissingHandler(current))?;
            let ctx = RunContext {
                run_id,
                invocation,
                cancel: cancel.clone(),
            };

            let started = Instant::now();
            let update = invoke(current, handler.as_ref(), &state, &ctx)
                .instrument(info_span!("stage", stage = %current, invocation))
                .await?;
            debug!(stage = %current, fields = ?update.fields(), "merging stage update");
            state = state.merge(update);

            let next = self.routing.route(current, &state)?;
            let elapsed = started.elapsed();
            info!(
                stage = %current,
                next = %next,
                invocation,
                revision_count = state.revision_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "stage complete"
            );
            trace.push(TraceEntry {
                stage: current,
                elapsed,
                next,
            });

            match next {
                Next::End => break,
                Next::Stage(stage) => current = stage,
            }
        }

        Ok(RunOutcome {
            run_id,
            state,
            trace,
        })
    }
}

async fn invoke(
    stage: Stage,
    handler: &dyn StageHandler,
    state: &RunState,
    ctx: &RunContext,
) -> Result<StateUpdate, PipelineError> {
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(PipelineError::Cancelled(stage)),
        result = handler.run(state, ctx) => result.map_err(|source| match source {
            StageError::Cancelled => PipelineError::Cancelled(stage),
            source => PipelineError::StageFailed { stage, source },
        }),
    }
}

pub(crate) fn blocking_runtime() -> Result<tokio::runtime::Runtime, PipelineError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(PipelineError::Runtime)
}

//! Port traits: the stage contract and the external collaborators stages use.
//!
//! Infrastructure crates implement these; the engine and the stage handlers
//! only ever see the traits. Every trait is object-safe so implementations can
//! be swapped at the composition root (and faked in tests).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    Article, CallError, FeedQuery, ResearchResult, RunId, RunState, SearchHit, StageError,
    StateUpdate, StoreError, Trend,
};

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// Per-invocation context handed to a stage handler.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    /// 1-based count of stage invocations so far in this run, including this one.
    pub invocation: u32,
    /// Fires when the run is cancelled or its deadline passes. Handlers that
    /// sleep or loop should stop early once it is cancelled.
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Context for a standalone invocation outside an executor (tests, tools).
    pub fn detached() -> Self {
        Self {
            run_id: RunId::new_random(),
            invocation: 1,
            cancel: CancellationToken::new(),
        }
    }
}

/// A stage: a transformation from a state snapshot to a partial update.
///
/// Returning `Err` aborts the run. Handlers that hit a degraded dependency
/// should record it in `errors`/`current_step` and return `Ok` instead.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError>;
}

// ---------------------------------------------------------------------------
// Stage collaborators
// ---------------------------------------------------------------------------

/// Fetches trending stories for a region.
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// An empty `Ok` is a valid (if unhelpful) answer.
    async fn fetch_trends(&self, query: &FeedQuery) -> Result<Vec<Trend>, CallError>;
}

/// Picks the stories worth covering.
#[async_trait]
pub trait TrendSelector: Send + Sync {
    /// Returns at most the configured top-N trends, deduplicated, ranked, and
    /// with anything already in `history` filtered out. Never fails; degrades to
    /// an unranked prefix of `trends`.
    async fn select(&self, trends: &[Trend], history: &[String], ctx: &RunContext) -> Vec<Trend>;
}

/// Gathers context for one trend.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Never fails; a result with no snippets signals insufficient research.
    async fn research(&self, trend: &Trend, ctx: &RunContext) -> ResearchResult;
}

/// Writes (or rewrites) an article from research.
#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    /// `None` is the failure sentinel; callers keep alignment by substituting a
    /// placeholder or the previous article.
    async fn generate(
        &self,
        research: &ResearchResult,
        critique: Option<&str>,
        ctx: &RunContext,
    ) -> Option<Article>;
}

/// Fact-checks an article against its research.
#[async_trait]
pub trait ArticleVerifier: Send + Sync {
    /// Returns the article with `hallucination_check`, `claims`, and `critique`
    /// populated. Degrades to `Unsure` when checking is impossible.
    async fn verify(&self, article: Article, research: &ResearchResult, ctx: &RunContext)
        -> Article;
}

/// Scores the finished article set.
#[async_trait]
pub trait ArticleEvaluator: Send + Sync {
    /// Advisory score in 0–10; `0.0` for no articles, `5.0` when scoring fails.
    async fn evaluate(&self, articles: &[Article], ctx: &RunContext) -> f64;
}

// ---------------------------------------------------------------------------
// Infrastructure ports
// ---------------------------------------------------------------------------

/// A generative model that answers prompts with JSON text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Sends `prompt` and returns the raw JSON text of the reply.
    async fn complete_json(&self, prompt: &str) -> Result<String, CallError>;
}

/// A web search service.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, CallError>;
}

/// Fetches a web page and extracts its paragraph text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, CallError>;
}

/// Persisted list of titles covered by earlier runs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Loads the stored titles. A missing or unreadable store loads as empty.
    async fn load(&self) -> Vec<String>;

    /// Appends `titles`, keeping only the most recent
    /// [`HISTORY_CAPACITY`](crate::HISTORY_CAPACITY) entries.
    async fn append(&self, titles: &[String]) -> Result<(), StoreError>;
}

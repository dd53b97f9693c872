//! Core orchestration domain for Newsdesk.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, routing rule, and cross-cutting error type used throughout the news
//! pipeline. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RunId`, `Region`) |
//! | [`types`] | Records flowing between stages (`Trend`, `ResearchResult`, `Article`) |
//! | [`state`] | `RunState`, `StateUpdate`, and the merge policy |
//! | [`routing`] | `Stage`, edges, predicates, and the `RoutingTable` |
//! | [`revision`] | The verify → refine revision counter |
//! | [`retry`] | Outbound-call retry schedule |
//! | [`dedup`] | TF-IDF near-duplicate headline removal |
//! | [`output`] | History capacity rule and the output document |
//! | [`config`] | Configuration document and validation |
//! | [`ports`] | Stage contract and collaborator traits |
//! | [`errors`] | Run, stage, call, store, and config errors |

pub mod config;
pub mod dedup;
pub mod errors;
pub mod identifiers;
pub mod output;
pub mod ports;
pub mod retry;
pub mod revision;
pub mod routing;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{
    DedupMethod, DeduplicationSection, EngineSection, LlmSection, PipelineConfig,
    PipelineSection, RetrySection, ScoringMatrix, SearchSection,
};
pub use dedup::dedupe_trends;
pub use errors::{CallError, ConfigError, PipelineError, Retryability, StageError, StoreError};
pub use identifiers::{Region, RunId};
pub use output::{append_history, PipelineOutput, HISTORY_CAPACITY};
pub use ports::{
    ArticleEvaluator, ArticleGenerator, ArticleVerifier, HistoryStore, LlmProvider, PageFetcher,
    Researcher, RunContext, SearchProvider, StageHandler, TrendSelector, TrendSource,
};
pub use retry::{Backoff, RetryPolicy};
pub use revision::RevisionPolicy;
pub use routing::{
    needs_refinement, research_insufficient, Branch, Edge, Next, Predicate, RoutingError,
    RoutingTable, RoutingTableBuilder, Stage,
};
pub use state::{AlignmentError, RunState, StateUpdate, INITIAL_STEP};
pub use types::{
    Article, Category, ClaimVerification, FeedQuery, HallucinationCheck, ResearchResult,
    SearchHit, Trend,
};

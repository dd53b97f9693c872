//! Newsdesk stage handlers, LLM agents, and the `PipelineExecutor`.
//!
//! This crate provides the seven pipeline stage handlers (Ingest through
//! Evaluate), the LLM-backed agents that implement the selector, researcher,
//! generator, verifier, and evaluator ports, the executor that drives the
//! step-function loop, and the stores for the history list and output document.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between business logic in the
//! [`pipeline`] crate and infrastructure traits (LLM, search, feeds, history).
//! They contain no routing rules of their own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`executor`] | `PipelineExecutor`, `StageRegistry`, run trace |
//! | [`stages`] | One `StageHandler` per stage and the standard registry |
//! | [`agents`] | LLM-backed collaborator implementations |
//! | [`retry`] | Retry loop for outbound calls |
//! | [`store`] | JSON history store and output writer |
//! | [`service`] | `NewsPipeline`: history in, output document out |

pub mod agents;
pub mod executor;
pub mod retry;
pub mod service;
pub mod stages;
pub mod store;

pub use agents::{
    LlmArticleEvaluator, LlmArticleGenerator, LlmArticleVerifier, LlmResearcher,
    LlmTrendSelector, NEUTRAL_SCORE,
};
pub use executor::{ExecutorConfig, PipelineExecutor, RunOutcome, StageRegistry, TraceEntry};
pub use retry::call_with_retry;
pub use service::{NewsPipeline, RunReport};
pub use stages::{standard_registry, Collaborators};
pub use store::{write_output, JsonFileHistoryStore, MemoryHistoryStore};

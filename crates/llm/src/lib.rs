//! Newsdesk LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for Google's Gemini API.
//! Additional providers are added as new modules in this crate without any
//! changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing,
//! and status classification live here. Retrying is the caller's decision,
//! driven by the [`pipeline::Retryability`] carried on every
//! [`pipeline::CallError`].

pub mod gemini;

pub use gemini::GeminiProvider;

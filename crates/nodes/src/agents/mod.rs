//! LLM-backed implementations of the stage collaborator ports.
//!
//! Every agent talks to the model through [`pipeline::LlmProvider`], retries
//! transient failures with the configured [`pipeline::RetryPolicy`], and
//! degrades to the neutral value its port documents when the model cannot be
//! reached or answers with something unparseable.

mod evaluator;
mod generator;
mod researcher;
mod selector;
mod verifier;

pub use evaluator::{LlmArticleEvaluator, NEUTRAL_SCORE};
pub use generator::LlmArticleGenerator;
pub use researcher::LlmResearcher;
pub use selector::LlmTrendSelector;
pub use verifier::LlmArticleVerifier;

use std::sync::Arc;

use pipeline::{CallError, LlmProvider, RetryPolicy, RunContext};
use serde::de::DeserializeOwned;

use crate::retry::call_with_retry;

const REPLY: &str = "llm reply";

/// Sends `prompt` with retries and decodes the JSON reply into `T`.
async fn ask<T: DeserializeOwned>(
    llm: &Arc<dyn LlmProvider>,
    retry: &RetryPolicy,
    operation: &'static str,
    prompt: &str,
    ctx: &RunContext,
) -> Result<T, CallError> {
    let text = call_with_retry(retry, operation, &ctx.cancel, || llm.complete_json(prompt)).await?;
    parse_reply(&text)
}

/// Decodes a model reply, tolerating a surrounding Markdown code fence.
fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, CallError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| CallError::decode(REPLY, e))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// The first `max` characters of `text`, cut on a character boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted [`LlmProvider`] shared by the agent tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pipeline::{CallError, LlmProvider};

    /// Replies with queued answers in order, then with a non-retryable error.
    #[derive(Default)]
    pub struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, CallError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new(replies: Vec<Result<String, CallError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete_json(&self, prompt: &str) -> Result<String, CallError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CallError::NotConfigured { service: "scripted" }))
        }
    }
}

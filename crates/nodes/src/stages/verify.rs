use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    Article, ArticleVerifier, HallucinationCheck, RevisionPolicy, RunContext, RunState,
    StageError, StageHandler, StateUpdate,
};
use tracing::info;

/// Critique recorded for a failed article whose verifier gave no feedback.
pub const GENERIC_CRITIQUE: &str = "General quality failure.";

/// Fact-checks every article and advances the revision counter.
///
/// `critiques` is written index-aligned with `articles`: the verifier's
/// feedback for each `Fail` article and an empty string for every other slot.
/// Placeholder articles are not sent to the verifier; they keep their `Fail`
/// check so refinement regenerates them.
pub struct VerifyStage {
    verifier: Arc<dyn ArticleVerifier>,
    policy: RevisionPolicy,
}

impl VerifyStage {
    pub fn new(verifier: Arc<dyn ArticleVerifier>, policy: RevisionPolicy) -> Self {
        Self { verifier, policy }
    }
}

fn critique_for(article: &Article) -> String {
    if article.hallucination_check != HallucinationCheck::Fail {
        return String::new();
    }
    match article.critique.as_deref() {
        Some(c) if !c.trim().is_empty() => c.to_string(),
        _ => GENERIC_CRITIQUE.to_string(),
    }
}

#[async_trait]
impl StageHandler for VerifyStage {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError> {
        state.check_alignment()?;

        let mut verified = Vec::with_capacity(state.articles.len());
        for (article, research) in state.articles.iter().zip(&state.research_results) {
            if ctx.cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            let checked = if article.is_placeholder() {
                article.clone()
            } else {
                self.verifier.verify(article.clone(), research, ctx).await
            };
            verified.push(checked);
        }

        let critiques: Vec<String> = verified.iter().map(critique_for).collect();
        let revision_count = self.policy.after_verify(state.revision_count, &verified);
        let count = |check: HallucinationCheck| {
            verified
                .iter()
                .filter(|a| a.hallucination_check == check)
                .count()
        };
        info!(
            pass = count(HallucinationCheck::Pass),
            fail = count(HallucinationCheck::Fail),
            unsure = count(HallucinationCheck::Unsure),
            revision_count,
            retry_limit = self.policy.retry_limit(),
            "verification pass complete"
        );

        Ok(StateUpdate::new()
            .articles(verified)
            .critiques(critiques)
            .revision_count(revision_count)
            .current_step("verify"))
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    Article, ArticleGenerator, HallucinationCheck, ResearchResult, RunContext, RunState,
    StageError, StageHandler, StateUpdate,
};
use tracing::{info, warn};

use super::map_in_order;

/// Critique used when neither the critique list nor the article carries one.
pub const FALLBACK_CRITIQUE: &str = "Please improve factuality.";

/// Regenerates every `Fail` article with its critique; other articles pass
/// through untouched. A failed regeneration keeps the previous article.
pub struct RefineStage {
    generator: Arc<dyn ArticleGenerator>,
}

impl RefineStage {
    pub fn new(generator: Arc<dyn ArticleGenerator>) -> Self {
        Self { generator }
    }
}

fn critique_at(state: &RunState, index: usize) -> String {
    let from_list = state
        .critiques
        .get(index)
        .filter(|c| !c.trim().is_empty());
    let from_article = state.articles[index]
        .critique
        .as_ref()
        .filter(|c| !c.trim().is_empty());
    from_list
        .or(from_article)
        .cloned()
        .unwrap_or_else(|| FALLBACK_CRITIQUE.to_string())
}

#[async_trait]
impl StageHandler for RefineStage {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError> {
        state.check_alignment()?;

        let jobs: Vec<(Article, ResearchResult, Option<String>)> = state
            .articles
            .iter()
            .zip(&state.research_results)
            .enumerate()
            .map(|(i, (article, research))| {
                let critique = (article.hallucination_check == HallucinationCheck::Fail)
                    .then(|| critique_at(state, i));
                (article.clone(), research.clone(), critique)
            })
            .collect();
        let rewrites = jobs.iter().filter(|(_, _, c)| c.is_some()).count();

        let generator = self.generator.clone();
        let ctx_for_jobs = ctx.clone();
        let articles = map_in_order(jobs, move |(article, research, critique)| {
            let generator = generator.clone();
            let ctx = ctx_for_jobs.clone();
            async move {
                let Some(critique) = critique else {
                    return article;
                };
                match generator.generate(&research, Some(&critique), &ctx).await {
                    Some(revised) => revised,
                    None => {
                        warn!(title = article.title.as_str(), "refinement failed, keeping previous article");
                        article
                    }
                }
            }
        })
        .await?;

        info!(
            revision = state.revision_count,
            rewrites,
            "refinement pass complete"
        );
        Ok(StateUpdate::new()
            .articles(articles)
            .current_step("refine"))
    }
}

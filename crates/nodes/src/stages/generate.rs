use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    Article, ArticleGenerator, RunContext, RunState, StageError, StageHandler, StateUpdate,
};
use tracing::{info, warn};

use super::map_in_order;

/// Writes one article per research result, concurrently.
///
/// When the generator returns its failure sentinel the slot is filled with
/// [`Article::placeholder`], which keeps `articles` index-aligned with
/// `research_results` and is marked `Fail` so refinement retries it.
pub struct GenerateStage {
    generator: Arc<dyn ArticleGenerator>,
}

impl GenerateStage {
    pub fn new(generator: Arc<dyn ArticleGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl StageHandler for GenerateStage {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError> {
        state.check_research_alignment()?;

        let generator = self.generator.clone();
        let ctx_for_jobs = ctx.clone();
        let drafts = map_in_order(state.research_results.clone(), move |research| {
            let generator = generator.clone();
            let ctx = ctx_for_jobs.clone();
            async move {
                let draft = generator.generate(&research, None, &ctx).await;
                (research, draft)
            }
        })
        .await?;

        let mut placeholders = 0;
        let articles: Vec<Article> = drafts
            .into_iter()
            .map(|(research, draft)| {
                draft.unwrap_or_else(|| {
                    warn!(trend = research.trend_title.as_str(), "using placeholder article");
                    placeholders += 1;
                    Article::placeholder(&research)
                })
            })
            .collect();

        info!(articles = articles.len(), placeholders, "articles generated");
        Ok(StateUpdate::new()
            .articles(articles)
            .current_step("generate"))
    }
}

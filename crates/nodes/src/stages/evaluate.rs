use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{ArticleEvaluator, RunContext, RunState, StageError, StageHandler, StateUpdate};
use tracing::info;

/// Scores the final article set. The score is advisory and never reroutes.
pub struct EvaluateStage {
    evaluator: Arc<dyn ArticleEvaluator>,
}

impl EvaluateStage {
    pub fn new(evaluator: Arc<dyn ArticleEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl StageHandler for EvaluateStage {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError> {
        let score = self.evaluator.evaluate(&state.articles, ctx).await;
        info!(articles = state.articles.len(), score, "evaluation complete");
        Ok(StateUpdate::new()
            .evaluation_score(score)
            .current_step("evaluate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::fakes::FixedScore;
    use pipeline::{Article, Region, ResearchResult, Trend};

    #[tokio::test]
    async fn score_is_written_to_state() {
        let research = ResearchResult::for_trend(&Trend::new("A", "RSS Feed"), vec![], vec![]);
        let state = RunState::new(&Region::global(), vec![])
            .merge(StateUpdate::new().articles(vec![Article::placeholder(&research)]));
        let update = EvaluateStage::new(Arc::new(FixedScore(8.0)))
            .run(&state, &RunContext::detached())
            .await
            .unwrap();
        let merged = state.merge(update);
        assert_eq!(merged.evaluation_score, 8.0);
        assert_eq!(merged.current_step, "evaluate");
    }
}

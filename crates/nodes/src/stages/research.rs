use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Researcher, RunContext, RunState, StageError, StageHandler, StateUpdate};
use tracing::info;

use super::map_in_order;

/// Researches every selected trend concurrently.
///
/// Results are re-assembled in `selected_trends` order, so the i-th result
/// always describes the i-th trend.
pub struct ResearchStage {
    researcher: Arc<dyn Researcher>,
}

impl ResearchStage {
    pub fn new(researcher: Arc<dyn Researcher>) -> Self {
        Self { researcher }
    }
}

#[async_trait]
impl StageHandler for ResearchStage {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError> {
        let researcher = self.researcher.clone();
        let ctx_for_jobs = ctx.clone();
        let results = map_in_order(state.selected_trends.clone(), move |trend| {
            let researcher = researcher.clone();
            let ctx = ctx_for_jobs.clone();
            async move { researcher.research(&trend, &ctx).await }
        })
        .await?;

        let thin = results.iter().filter(|r| r.is_empty()).count();
        info!(trends = results.len(), without_snippets = thin, "research complete");
        Ok(StateUpdate::new()
            .research_results(results)
            .current_step("research"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::fakes::{trends, CannedResearcher};
    use async_trait::async_trait;
    use pipeline::{Region, ResearchResult, Trend};
    use std::time::Duration;

    /// Finishes earlier for later trends, so completion order is reversed.
    struct Staggered;

    #[async_trait]
    impl Researcher for Staggered {
        async fn research(&self, trend: &Trend, _: &RunContext) -> ResearchResult {
            let delay = 40u64.saturating_sub(trend.title.len() as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            ResearchResult::for_trend(trend, vec!["x".into()], vec![])
        }
    }

    #[tokio::test]
    async fn results_stay_aligned_with_selected_trends() {
        let state = RunState::new(&Region::global(), vec![])
            .merge(StateUpdate::new().selected_trends(trends(&["a", "bb", "ccc"])));
        let update = ResearchStage::new(Arc::new(Staggered))
            .run(&state, &RunContext::detached())
            .await
            .unwrap();
        let merged = state.merge(update);
        assert!(merged.check_research_alignment().is_ok());
        assert_eq!(merged.current_step, "research");
    }

    #[tokio::test]
    async fn empty_snippets_are_kept_in_place() {
        let state = RunState::new(&Region::global(), vec![])
            .merge(StateUpdate::new().selected_trends(trends(&["A", "B"])));
        let researcher = CannedResearcher {
            empty: vec!["A".into()],
        };
        let update = ResearchStage::new(Arc::new(researcher))
            .run(&state, &RunContext::detached())
            .await
            .unwrap();
        let merged = state.merge(update);
        assert!(merged.research_results[0].content_snippets.is_empty());
        assert_eq!(merged.research_results[1].content_snippets.len(), 1);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{RunContext, RunState, StageError, StageHandler, StateUpdate, TrendSelector};
use tracing::info;

/// Picks the trends this run will cover.
pub struct SelectStage {
    selector: Arc<dyn TrendSelector>,
}

impl SelectStage {
    pub fn new(selector: Arc<dyn TrendSelector>) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl StageHandler for SelectStage {
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StateUpdate, StageError> {
        let selected = self
            .selector
            .select(&state.raw_trends, &state.history, ctx)
            .await;
        info!(
            candidates = state.raw_trends.len(),
            selected = selected.len(),
            "selected trends"
        );
        Ok(StateUpdate::new()
            .selected_trends(selected)
            .current_step("select"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::fakes::{trends, TopN};
    use pipeline::Region;

    #[tokio::test]
    async fn selection_replaces_previous_choice() {
        let state = RunState::new(&Region::global(), vec![]).merge(
            StateUpdate::new()
                .raw_trends(trends(&["A", "B", "C"]))
                .selected_trends(trends(&["Z"])),
        );
        let update = SelectStage::new(Arc::new(TopN(2)))
            .run(&state, &RunContext::detached())
            .await
            .unwrap();
        let merged = state.merge(update);
        let titles: Vec<&str> = merged.selected_trends.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(merged.current_step, "select");
    }
}

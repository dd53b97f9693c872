use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    dedupe_trends, DedupMethod, DeduplicationSection, LlmProvider, RetryPolicy, RunContext,
    ScoringMatrix, Trend, TrendSelector,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::ask;

/// Source label for picks the model made up rather than chose from the list.
const AGGREGATED: &str = "Aggregated";

/// History titles shown to the model as "recently covered".
const HISTORY_CONTEXT: usize = 20;

#[derive(Debug, Deserialize)]
struct Pick {
    title: String,
    #[serde(default)]
    weighted_score: f64,
}

/// Ranks trends with the model over a weighted scoring matrix.
///
/// Before the model sees anything, near-duplicate headlines are removed and
/// titles already in history are filtered out. If the model fails, the first
/// `top_n` remaining candidates are returned unranked.
pub struct LlmTrendSelector {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    top_n: usize,
    weights: ScoringMatrix,
    dedup: DeduplicationSection,
}

impl LlmTrendSelector {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retry: RetryPolicy,
        top_n: usize,
        weights: ScoringMatrix,
        dedup: DeduplicationSection,
    ) -> Self {
        Self {
            llm,
            retry,
            top_n,
            weights,
            dedup,
        }
    }

    fn candidates(&self, trends: &[Trend], history: &[String]) -> Vec<Trend> {
        let deduped = match self.dedup.method {
            DedupMethod::Tfidf => dedupe_trends(trends.to_vec(), self.dedup.threshold),
            DedupMethod::None => trends.to_vec(),
        };

        let fresh: Vec<Trend> = deduped
            .iter()
            .filter(|t| !history.iter().any(|h| h.eq_ignore_ascii_case(&t.title)))
            .cloned()
            .collect();
        if fresh.is_empty() {
            // Everything was covered before; let the model pick the least stale.
            debug!("every candidate is already in history, keeping all of them");
            deduped
        } else {
            fresh
        }
    }

    fn prompt(&self, candidates: &[Trend], history: &[String]) -> String {
        let recent = &history[history.len().saturating_sub(HISTORY_CONTEXT)..];
        let history_list = recent
            .iter()
            .map(|h| format!("- {h}"))
            .collect::<Vec<_>>()
            .join("\n");
        let trend_list = candidates
            .iter()
            .map(|t| format!("- {} (Source: {})", t.title, t.source))
            .collect::<Vec<_>>()
            .join("\n");
        let count = self.top_n;
        let w = &self.weights;

        format!(
            r#"Analyze the following news trends and select the top {count} unique stories.

History (avoid these recently covered stories):
{history_list}

Current trends:
{trend_list}

Scoring matrix (weighting):
- Geopolitical impact: {geo}
- Economic consequences: {econ}
- Human interest: {human}

Tasks:
1. Filter out stories that are substantially similar to the history.
2. Deduplicate similar stories within the current trends.
3. Rate each unique story from 0 to 10 on every criterion in the scoring matrix.
4. Calculate a weighted score.
5. Return the top {count} stories.

Respond with a JSON list of objects:
[{{"title": "Story title", "weighted_score": 0.0, "justification": "Why this story was chosen"}}]"#,
            geo = w.geopolitical_impact,
            econ = w.economic_consequences,
            human = w.human_interest,
        )
    }

    fn match_picks(&self, picks: Vec<Pick>, candidates: &[Trend]) -> Vec<Trend> {
        picks
            .into_iter()
            .map(|pick| {
                let wanted = pick.title.to_lowercase();
                let matched = candidates.iter().find(|t| {
                    let title = t.title.to_lowercase();
                    wanted.contains(&title) || title.contains(&wanted)
                });
                match matched {
                    Some(trend) => trend.clone().with_score(pick.weighted_score),
                    None => Trend::new(pick.title, AGGREGATED).with_score(pick.weighted_score),
                }
            })
            .take(self.top_n)
            .collect()
    }
}

#[async_trait]
impl TrendSelector for LlmTrendSelector {
    async fn select(&self, trends: &[Trend], history: &[String], ctx: &RunContext) -> Vec<Trend> {
        if trends.is_empty() {
            return Vec::new();
        }

        let candidates = self.candidates(trends, history);
        let prompt = self.prompt(&candidates, history);
        match ask::<Vec<Pick>>(&self.llm, &self.retry, "select", &prompt, ctx).await {
            Ok(picks) => {
                let selected = self.match_picks(picks, &candidates);
                info!(
                    candidates = candidates.len(),
                    selected = selected.len(),
                    "ranked trends"
                );
                selected
            }
            Err(error) => {
                warn!(error = %error, "trend ranking failed, keeping the first candidates");
                candidates.into_iter().take(self.top_n).collect()
            }
        }
    }
}

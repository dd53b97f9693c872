use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Article, ArticleEvaluator, LlmProvider, RetryPolicy, RunContext};
use serde::Deserialize;
use tracing::{info, warn};

use super::{ask, truncate_chars};

/// Score reported when the judge cannot be reached.
pub const NEUTRAL_SCORE: f64 = 5.0;
/// Body characters per article shown to the judge.
const BODY_EXCERPT: usize = 1_000;

#[derive(Debug, Deserialize)]
struct Score {
    #[serde(default)]
    average_score: f64,
}

/// Grades a finished article set with the model acting as judge.
pub struct LlmArticleEvaluator {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl LlmArticleEvaluator {
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }
}

#[async_trait]
impl ArticleEvaluator for LlmArticleEvaluator {
    async fn evaluate(&self, articles: &[Article], ctx: &RunContext) -> f64 {
        if articles.is_empty() {
            return 0.0;
        }

        let combined: String = articles
            .iter()
            .enumerate()
            .map(|(i, a)| {
                format!(
                    "\nARTICLE {}: {}\n{}...\n",
                    i + 1,
                    a.title,
                    truncate_chars(&a.article_body, BODY_EXCERPT)
                )
            })
            .collect();
        let prompt = format!(
            r#"You are a senior journalism professor. Evaluate the following articles on a scale of 1-10 across:
1. Journalistic integrity (objectivity, tone)
2. Factuality (groundedness in sources)
3. Clarity and structure

ARTICLES:
{combined}

Return a single JSON object with the average score:
{{"average_score": 8.5, "justification": "Overall assessment"}}"#
        );

        match ask::<Score>(&self.llm, &self.retry, "evaluate", &prompt, ctx).await {
            Ok(score) => {
                let value = score.average_score.clamp(0.0, 10.0);
                info!(articles = articles.len(), score = value, "articles evaluated");
                value
            }
            Err(error) => {
                warn!(error = %error, "evaluation failed, reporting neutral score");
                NEUTRAL_SCORE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedLlm;
    use pipeline::{ResearchResult, Trend};

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| {
                let research =
                    ResearchResult::for_trend(&Trend::new(format!("T{i}"), "S"), vec![], vec![]);
                let mut a = Article::placeholder(&research);
                a.article_body = "y".repeat(3_000);
                a
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_set_scores_zero_without_calling_the_model() {
        let llm = Arc::new(ScriptedLlm::default());
        let score = LlmArticleEvaluator::new(llm.clone(), RetryPolicy::none())
            .evaluate(&[], &RunContext::detached())
            .await;
        assert_eq!(score, 0.0);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn judge_score_is_returned_and_bodies_are_excerpted() {
        let llm = Arc::new(ScriptedLlm::ok(&[r#"{"average_score": 7.5, "justification": "ok"}"#]));
        let score = LlmArticleEvaluator::new(llm.clone(), RetryPolicy::none())
            .evaluate(&articles(2), &RunContext::detached())
            .await;
        assert_eq!(score, 7.5);
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("ARTICLE 2: T1"));
        assert!(!prompt.contains(&"y".repeat(1_001)));
    }

    #[tokio::test]
    async fn failure_reports_the_neutral_score() {
        let score = LlmArticleEvaluator::new(Arc::new(ScriptedLlm::default()), RetryPolicy::none())
            .evaluate(&articles(1), &RunContext::detached())
            .await;
        assert_eq!(score, NEUTRAL_SCORE);
    }
}

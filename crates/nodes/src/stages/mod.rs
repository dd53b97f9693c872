//! Stage handlers: one [`StageHandler`](pipeline::StageHandler) per pipeline stage.
//!
//! Handlers sequence calls to the collaborator ports and translate their
//! results into a [`StateUpdate`](pipeline::StateUpdate). They never decide
//! routing; the routing table reads the fields they write.

mod evaluate;
mod generate;
mod ingest;
mod refine;
mod research;
mod select;
mod verify;

pub use evaluate::EvaluateStage;
pub use generate::GenerateStage;
pub use ingest::IngestStage;
pub use refine::RefineStage;
pub use research::ResearchStage;
pub use select::SelectStage;
pub use verify::VerifyStage;

use std::future::Future;
use std::sync::Arc;

use pipeline::{
    ArticleEvaluator, ArticleGenerator, ArticleVerifier, PipelineConfig, Researcher, Stage,
    StageError, TrendSelector, TrendSource,
};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::executor::StageRegistry;

/// The collaborators the standard stages are built from.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn TrendSource>,
    pub selector: Arc<dyn TrendSelector>,
    pub researcher: Arc<dyn Researcher>,
    pub generator: Arc<dyn ArticleGenerator>,
    pub verifier: Arc<dyn ArticleVerifier>,
    pub evaluator: Arc<dyn ArticleEvaluator>,
}

/// Registers a handler for every stage of the standard routing table.
pub fn standard_registry(collaborators: &Collaborators, config: &PipelineConfig) -> StageRegistry {
    let c = collaborators;
    StageRegistry::new()
        .register(
            Stage::Ingest,
            IngestStage::new(c.source.clone(), Arc::new(config.clone())),
        )
        .register(Stage::Select, SelectStage::new(c.selector.clone()))
        .register(Stage::Research, ResearchStage::new(c.researcher.clone()))
        .register(Stage::Generate, GenerateStage::new(c.generator.clone()))
        .register(
            Stage::Verify,
            VerifyStage::new(c.verifier.clone(), config.revision_policy()),
        )
        .register(Stage::Refine, RefineStage::new(c.generator.clone()))
        .register(Stage::Evaluate, EvaluateStage::new(c.evaluator.clone()))
}

/// Runs `work` over every item concurrently and returns the outputs in input
/// order, whatever order they complete in.
async fn map_in_order<I, O, F, Fut>(items: Vec<I>, work: F) -> Result<Vec<O>, StageError>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = O> + Send + 'static,
{
    let mut slots: Vec<Option<O>> = Vec::with_capacity(items.len());
    let mut tasks = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        slots.push(None);
        let job = work(item);
        tasks.spawn(async move { (index, job.await) }.in_current_span());
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, output) =
            joined.map_err(|e| StageError::Fault(format!("worker task failed: {e}")))?;
        slots[index] = Some(output);
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| StageError::Fault("worker produced no result".into())))
        .collect()
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-process fakes of every collaborator port, shared by stage tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pipeline::{
        Article, ArticleEvaluator, ArticleGenerator, ArticleVerifier, CallError, FeedQuery,
        HallucinationCheck, ResearchResult, Researcher, RunContext, Trend, TrendSelector,
        TrendSource,
    };

    pub struct FixedSource(pub Result<Vec<Trend>, CallError>);

    #[async_trait]
    impl TrendSource for FixedSource {
        async fn fetch_trends(&self, _query: &FeedQuery) -> Result<Vec<Trend>, CallError> {
            self.0.clone()
        }
    }

    /// Takes the first `n` trends.
    pub struct TopN(pub usize);

    #[async_trait]
    impl TrendSelector for TopN {
        async fn select(&self, trends: &[Trend], _: &[String], _: &RunContext) -> Vec<Trend> {
            trends.iter().take(self.0).cloned().collect()
        }
    }

    /// One snippet per trend, except titles listed in `empty`.
    #[derive(Default)]
    pub struct CannedResearcher {
        pub empty: Vec<String>,
    }

    #[async_trait]
    impl Researcher for CannedResearcher {
        async fn research(&self, trend: &Trend, _: &RunContext) -> ResearchResult {
            let snippets = if self.empty.contains(&trend.title) {
                vec![]
            } else {
                vec![format!("facts about {}", trend.title)]
            };
            ResearchResult::for_trend(trend, snippets, vec![format!("https://{}", trend.title)])
        }
    }

    /// Writes an article per research result; titles in `failing` return the sentinel.
    /// Records the critique each call received.
    #[derive(Default)]
    pub struct EchoGenerator {
        pub failing: Vec<String>,
        pub critiques: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl ArticleGenerator for EchoGenerator {
        async fn generate(
            &self,
            research: &ResearchResult,
            critique: Option<&str>,
            _: &RunContext,
        ) -> Option<Article> {
            self.critiques
                .lock()
                .unwrap()
                .push((research.trend_title.clone(), critique.map(str::to_string)));
            if self.failing.contains(&research.trend_title) {
                return None;
            }
            let mut article = Article::placeholder(research);
            article.article_body = match critique {
                Some(c) => format!("revised: {c}"),
                None => format!("draft about {}", research.trend_title),
            };
            article.hallucination_check = HallucinationCheck::Unsure;
            article.critique = None;
            Some(article)
        }
    }

    /// Returns scripted checks per title, one per call in order; `Pass` once exhausted.
    #[derive(Default)]
    pub struct ScriptedVerifier {
        pub verdicts: Mutex<HashMap<String, Vec<HallucinationCheck>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedVerifier {
        pub fn with(script: &[(&str, &[HallucinationCheck])]) -> Self {
            let verdicts = script
                .iter()
                .map(|(title, checks)| (title.to_string(), checks.to_vec()))
                .collect();
            Self {
                verdicts: Mutex::new(verdicts),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ArticleVerifier for ScriptedVerifier {
        async fn verify(
            &self,
            mut article: Article,
            _: &ResearchResult,
            _: &RunContext,
        ) -> Article {
            self.calls.lock().unwrap().push(article.title.clone());
            let check = {
                let mut verdicts = self.verdicts.lock().unwrap();
                match verdicts.get_mut(&article.title) {
                    Some(queue) if !queue.is_empty() => queue.remove(0),
                    _ => HallucinationCheck::Pass,
                }
            };
            article.hallucination_check = check;
            article.claims = Some(vec![]);
            article.critique = match check {
                HallucinationCheck::Fail => Some(format!("fix {}", article.title)),
                _ => Some(String::new()),
            };
            article
        }
    }

    pub struct FixedScore(pub f64);

    #[async_trait]
    impl ArticleEvaluator for FixedScore {
        async fn evaluate(&self, articles: &[Article], _: &RunContext) -> f64 {
            if articles.is_empty() {
                0.0
            } else {
                self.0
            }
        }
    }

    pub fn trends(titles: &[&str]) -> Vec<Trend> {
        titles.iter().map(|t| Trend::new(*t, "RSS Feed")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn outputs_keep_input_order_when_completion_order_differs() {
        let out = map_in_order(vec![30u64, 0, 15], |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay
        })
        .await
        .unwrap();
        assert_eq!(out, vec![30, 0, 15]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let out: Vec<u8> = map_in_order(Vec::<u8>::new(), |x| async move { x })
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}

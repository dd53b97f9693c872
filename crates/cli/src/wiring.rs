//! Composition root: concrete adapters in, a ready [`NewsPipeline`] out.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use llm::GeminiProvider;
use nodes::{
    Collaborators, JsonFileHistoryStore, LlmArticleEvaluator, LlmArticleGenerator,
    LlmArticleVerifier, LlmResearcher, LlmTrendSelector, NewsPipeline,
};
use pipeline::{ConfigError, LlmProvider, PipelineConfig};
use secrecy::SecretString;
use sources::{FeedIngestion, HttpPageFetcher, NewsApiSource, RssSource, TavilySearch};
use tracing::{info, warn};

/// Timeout for feed and page fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";
pub const NEWS_API_KEY_VAR: &str = "NEWS_API_KEY";
pub const TAVILY_KEY_VAR: &str = "TAVILY_API_KEY";

/// API keys read from the environment. Blank values count as unset.
pub struct Secrets {
    pub gemini: Option<SecretString>,
    pub news_api: Option<SecretString>,
    pub tavily: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secret = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .map(SecretString::from)
        };
        Self {
            gemini: secret(GEMINI_KEY_VAR),
            news_api: secret(NEWS_API_KEY_VAR),
            tavily: secret(TAVILY_KEY_VAR),
        }
    }
}

/// Builds the pipeline with Gemini agents, NewsAPI + RSS ingestion, Tavily
/// research, and a JSON history file at `history_path`.
///
/// A missing Gemini key is a configuration error. Missing NewsAPI or Tavily
/// keys only disable that source.
pub fn build_pipeline(
    config: &PipelineConfig,
    secrets: Secrets,
    history_path: &Path,
) -> anyhow::Result<NewsPipeline> {
    let gemini_key = secrets.gemini.ok_or_else(|| {
        ConfigError::new(GEMINI_KEY_VAR, "must be set in the environment or a .env file")
    })?;
    if secrets.news_api.is_none() {
        warn!("{NEWS_API_KEY_VAR} is not set; ingesting from the RSS feed only");
    }
    if secrets.tavily.is_none() {
        warn!("{TAVILY_KEY_VAR} is not set; research falls back to the trend's own page");
    }

    let llm: Arc<dyn LlmProvider> = Arc::new(
        GeminiProvider::from_config(gemini_key, &config.llm)
            .context("could not create the Gemini client")?,
    );
    let retry = config.retry_policy();
    let search_timeout = Duration::from_secs(config.search.timeout_seconds);

    let ingestion = FeedIngestion::new(
        NewsApiSource::new(secrets.news_api, FETCH_TIMEOUT)?,
        RssSource::new(FETCH_TIMEOUT)?,
    );
    let researcher = LlmResearcher::new(
        Arc::new(TavilySearch::new(secrets.tavily, search_timeout)?),
        Arc::new(HttpPageFetcher::new(FETCH_TIMEOUT)?),
        llm.clone(),
        retry,
        config.search.max_results_per_trend,
        config.search.follow_up_results,
    );

    let collaborators = Collaborators {
        source: Arc::new(ingestion),
        selector: Arc::new(LlmTrendSelector::new(
            llm.clone(),
            retry,
            config.pipeline.top_n_trends,
            config.scoring_matrix.clone(),
            config.deduplication.clone(),
        )),
        researcher: Arc::new(researcher),
        generator: Arc::new(LlmArticleGenerator::new(
            llm.clone(),
            retry,
            config.pipeline.article_word_count.clone(),
        )),
        verifier: Arc::new(LlmArticleVerifier::new(llm.clone(), retry)),
        evaluator: Arc::new(LlmArticleEvaluator::new(llm.clone(), retry)),
    };

    let history = Arc::new(JsonFileHistoryStore::new(history_path));
    let pipeline = NewsPipeline::from_config(config, collaborators, history)?;
    info!(
        model = llm.name(),
        history = %history_path.display(),
        top_n = config.pipeline.top_n_trends,
        retry_limit = config.pipeline.retry_limit,
        "pipeline assembled"
    );
    Ok(pipeline)
}

//! Pipeline configuration.
//!
//! Every section has defaults, so an empty document (or no file at all) is a
//! valid configuration. The binary parses TOML into [`PipelineConfig`] and
//! calls [`PipelineConfig::validate`] before wiring anything.
//!
//! ```toml
//! [pipeline]
//! top_n_trends = 3
//! retry_limit = 2
//!
//! [engine]
//! max_stage_invocations = 64
//! run_timeout_seconds = 900
//!
//! [regions.UK]
//! query = "trending UK news"
//! feed_url = "https://news.google.com/rss?hl=en-GB&gl=GB&ceid=GB:en"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{ConfigError, FeedQuery, Region, RetryPolicy, RevisionPolicy};

const GOOGLE_NEWS_US: &str = "https://news.google.com/rss?hl=en-US&gl=US&ceid=US:en";
const GOOGLE_NEWS_IN: &str = "https://news.google.com/rss?hl=en-IN&gl=IN&ceid=IN:en";

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub scoring_matrix: ScoringMatrix,
    pub search: SearchSection,
    pub deduplication: DeduplicationSection,
    pub engine: EngineSection,
    pub retry: RetrySection,
    pub llm: LlmSection,
    /// Region name → ingestion query. Merged over the built-in regions.
    #[serde(deserialize_with = "merge_over_default_regions")]
    pub regions: BTreeMap<String, FeedQuery>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSection::default(),
            scoring_matrix: ScoringMatrix::default(),
            search: SearchSection::default(),
            deduplication: DeduplicationSection::default(),
            engine: EngineSection::default(),
            retry: RetrySection::default(),
            llm: LlmSection::default(),
            regions: default_regions(),
        }
    }
}

fn default_regions() -> BTreeMap<String, FeedQuery> {
    let entry = |query: &str, feed_url: &str| FeedQuery {
        query: query.to_string(),
        feed_url: feed_url.to_string(),
    };
    BTreeMap::from([
        (
            Region::GLOBAL.to_string(),
            entry("global news trends", GOOGLE_NEWS_US),
        ),
        ("US".to_string(), entry("trending US news", GOOGLE_NEWS_US)),
        (
            "India".to_string(),
            entry("trending India news", GOOGLE_NEWS_IN),
        ),
    ])
}

fn merge_over_default_regions<'de, D>(deserializer: D) -> Result<BTreeMap<String, FeedQuery>, D::Error>
where
    D: Deserializer<'de>,
{
    let custom = BTreeMap::<String, FeedQuery>::deserialize(deserializer)?;
    let mut regions = default_regions();
    regions.extend(custom);
    Ok(regions)
}

impl PipelineConfig {
    /// Checks every value the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.top_n_trends == 0 {
            return Err(ConfigError::new("pipeline.top_n_trends", "must be at least 1"));
        }
        if self.engine.max_stage_invocations == 0 {
            return Err(ConfigError::new(
                "engine.max_stage_invocations",
                "must be at least 1",
            ));
        }
        if self.engine.run_timeout_seconds == Some(0) {
            return Err(ConfigError::new(
                "engine.run_timeout_seconds",
                "must be positive when set",
            ));
        }
        let threshold = self.deduplication.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::new(
                "deduplication.threshold",
                format!("{threshold} is outside (0, 1]"),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::new("retry.max_attempts", "must be at least 1"));
        }
        if self.search.max_results_per_trend == 0 {
            return Err(ConfigError::new(
                "search.max_results_per_trend",
                "must be at least 1",
            ));
        }
        if !self.regions.contains_key(Region::GLOBAL) {
            return Err(ConfigError::new(
                "regions",
                "the Global region must stay defined as the fallback",
            ));
        }
        Ok(())
    }

    /// Ingestion query for `region`, falling back to `Global` for unknown names.
    pub fn feed_for(&self, region: &str) -> FeedQuery {
        self.regions
            .get(region)
            .or_else(|| self.regions.get(Region::GLOBAL))
            .cloned()
            .unwrap_or_else(|| FeedQuery {
                query: "global news trends".to_string(),
                feed_url: GOOGLE_NEWS_US.to_string(),
            })
    }

    pub fn revision_policy(&self) -> RevisionPolicy {
        RevisionPolicy::new(self.pipeline.retry_limit)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }
}

/// `[pipeline]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub top_n_trends: usize,
    pub retry_limit: u32,
    /// Target length handed to the generator, e.g. `"600-800"`.
    pub article_word_count: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            top_n_trends: 3,
            retry_limit: 2,
            article_word_count: "600-800".to_string(),
        }
    }
}

/// `[scoring_matrix]`: weights the selector uses to rank stories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringMatrix {
    pub geopolitical_impact: f64,
    pub economic_consequences: f64,
    pub human_interest: f64,
}

impl Default for ScoringMatrix {
    fn default() -> Self {
        Self {
            geopolitical_impact: 0.4,
            economic_consequences: 0.35,
            human_interest: 0.25,
        }
    }
}

/// `[search]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub max_results_per_trend: usize,
    pub timeout_seconds: u64,
    /// Hits fetched per gap-filling follow-up query.
    pub follow_up_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            max_results_per_trend: 5,
            timeout_seconds: 60,
            follow_up_results: 2,
        }
    }
}

/// Near-duplicate headline removal method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMethod {
    Tfidf,
    None,
}

/// `[deduplication]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationSection {
    pub method: DedupMethod,
    /// Cosine similarity above which a later headline is dropped.
    pub threshold: f64,
}

impl Default for DeduplicationSection {
    fn default() -> Self {
        Self {
            method: DedupMethod::Tfidf,
            threshold: 0.3,
        }
    }
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Ceiling on total stage invocations per run.
    pub max_stage_invocations: u32,
    /// Whole-run deadline. Unset means no deadline.
    pub run_timeout_seconds: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_stage_invocations: 64,
            run_timeout_seconds: None,
        }
    }
}

impl EngineSection {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs)
    }
}

/// `[retry]`: outbound call retry schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

/// `[llm]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_seconds: 120,
        }
    }
}

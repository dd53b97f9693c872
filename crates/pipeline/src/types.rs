//! Shared value types for the Newsdesk pipeline domain.
//!
//! These are the records that flow between stages: trends as ingested,
//! research gathered per trend, and the articles generated from that
//! research. Field names are part of the persisted output format and must
//! not be renamed.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// A trending story as reported by an ingestion source.
///
/// `relevance_score` starts at `0.0` and is overwritten by selection with the
/// weighted score the ranker assigned. No range is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub title: String,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub relevance_score: f64,
}

impl Trend {
    /// Creates a trend with no URL, no timestamp, and a zero score.
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            url: None,
            timestamp: None,
            relevance_score: 0.0,
        }
    }

    /// Sets the article URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the relevance score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.relevance_score = score;
        self
    }
}

/// What an ingestion source should look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    /// Free-text search query (e.g. `"trending US news"`).
    pub query: String,
    /// RSS feed URL to read alongside the search.
    pub feed_url: String,
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// A single web-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub content: String,
}

/// Context gathered for one selected trend.
///
/// Index-aligned with `RunState::selected_trends`: the i-th result always
/// describes the i-th selected trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub trend_title: String,
    pub content_snippets: Vec<String>,
    /// De-duplicated, in first-seen order.
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub trend_score: f64,
}

impl ResearchResult {
    /// Builds a result for `trend`, de-duplicating `urls` and dropping blanks.
    pub fn for_trend(trend: &Trend, content_snippets: Vec<String>, urls: Vec<String>) -> Self {
        let mut source_urls: Vec<String> = Vec::with_capacity(urls.len());
        for url in urls {
            if !url.is_empty() && !source_urls.contains(&url) {
                source_urls.push(url);
            }
        }
        Self {
            trend_title: trend.title.clone(),
            content_snippets,
            source_urls,
            trend_score: trend.relevance_score,
        }
    }

    /// Returns `true` if no snippets were gathered.
    pub fn is_empty(&self) -> bool {
        self.content_snippets.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// Editorial category of a generated article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Technology,
    Finance,
    Politics,
    /// Anything else, including categories a generator invents.
    #[serde(other)]
    Other,
}

/// Outcome of fact-checking an article against its research.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HallucinationCheck {
    /// All major claims are supported.
    Pass,
    /// At least one claim is unsupported; the article should be revised.
    Fail,
    /// Not yet verified, or verification could not complete.
    Unsure,
}

impl HallucinationCheck {
    /// Returns `true` for [`Fail`](Self::Fail) and [`Unsure`](Self::Unsure).
    pub fn needs_attention(self) -> bool {
        !matches!(self, Self::Pass)
    }
}

impl std::fmt::Display for HallucinationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::Unsure => "Unsure",
        };
        f.write_str(s)
    }
}

/// One factual claim extracted from an article and checked against sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerification {
    pub claim: String,
    pub is_verified: bool,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// A generated news article.
///
/// `claims` and `critique` are `None` until verification runs; they serialise
/// as `null` rather than being omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub category: Category,
    pub trend_score: f64,
    pub summary: String,
    pub article_body: String,
    pub sources: Vec<String>,
    pub hallucination_check: HallucinationCheck,
    #[serde(default)]
    pub claims: Option<Vec<ClaimVerification>>,
    #[serde(default)]
    pub critique: Option<String>,
}

impl Article {
    /// Critique attached to placeholder articles.
    pub const PLACEHOLDER_CRITIQUE: &'static str =
        "Article generation failed; write the article from the research context.";

    /// Builds the stand-in used when generation fails for a research slot.
    ///
    /// Placeholders keep the article list aligned with the research list. They
    /// carry a `Fail` check so the refinement stage regenerates them.
    pub fn placeholder(research: &ResearchResult) -> Self {
        Self {
            title: research.trend_title.clone(),
            category: Category::Other,
            trend_score: research.trend_score,
            summary: String::new(),
            article_body: String::new(),
            sources: research.source_urls.iter().take(3).cloned().collect(),
            hallucination_check: HallucinationCheck::Fail,
            claims: None,
            critique: Some(Self::PLACEHOLDER_CRITIQUE.to_string()),
        }
    }

    /// Returns `true` if this article has no body (generation never succeeded).
    pub fn is_placeholder(&self) -> bool {
        self.article_body.trim().is_empty()
    }
}

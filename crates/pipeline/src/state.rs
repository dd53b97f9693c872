//! The per-run state record and the merge policy that updates it.
//!
//! A [`RunState`] is created once per pipeline execution and threaded through
//! every stage as an immutable snapshot. Stages never mutate it; they return a
//! [`StateUpdate`] naming the fields they want replaced, and the executor
//! applies it with [`RunState::merge`]. That merge is the only mutation point.
//!
//! ## Merge semantics
//!
//! Every field present in the update replaces the corresponding field
//! wholesale. Lists are never appended to: a stage that wants to grow
//! `errors` reads the prior value, extends it, and returns the full list.
//! `region` and `history` are inputs and have no counterpart in
//! [`StateUpdate`], so no stage can overwrite them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Article, Region, ResearchResult, Trend};

/// `current_step` value of a freshly constructed state.
pub const INITIAL_STEP: &str = "start";

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Shared state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub region: String,
    pub raw_trends: Vec<Trend>,
    pub selected_trends: Vec<Trend>,
    pub research_results: Vec<ResearchResult>,
    pub articles: Vec<Article>,
    /// Last completed stage, or a diagnostic marker such as `"ingest_fail"`.
    pub current_step: String,
    pub errors: Vec<String>,
    pub revision_count: u32,
    /// Titles covered by prior runs. Read-only for the whole run.
    pub history: Vec<String>,
    pub critiques: Vec<String>,
    pub evaluation_score: f64,
}

impl RunState {
    /// Creates the initial state for a run in `region`.
    pub fn new(region: &Region, history: Vec<String>) -> Self {
        Self {
            region: region.as_str().to_string(),
            raw_trends: Vec::new(),
            selected_trends: Vec::new(),
            research_results: Vec::new(),
            articles: Vec::new(),
            current_step: INITIAL_STEP.to_string(),
            errors: Vec::new(),
            revision_count: 0,
            history,
            critiques: Vec::new(),
            evaluation_score: 0.0,
        }
    }

    /// Applies `update`, replacing every field it carries.
    ///
    /// Idempotent: merging the same update twice yields the same state as
    /// merging it once.
    #[must_use]
    pub fn merge(mut self, update: StateUpdate) -> Self {
        let StateUpdate {
            raw_trends,
            selected_trends,
            research_results,
            articles,
            current_step,
            errors,
            revision_count,
            critiques,
            evaluation_score,
        } = update;

        if let Some(v) = raw_trends {
            self.raw_trends = v;
        }
        if let Some(v) = selected_trends {
            self.selected_trends = v;
        }
        if let Some(v) = research_results {
            self.research_results = v;
        }
        if let Some(v) = articles {
            self.articles = v;
        }
        if let Some(v) = current_step {
            self.current_step = v;
        }
        if let Some(v) = errors {
            self.errors = v;
        }
        if let Some(v) = revision_count {
            self.revision_count = v;
        }
        if let Some(v) = critiques {
            self.critiques = v;
        }
        if let Some(v) = evaluation_score {
            self.evaluation_score = v;
        }
        self
    }

    /// Returns `errors` with `message` appended, for stages recording a soft failure.
    pub fn errors_with(&self, message: impl Into<String>) -> Vec<String> {
        let mut errors = self.errors.clone();
        errors.push(message.into());
        errors
    }

    /// Checks that research results line up with the selected trends.
    pub fn check_research_alignment(&self) -> Result<(), AlignmentError> {
        if self.research_results.len() != self.selected_trends.len() {
            return Err(AlignmentError::Length {
                field: "research_results",
                expected: self.selected_trends.len(),
                actual: self.research_results.len(),
            });
        }
        for (index, (trend, research)) in self
            .selected_trends
            .iter()
            .zip(&self.research_results)
            .enumerate()
        {
            if trend.title != research.trend_title {
                return Err(AlignmentError::Story {
                    index,
                    expected: trend.title.clone(),
                    actual: research.trend_title.clone(),
                });
            }
        }
        Ok(())
    }

    /// Checks that trends, research results, and articles are all the same length
    /// and that research results still follow the trend order.
    pub fn check_alignment(&self) -> Result<(), AlignmentError> {
        self.check_research_alignment()?;
        if self.articles.len() != self.research_results.len() {
            return Err(AlignmentError::Length {
                field: "articles",
                expected: self.research_results.len(),
                actual: self.articles.len(),
            });
        }
        Ok(())
    }
}

/// Violation of the index-alignment invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("{field} has {actual} entries, expected {expected}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("entry {index} covers '{actual}', expected '{expected}'")]
    Story {
        index: usize,
        expected: String,
        actual: String,
    },
}

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// The subset of [`RunState`] fields a stage wants replaced.
///
/// Built with the chained setters:
///
/// ```
/// use pipeline::StateUpdate;
///
/// let update = StateUpdate::new().current_step("select").selected_trends(vec![]);
/// assert_eq!(update.fields(), vec!["selected_trends", "current_step"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    raw_trends: Option<Vec<Trend>>,
    selected_trends: Option<Vec<Trend>>,
    research_results: Option<Vec<ResearchResult>>,
    articles: Option<Vec<Article>>,
    current_step: Option<String>,
    errors: Option<Vec<String>>,
    revision_count: Option<u32>,
    critiques: Option<Vec<String>>,
    evaluation_score: Option<f64>,
}

impl StateUpdate {
    /// Creates an empty update. Merging it leaves the state unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_trends(mut self, v: Vec<Trend>) -> Self {
        self.raw_trends = Some(v);
        self
    }

    pub fn selected_trends(mut self, v: Vec<Trend>) -> Self {
        self.selected_trends = Some(v);
        self
    }

    pub fn research_results(mut self, v: Vec<ResearchResult>) -> Self {
        self.research_results = Some(v);
        self
    }

    pub fn articles(mut self, v: Vec<Article>) -> Self {
        self.articles = Some(v);
        self
    }

    pub fn current_step(mut self, v: impl Into<String>) -> Self {
        self.current_step = Some(v.into());
        self
    }

    pub fn errors(mut self, v: Vec<String>) -> Self {
        self.errors = Some(v);
        self
    }

    pub fn revision_count(mut self, v: u32) -> Self {
        self.revision_count = Some(v);
        self
    }

    pub fn critiques(mut self, v: Vec<String>) -> Self {
        self.critiques = Some(v);
        self
    }

    pub fn evaluation_score(mut self, v: f64) -> Self {
        self.evaluation_score = Some(v);
        self
    }

    /// Names of the fields this update carries, in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        let present = [
            ("raw_trends", self.raw_trends.is_some()),
            ("selected_trends", self.selected_trends.is_some()),
            ("research_results", self.research_results.is_some()),
            ("articles", self.articles.is_some()),
            ("current_step", self.current_step.is_some()),
            ("errors", self.errors.is_some()),
            ("revision_count", self.revision_count.is_some()),
            ("critiques", self.critiques.is_some()),
            ("evaluation_score", self.evaluation_score.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(name, is_set)| is_set.then_some(name))
            .collect()
    }

    /// Returns `true` if the update carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

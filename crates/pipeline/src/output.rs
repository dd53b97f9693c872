//! Shapes of the two persisted artefacts: the history list and the output document.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Article;

/// Maximum number of titles kept in the history store.
pub const HISTORY_CAPACITY: usize = 100;

/// Appends `titles` to `history` and keeps the newest `capacity` entries.
///
/// Oldest entries are dropped first.
pub fn append_history(history: &[String], titles: &[String], capacity: usize) -> Vec<String> {
    let total = history.len() + titles.len();
    let skip = total.saturating_sub(capacity);
    history
        .iter()
        .chain(titles)
        .skip(skip)
        .cloned()
        .collect()
}

/// The document a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// UTC date the run finished, `YYYY-MM-DD`.
    pub date: String,
    /// Wall-clock run time in seconds, rounded to two decimals.
    pub execution_time_seconds: f64,
    pub articles: Vec<Article>,
    pub evaluation_score: f64,
}

impl PipelineOutput {
    pub fn new(
        articles: Vec<Article>,
        evaluation_score: f64,
        elapsed: Duration,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date: finished_at.format("%Y-%m-%d").to_string(),
            execution_time_seconds: round_to_hundredths(elapsed.as_secs_f64()),
            articles,
            evaluation_score,
        }
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

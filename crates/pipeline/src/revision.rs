//! Revision counting for the verify → refine cycle.

use serde::{Deserialize, Serialize};

use crate::{Article, HallucinationCheck};

/// Bounds how many verify → refine cycles a run may take.
///
/// The counter advances by one for each verify pass that produced at least one
/// [`HallucinationCheck::Fail`]. An `Unsure` verdict alone does not advance it,
/// yet still makes the run eligible for refinement. The counter saturates at
/// the limit, so a run can never report more revisions than it was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionPolicy {
    retry_limit: u32,
}

impl RevisionPolicy {
    /// Creates a policy allowing at most `retry_limit` refinement passes.
    pub fn new(retry_limit: u32) -> Self {
        Self { retry_limit }
    }

    /// Returns the configured limit.
    pub fn retry_limit(self) -> u32 {
        self.retry_limit
    }

    /// Counter value after a verify pass over `articles`.
    pub fn after_verify(self, current: u32, articles: &[Article]) -> u32 {
        let has_fail = articles
            .iter()
            .any(|a| a.hallucination_check == HallucinationCheck::Fail);
        if has_fail && current < self.retry_limit {
            current + 1
        } else {
            current
        }
    }

    /// Returns `true` while another refinement pass is permitted.
    pub fn allows_refinement(self, current: u32) -> bool {
        current < self.retry_limit
    }
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

//! Stage names, edges, and the routing table that connects them.
//!
//! The pipeline is an explicit finite-state machine. Each [`Stage`] has
//! exactly one outgoing [`Edge`]: either an unconditional successor or a
//! [`Branch`] whose predicate picks between two fixed successors. The
//! executor asks [`RoutingTable::route`] for the next hop after every merge;
//! nothing in the table calls back into stages.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RevisionPolicy, RunState};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// A named unit of work in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Select,
    Research,
    Generate,
    Verify,
    Refine,
    Evaluate,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::Ingest,
        Stage::Select,
        Stage::Research,
        Stage::Generate,
        Stage::Verify,
        Stage::Refine,
        Stage::Evaluate,
    ];

    /// The stage's name as used in logs and `current_step`.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Select => "select",
            Stage::Research => "research",
            Stage::Generate => "generate",
            Stage::Verify => "verify",
            Stage::Refine => "refine",
            Stage::Evaluate => "evaluate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| RoutingError::UnknownStage(s.to_string()))
    }
}

/// Where execution goes after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Next {
    Stage(Stage),
    /// Terminal marker.
    End,
}

impl std::fmt::Display for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Next::Stage(stage) => std::fmt::Display::fmt(stage, f),
            Next::End => f.write_str("END"),
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// A routing predicate: a pure function of the run state and revision policy.
pub type Predicate = fn(&RunState, RevisionPolicy) -> bool;

/// A conditional edge: `predicate` true routes to `if_true`, otherwise `if_false`.
#[derive(Clone, Copy)]
pub struct Branch {
    /// Name used in logs (e.g. `"research_insufficient"`).
    pub name: &'static str,
    pub predicate: Predicate,
    pub if_true: Next,
    pub if_false: Next,
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("name", &self.name)
            .field("if_true", &self.if_true)
            .field("if_false", &self.if_false)
            .finish()
    }
}

impl Branch {
    fn targets(&self) -> [Next; 2] {
        [self.if_true, self.if_false]
    }
}

/// The single outgoing edge of a stage.
#[derive(Debug, Clone, Copy)]
pub enum Edge {
    Unconditional(Next),
    Conditional(Branch),
}

impl Edge {
    fn targets(&self) -> Vec<Next> {
        match self {
            Edge::Unconditional(next) => vec![*next],
            Edge::Conditional(branch) => branch.targets().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// True when research came back empty or any trend has no snippets.
pub fn research_insufficient(state: &RunState, _policy: RevisionPolicy) -> bool {
    state.research_results.is_empty()
        || state
            .research_results
            .iter()
            .any(|r| r.content_snippets.is_empty())
}

/// True when some article is `Fail` or `Unsure` and another revision is allowed.
pub fn needs_refinement(state: &RunState, policy: RevisionPolicy) -> bool {
    let flagged = state
        .articles
        .iter()
        .any(|a| a.hallucination_check.needs_attention());
    flagged && policy.allows_refinement(state.revision_count)
}

// ---------------------------------------------------------------------------
// RoutingTable
// ---------------------------------------------------------------------------

/// Errors raised while building or consulting a routing table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("stage '{0}' has no outgoing edge")]
    MissingEdge(Stage),

    #[error("stage '{0}' already has an outgoing edge")]
    DuplicateEdge(Stage),
}

/// Fixed map from stage to outgoing edge, plus the entry stage.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    entry: Stage,
    edges: BTreeMap<Stage, Edge>,
    revision: RevisionPolicy,
}

impl RoutingTable {
    /// Starts an empty table entered at `entry`.
    pub fn builder(entry: Stage, revision: RevisionPolicy) -> RoutingTableBuilder {
        RoutingTableBuilder {
            entry,
            edges: BTreeMap::new(),
            revision,
            duplicate: None,
        }
    }

    /// The newsroom pipeline:
    ///
    /// ```text
    /// ingest → select → research ─┬─► generate → verify ─┬─► evaluate → END
    ///            ▲                │                ▲     │
    ///            └────────────────┘                └─ refine ◄┘
    /// ```
    pub fn standard(revision: RevisionPolicy) -> Self {
        let built = Self::builder(Stage::Ingest, revision)
            .edge(Stage::Ingest, Next::Stage(Stage::Select))
            .edge(Stage::Select, Next::Stage(Stage::Research))
            .branch(
                Stage::Research,
                Branch {
                    name: "research_insufficient",
                    predicate: research_insufficient,
                    if_true: Next::Stage(Stage::Select),
                    if_false: Next::Stage(Stage::Generate),
                },
            )
            .edge(Stage::Generate, Next::Stage(Stage::Verify))
            .branch(
                Stage::Verify,
                Branch {
                    name: "needs_refinement",
                    predicate: needs_refinement,
                    if_true: Next::Stage(Stage::Refine),
                    if_false: Next::Stage(Stage::Evaluate),
                },
            )
            .edge(Stage::Refine, Next::Stage(Stage::Verify))
            .edge(Stage::Evaluate, Next::End)
            .build();

        match built {
            Ok(table) => table,
            // The edges above are fixed; build() only fails for malformed tables.
            Err(e) => unreachable!("standard routing table is malformed: {e}"),
        }
    }

    /// Stage execution starts at.
    pub fn entry(&self) -> Stage {
        self.entry
    }

    /// Revision policy handed to predicates.
    pub fn revision(&self) -> RevisionPolicy {
        self.revision
    }

    /// Stages reachable from the entry, in stage order.
    pub fn stages(&self) -> Vec<Stage> {
        self.edges.keys().copied().collect()
    }

    /// Picks the successor of `from` given the merged `state`.
    pub fn route(&self, from: Stage, state: &RunState) -> Result<Next, RoutingError> {
        let edge = self.edges.get(&from).ok_or(RoutingError::MissingEdge(from))?;
        let next = match edge {
            Edge::Unconditional(next) => *next,
            Edge::Conditional(branch) => {
                let taken = (branch.predicate)(state, self.revision);
                tracing::debug!(
                    stage = %from,
                    predicate = branch.name,
                    taken,
                    revision_count = state.revision_count,
                    "evaluated routing predicate"
                );
                if taken {
                    branch.if_true
                } else {
                    branch.if_false
                }
            }
        };
        Ok(next)
    }
}

/// Builder returned by [`RoutingTable::builder`].
#[derive(Debug)]
pub struct RoutingTableBuilder {
    entry: Stage,
    edges: BTreeMap<Stage, Edge>,
    revision: RevisionPolicy,
    duplicate: Option<Stage>,
}

impl RoutingTableBuilder {
    /// Adds an unconditional edge.
    pub fn edge(self, from: Stage, to: Next) -> Self {
        self.insert(from, Edge::Unconditional(to))
    }

    /// Adds a conditional edge.
    pub fn branch(self, from: Stage, branch: Branch) -> Self {
        self.insert(from, Edge::Conditional(branch))
    }

    fn insert(mut self, from: Stage, edge: Edge) -> Self {
        if self.edges.insert(from, edge).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(from);
        }
        self
    }

    /// Validates that every stage reachable from the entry has an outgoing edge.
    pub fn build(self) -> Result<RoutingTable, RoutingError> {
        if let Some(stage) = self.duplicate {
            return Err(RoutingError::DuplicateEdge(stage));
        }

        let mut seen = BTreeSet::new();
        let mut pending = vec![self.entry];
        while let Some(stage) = pending.pop() {
            if !seen.insert(stage) {
                continue;
            }
            let edge = self
                .edges
                .get(&stage)
                .ok_or(RoutingError::MissingEdge(stage))?;
            for target in edge.targets() {
                if let Next::Stage(next) = target {
                    pending.push(next);
                }
            }
        }

        Ok(RoutingTable {
            entry: self.entry,
            edges: self.edges,
            revision: self.revision,
        })
    }
}

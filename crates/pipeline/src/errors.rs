//! Error and retryability types for the Newsdesk pipeline domain.
//!
//! [`PipelineError`] covers conditions that abort a run. [`StageError`] is
//! what a stage handler returns when it cannot produce an update at all.
//! [`CallError`] describes a failed outbound call (LLM, search, feed) and
//! carries a [`Retryability`] so call sites can decide whether to try again
//! before degrading to a neutral default.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AlignmentError, RoutingError, Stage};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable`: timeouts, connection resets, HTTP 429 and 5xx responses.
/// - `NonRetryable`: missing credentials, other 4xx responses, undecodable bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Retryability {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl Retryability {
    /// Returns `true` for [`Retryability::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Outbound call errors
// ---------------------------------------------------------------------------

/// Failure of a single outbound call to an external service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// Credentials or endpoint for the service were not supplied.
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    /// The request did not complete within its timeout.
    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    /// Connection-level failure (DNS, TLS, reset).
    #[error("{service} transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The response body could not be parsed into the expected shape.
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl CallError {
    /// Classifies this error for retry decisions.
    pub fn retryability(&self) -> Retryability {
        match self {
            CallError::Timeout { .. } | CallError::Transport { .. } => {
                Retryability::Retryable { after: None }
            }
            CallError::Status {
                status,
                retry_after,
                ..
            } if *status == 429 || (500..600).contains(status) => Retryability::Retryable {
                after: *retry_after,
            },
            CallError::Status { .. } | CallError::NotConfigured { .. } | CallError::Decode { .. } => {
                Retryability::NonRetryable
            }
        }
    }

    /// Builds a [`CallError::Decode`] from any displayable parse error.
    pub fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        CallError::Decode {
            service,
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Unrecoverable fault raised by a stage handler.
///
/// Returning this aborts the whole run. Degraded-but-usable outcomes are not
/// errors: handlers record them in `errors` and return an update instead.
#[derive(Debug, Error)]
pub enum StageError {
    /// The parallel trend/research/article lists no longer line up.
    #[error("run state is misaligned: {0}")]
    Misaligned(#[from] AlignmentError),

    /// An outbound call failed and the stage has no neutral fallback for it.
    #[error("external call failed: {0}")]
    Call(#[from] CallError),

    /// The handler observed the run's cancellation token.
    #[error("stage cancelled")]
    Cancelled,

    /// Any other fault.
    #[error("{0}")]
    Fault(String),
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

/// Failure to read or write a persisted artefact.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode '{path}': {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// A configuration value failed validation.
///
/// Produced at load time; the pipeline never starts with an invalid config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration value for '{field}': {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a pipeline run.
///
/// A run that ends with one of these produces no output document and leaves
/// the history store untouched. Store failures are not listed here: history
/// is written after a run has already succeeded.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage handler raised a fault.
    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: StageError,
    },

    /// The routing table names a stage with no registered handler.
    #[error("no handler registered for stage '{0}'")]
    MissingHandler(Stage),

    /// The routing table could not produce a successor.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The run hit the configured ceiling on total stage invocations.
    #[error("stage invocation limit of {limit} reached before '{next}' could run")]
    StageLimitExceeded { limit: u32, next: Stage },

    /// The run did not finish before its deadline.
    #[error("run exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The run's cancellation token fired.
    #[error("run cancelled during stage '{0}'")]
    Cancelled(Stage),

    /// The pipeline configuration is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A blocking run could not build its private runtime.
    #[error("could not start a runtime for a blocking run: {0}")]
    Runtime(#[source] std::io::Error),
}

//! Run lifecycle types: remote run status, local polling state, terminal outcome.

use crate::{RunError, Usage};
use serde::{Deserialize, Serialize};

/// Status of a remote run as reported by the job API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Remote-terminal statuses end the poll loop of an attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a submitted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub thread_id: String,
    pub run_id: String,
}

/// One read of a run's state.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub status: RunStatus,
    /// Remote error message, set when the run failed or expired.
    pub last_error: Option<String>,
    pub usage: Option<Usage>,
}

impl RunSnapshot {
    pub fn with_status(status: RunStatus) -> Self {
        Self {
            status,
            last_error: None,
            usage: None,
        }
    }
}

/// Local polling state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Created,
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

/// Why a request ended without a usable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ThreadNotFound,
    ThreadLookup,
    MaxRetriesExceeded,
    EmptyResult,
    ResultUnavailable,
    Internal,
}

/// Terminal judgment about one job request. Exactly one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { text: String, usage: Option<Usage> },
    Failure { reason: FailureReason, detail: String },
}

impl Outcome {
    pub fn failure(reason: FailureReason, detail: impl Into<String>) -> Self {
        Outcome::Failure {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl From<&RunError> for Outcome {
    fn from(err: &RunError) -> Self {
        let reason = match err {
            RunError::ThreadNotFound(_) => FailureReason::ThreadNotFound,
            RunError::ThreadLookup(_) => FailureReason::ThreadLookup,
            RunError::EmptyResult => FailureReason::EmptyResult,
            RunError::ResultUnavailable(_) => FailureReason::ResultUnavailable,
            RunError::Submission(_)
            | RunError::PollTimeout { .. }
            | RunError::RemoteRunFailed { .. }
            | RunError::MaxRetriesExceeded { .. } => FailureReason::MaxRetriesExceeded,
        };
        Outcome::failure(reason, err.to_string())
    }
}

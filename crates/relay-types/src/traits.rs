//! Collaborator traits (job API, callback transport) and the error taxonomy.

use crate::{CallbackPayload, RunHandle, RunSnapshot, RunStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Remote job API: thread lookup, run submission, status reads, result fetch.
///
/// Nothing here is idempotent: every `submit` may create a new run.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Returns `Ok(false)` when the thread does not exist.
    async fn thread_exists(&self, thread_id: &str) -> Result<bool, JobClientError>;

    /// Start a run of `assistant_id` on the thread with `message` as the new user turn.
    async fn submit(
        &self,
        thread_id: &str,
        assistant_id: &str,
        message: &str,
    ) -> Result<RunHandle, JobClientError>;

    /// Single status read; never waits for the run.
    async fn poll(&self, run: &RunHandle) -> Result<RunSnapshot, JobClientError>;

    /// Text produced by a completed run. `Ok(None)` when the run left no message.
    async fn fetch_result(&self, run: &RunHandle) -> Result<Option<String>, JobClientError>;
}

/// Builds a job client bound to one credential.
pub trait JobClientFactory: Send + Sync {
    fn client(&self, credential: &str) -> Arc<dyn JobClient>;
}

/// Transport for callback payloads.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    /// One delivery attempt. Any `Err` counts as a transport failure.
    async fn send(
        &self,
        url: &str,
        credential: &str,
        payload: &CallbackPayload,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobClientError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Other(String),
}

/// Failure kinds of one request between acceptance and delivery.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("No thread found with id {0}")]
    ThreadNotFound(String),
    #[error("thread lookup failed: {0}")]
    ThreadLookup(String),
    #[error("{0}")]
    Submission(String),
    #[error("run {run_id} did not finish within {}s", .waited.as_secs_f64())]
    PollTimeout { run_id: String, waited: Duration },
    #[error("{message}")]
    RemoteRunFailed {
        run_id: String,
        status: RunStatus,
        message: String,
    },
    #[error("No valid response from GPT")]
    EmptyResult,
    #[error("could not fetch run result: {0}")]
    ResultUnavailable(String),
    /// Displays as the last underlying error.
    #[error("{last}")]
    MaxRetriesExceeded { attempts: u32, last: Box<RunError> },
}

impl RunError {
    /// Errors that may be resolved by starting a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunError::Submission(_) | RunError::PollTimeout { .. } | RunError::RemoteRunFailed { .. }
        )
    }

    /// Innermost error, looking through `MaxRetriesExceeded`.
    pub fn root(&self) -> &RunError {
        match self {
            RunError::MaxRetriesExceeded { last, .. } => last.root(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("callback transport error: {0}")]
    Transport(String),
    #[error("callback timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },
    #[error("callback endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

//! Polling state machine: `Created -> Submitted -> Polling -> {Completed, Failed, TimedOut}`.
//!
//! One engine per request. Attempts (submit, then poll until the run is
//! remote-terminal or the attempt ceiling passes) run strictly one after the
//! other, with a fixed backoff between them.

use crate::{PollerConfig, TimeoutPolicy};
use relay_types::{JobClient, PollState, RunError, RunHandle, RunStatus, Usage};
use std::sync::Arc;
use tokio::time::{sleep, Instant};

/// Terminal result of the polling engine.
#[derive(Debug, Clone)]
pub enum PollTerminal {
    Completed {
        run: RunHandle,
        usage: Option<Usage>,
    },
    Failed(RunError),
    TimedOut(RunError),
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Fail,
    TimeOut,
}

/// Retry decision for the failure of attempt number `attempt` (1-based).
pub fn decide(
    attempt: u32,
    max_attempts: u32,
    err: &RunError,
    policy: TimeoutPolicy,
) -> RetryDecision {
    if !err.is_retryable() {
        return RetryDecision::Fail;
    }
    let timed_out = matches!(err, RunError::PollTimeout { .. });
    if timed_out && policy == TimeoutPolicy::Terminate {
        return RetryDecision::TimeOut;
    }
    if attempt < max_attempts {
        RetryDecision::Retry
    } else if timed_out {
        RetryDecision::TimeOut
    } else {
        RetryDecision::Fail
    }
}

pub struct PollingEngine {
    client: Arc<dyn JobClient>,
    config: PollerConfig,
    state: PollState,
    attempts: u32,
}

impl PollingEngine {
    pub fn new(client: Arc<dyn JobClient>, config: PollerConfig) -> Self {
        Self {
            client,
            config,
            state: PollState::Created,
            attempts: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn transition(&mut self, next: PollState) {
        tracing::debug!(from = ?self.state, to = ?next, attempt = self.attempts, "poll state");
        self.state = next;
    }

    /// Validate the thread, then submit and poll until a terminal outcome.
    pub async fn run(&mut self, thread_id: &str, assistant_id: &str, message: &str) -> PollTerminal {
        match self.client.thread_exists(thread_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(thread_id, "thread not found");
                self.transition(PollState::Failed);
                return PollTerminal::Failed(RunError::ThreadNotFound(thread_id.to_string()));
            }
            Err(e) => {
                tracing::error!(thread_id, error = %e, "thread lookup failed");
                self.transition(PollState::Failed);
                return PollTerminal::Failed(RunError::ThreadLookup(e.to_string()));
            }
        }

        let max_attempts = self.config.max_attempts.max(1);
        loop {
            self.attempts += 1;
            let attempt = self.attempts;
            let err = match self.attempt(thread_id, assistant_id, message).await {
                Ok((run, usage)) => {
                    tracing::info!(thread_id, run_id = %run.run_id, attempt, "run completed");
                    self.transition(PollState::Completed);
                    return PollTerminal::Completed { run, usage };
                }
                Err(e) => e,
            };

            let decision = decide(attempt, max_attempts, &err, self.config.timeout_policy);
            let err = if attempt >= max_attempts {
                RunError::MaxRetriesExceeded {
                    attempts: attempt,
                    last: Box::new(err),
                }
            } else {
                err
            };
            match decision {
                RetryDecision::Retry => {
                    tracing::warn!(
                        thread_id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    sleep(self.config.retry_backoff).await;
                }
                RetryDecision::Fail => {
                    tracing::error!(thread_id, attempt, error = %err, "giving up");
                    self.transition(PollState::Failed);
                    return PollTerminal::Failed(err);
                }
                RetryDecision::TimeOut => {
                    tracing::error!(thread_id, attempt, error = %err, "timed out");
                    self.transition(PollState::TimedOut);
                    return PollTerminal::TimedOut(err);
                }
            }
        }
    }

    /// One submit-then-poll cycle. Never re-submits.
    async fn attempt(
        &mut self,
        thread_id: &str,
        assistant_id: &str,
        message: &str,
    ) -> Result<(RunHandle, Option<Usage>), RunError> {
        let started = Instant::now();
        let run = self
            .client
            .submit(thread_id, assistant_id, message)
            .await
            .map_err(|e| RunError::Submission(e.to_string()))?;
        self.transition(PollState::Submitted);
        tracing::info!(thread_id, run_id = %run.run_id, attempt = self.attempts, "run submitted");

        self.transition(PollState::Polling);
        loop {
            match self.client.poll(&run).await {
                Ok(snap) if snap.status == RunStatus::Completed => {
                    return Ok((run, snap.usage));
                }
                Ok(snap) if snap.status.is_terminal() => {
                    let message = snap.last_error.unwrap_or_else(|| {
                        format!("run {} ended with status {}", run.run_id, snap.status)
                    });
                    return Err(RunError::RemoteRunFailed {
                        run_id: run.run_id,
                        status: snap.status,
                        message,
                    });
                }
                Ok(snap) => {
                    tracing::trace!(run_id = %run.run_id, status = %snap.status, "run pending");
                }
                Err(e) => {
                    tracing::warn!(run_id = %run.run_id, error = %e, "poll failed");
                }
            }
            if started.elapsed() >= self.config.attempt_timeout {
                return Err(RunError::PollTimeout {
                    run_id: run.run_id,
                    waited: self.config.attempt_timeout,
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_openai::MockJobClient;
    use relay_types::{JobClientError, RunSnapshot};
    use std::time::Duration;

    fn fast_config() -> PollerConfig {
        PollerConfig {
            max_attempts: 3,
            poll_interval: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(50),
            retry_backoff: Duration::from_millis(1),
            timeout_policy: TimeoutPolicy::Retry,
        }
    }

    fn remote_failure(message: &str) -> Result<RunSnapshot, JobClientError> {
        Ok(RunSnapshot {
            status: RunStatus::Failed,
            last_error: Some(message.to_string()),
            usage: None,
        })
    }

    fn timeout() -> RunError {
        RunError::PollTimeout {
            run_id: "run_1".to_string(),
            waited: Duration::from_secs(60),
        }
    }

    #[test]
    fn decide_is_pure_in_attempt_and_kind() {
        let p = TimeoutPolicy::Retry;
        let sub = RunError::Submission("boom".to_string());
        assert_eq!(decide(1, 3, &sub, p), RetryDecision::Retry);
        assert_eq!(decide(2, 3, &sub, p), RetryDecision::Retry);
        assert_eq!(decide(3, 3, &sub, p), RetryDecision::Fail);
        assert_eq!(decide(1, 3, &timeout(), p), RetryDecision::Retry);
        assert_eq!(decide(3, 3, &timeout(), p), RetryDecision::TimeOut);
        assert_eq!(
            decide(1, 3, &RunError::ThreadNotFound("t".to_string()), p),
            RetryDecision::Fail
        );
        assert_eq!(decide(1, 3, &RunError::EmptyResult, p), RetryDecision::Fail);
    }

    #[test]
    fn terminate_policy_ends_on_first_timeout() {
        let p = TimeoutPolicy::Terminate;
        assert_eq!(decide(1, 3, &timeout(), p), RetryDecision::TimeOut);
        let sub = RunError::Submission("boom".to_string());
        assert_eq!(decide(1, 3, &sub, p), RetryDecision::Retry);
    }

    #[tokio::test]
    async fn completes_on_first_attempt() {
        let mock = Arc::new(MockJobClient::new().polls([
            Ok(RunSnapshot::with_status(RunStatus::Queued)),
            Ok(RunSnapshot::with_status(RunStatus::InProgress)),
        ]));
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Completed { run, .. } => assert_eq!(run.run_id, "run_1"),
            other => panic!("expected completed, got {:?}", other),
        }
        assert_eq!(engine.state(), PollState::Completed);
        assert_eq!(engine.attempts(), 1);
        assert_eq!(mock.submit_calls(), 1);
        assert_eq!(mock.poll_calls(), 3);
    }

    #[tokio::test]
    async fn missing_thread_makes_no_submission() {
        let mock = Arc::new(MockJobClient::new().missing_thread());
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        match engine.run("thread_gone", "asst_1", "hi").await {
            PollTerminal::Failed(RunError::ThreadNotFound(id)) => assert_eq!(id, "thread_gone"),
            other => panic!("expected thread not found, got {:?}", other),
        }
        assert_eq!(engine.state(), PollState::Failed);
        assert_eq!(engine.attempts(), 0);
        assert_eq!(mock.submit_calls(), 0);
    }

    #[tokio::test]
    async fn lookup_error_is_not_retried() {
        let mock = Arc::new(MockJobClient::new().lookup_error("connection reset"));
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Failed(RunError::ThreadLookup(msg)) => {
                assert!(msg.contains("connection reset"))
            }
            other => panic!("expected lookup failure, got {:?}", other),
        }
        assert_eq!(mock.lookup_calls(), 1);
        assert_eq!(mock.submit_calls(), 0);
    }

    #[tokio::test]
    async fn submission_errors_exhaust_budget() {
        let mock = Arc::new(MockJobClient::new().submit_failures(["boom 1", "boom 2", "boom 3"]));
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Failed(err @ RunError::MaxRetriesExceeded { attempts: 3, .. }) => {
                assert_eq!(err.to_string(), "boom 3");
                assert!(matches!(err.root(), RunError::Submission(_)));
            }
            other => panic!("expected max retries, got {:?}", other),
        }
        assert_eq!(mock.submit_calls(), 3);
        assert_eq!(mock.poll_calls(), 0);
        assert_eq!(engine.state(), PollState::Failed);
    }

    #[tokio::test]
    async fn remote_failures_are_retried_until_budget() {
        let mock = Arc::new(MockJobClient::new().polls([
            remote_failure("rate limited"),
            remote_failure("server error"),
            remote_failure("final failure"),
        ]));
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Failed(err) => assert_eq!(err.to_string(), "final failure"),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(mock.submit_calls(), 3);
    }

    #[tokio::test]
    async fn expired_without_message_names_the_run() {
        let cfg = PollerConfig {
            max_attempts: 1,
            ..fast_config()
        };
        let mock = Arc::new(
            MockJobClient::new().polls([Ok(RunSnapshot::with_status(RunStatus::Expired))]),
        );
        let mut engine = PollingEngine::new(mock, cfg);
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Failed(err) => {
                assert_eq!(err.to_string(), "run run_1 ended with status expired")
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn recovers_after_a_failed_attempt() {
        let mock = Arc::new(MockJobClient::new().submit_failures(["boom"]));
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Completed { run, .. } => assert_eq!(run.run_id, "run_2"),
            other => panic!("expected completed, got {:?}", other),
        }
        assert_eq!(engine.attempts(), 2);
    }

    #[tokio::test]
    async fn poll_errors_do_not_resubmit() {
        let mock = Arc::new(MockJobClient::new().polls([
            Err(JobClientError::Http("connection reset".to_string())),
            Err(JobClientError::Http("connection reset".to_string())),
        ]));
        let mut engine = PollingEngine::new(mock.clone(), fast_config());
        assert!(matches!(
            engine.run("thread_1", "asst_1", "hi").await,
            PollTerminal::Completed { .. }
        ));
        assert_eq!(mock.submit_calls(), 1);
        assert_eq!(mock.poll_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_attempt_then_times_out() {
        let cfg = PollerConfig::default();
        let mock = Arc::new(MockJobClient::new().idle_status(RunStatus::InProgress));
        let mut engine = PollingEngine::new(mock.clone(), cfg.clone());
        let started = Instant::now();
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::TimedOut(err @ RunError::MaxRetriesExceeded { attempts: 3, .. }) => {
                assert!(matches!(err.root(), RunError::PollTimeout { .. }));
                assert_eq!(err.to_string(), "run run_3 did not finish within 60s");
            }
            other => panic!("expected timed out, got {:?}", other),
        }
        assert_eq!(engine.state(), PollState::TimedOut);
        assert_eq!(mock.submit_calls(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= cfg.attempt_timeout * 3 + cfg.retry_backoff * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_success_on_next_attempt() {
        let cfg = PollerConfig {
            attempt_timeout: Duration::from_secs(5),
            ..PollerConfig::default()
        };
        // 5s ceiling at 1s interval: polls at t=0..=5 of attempt one stay pending.
        let pending = (0..6).map(|_| Ok(RunSnapshot::with_status(RunStatus::InProgress)));
        let mock = Arc::new(MockJobClient::new().polls(pending));
        let mut engine = PollingEngine::new(mock.clone(), cfg);
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::Completed { run, .. } => assert_eq!(run.run_id, "run_2"),
            other => panic!("expected completed, got {:?}", other),
        }
        assert_eq!(mock.submit_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_policy_stops_after_one_timeout() {
        let cfg = PollerConfig {
            timeout_policy: TimeoutPolicy::Terminate,
            attempt_timeout: Duration::from_secs(5),
            ..PollerConfig::default()
        };
        let mock = Arc::new(MockJobClient::new().idle_status(RunStatus::Queued));
        let mut engine = PollingEngine::new(mock.clone(), cfg);
        match engine.run("thread_1", "asst_1", "hi").await {
            PollTerminal::TimedOut(RunError::PollTimeout { run_id, .. }) => {
                assert_eq!(run_id, "run_1")
            }
            other => panic!("expected poll timeout, got {:?}", other),
        }
        assert_eq!(mock.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_separates_attempts() {
        let cfg = PollerConfig {
            retry_backoff: Duration::from_secs(2),
            ..PollerConfig::default()
        };
        let mock = Arc::new(MockJobClient::new().submit_failures(["a", "b", "c"]));
        let mut engine = PollingEngine::new(mock.clone(), cfg);
        let started = Instant::now();
        let _ = engine.run("thread_1", "asst_1", "hi").await;
        assert_eq!(mock.submit_calls(), 3);
        // two gaps between three attempts, no sleep after the last one
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(6));
    }
}

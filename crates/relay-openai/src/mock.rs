//! Scripted job client for tests: no network, call counters.

use async_trait::async_trait;
use relay_types::{
    JobClient, JobClientError, JobClientFactory, RunHandle, RunSnapshot, RunStatus,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock job client. By default the thread exists, every submit succeeds, every
/// poll reports `completed` and the result is `"Hello"`.
pub struct MockJobClient {
    thread: Mutex<Result<bool, JobClientError>>,
    submit_failures: Mutex<VecDeque<String>>,
    polls: Mutex<VecDeque<Result<RunSnapshot, JobClientError>>>,
    idle_poll: Mutex<RunSnapshot>,
    result: Mutex<Result<Option<String>, JobClientError>>,
    lookup_calls: AtomicU32,
    submit_calls: AtomicU32,
    poll_calls: AtomicU32,
    fetch_calls: AtomicU32,
}

impl MockJobClient {
    pub fn new() -> Self {
        Self {
            thread: Mutex::new(Ok(true)),
            submit_failures: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            idle_poll: Mutex::new(RunSnapshot::with_status(RunStatus::Completed)),
            result: Mutex::new(Ok(Some("Hello".to_string()))),
            lookup_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            poll_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
        }
    }

    /// Thread lookup reports the thread as absent.
    pub fn missing_thread(self) -> Self {
        *lock(&self.thread) = Ok(false);
        self
    }

    /// Thread lookup fails at the transport level.
    pub fn lookup_error(self, message: &str) -> Self {
        *lock(&self.thread) = Err(JobClientError::Http(message.to_string()));
        self
    }

    /// The next submits fail with these messages, in order.
    pub fn submit_failures<I, S>(self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.submit_failures).extend(messages.into_iter().map(Into::into));
        self
    }

    /// Poll responses consumed in order across all runs.
    pub fn polls<I>(self, polls: I) -> Self
    where
        I: IntoIterator<Item = Result<RunSnapshot, JobClientError>>,
    {
        lock(&self.polls).extend(polls);
        self
    }

    /// Status reported once the scripted polls are used up.
    pub fn idle_status(self, status: RunStatus) -> Self {
        *lock(&self.idle_poll) = RunSnapshot::with_status(status);
        self
    }

    pub fn result(self, text: Option<&str>) -> Self {
        *lock(&self.result) = Ok(text.map(String::from));
        self
    }

    pub fn result_error(self, message: &str) -> Self {
        *lock(&self.result) = Err(JobClientError::Http(message.to_string()));
        self
    }

    pub fn lookup_calls(&self) -> u32 {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockJobClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobClient for MockJobClient {
    async fn thread_exists(&self, _thread_id: &str) -> Result<bool, JobClientError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.thread).clone()
    }

    async fn submit(
        &self,
        thread_id: &str,
        _assistant_id: &str,
        _message: &str,
    ) -> Result<RunHandle, JobClientError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = lock(&self.submit_failures).pop_front() {
            return Err(JobClientError::Other(message));
        }
        Ok(RunHandle {
            thread_id: thread_id.to_string(),
            run_id: format!("run_{}", n),
        })
    }

    async fn poll(&self, _run: &RunHandle) -> Result<RunSnapshot, JobClientError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = lock(&self.polls).pop_front() {
            return next;
        }
        Ok(lock(&self.idle_poll).clone())
    }

    async fn fetch_result(&self, _run: &RunHandle) -> Result<Option<String>, JobClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.result).clone()
    }
}

/// Hands out one shared [`MockJobClient`] and records the credentials asked for.
pub struct MockClientFactory {
    client: Arc<MockJobClient>,
    credentials: Mutex<Vec<String>>,
}

impl MockClientFactory {
    pub fn new(client: Arc<MockJobClient>) -> Self {
        Self {
            client,
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn credentials(&self) -> Vec<String> {
        lock(&self.credentials).clone()
    }
}

impl JobClientFactory for MockClientFactory {
    fn client(&self, credential: &str) -> Arc<dyn JobClient> {
        lock(&self.credentials).push(credential.to_string());
        self.client.clone()
    }
}

//! In-memory callback sender for tests: records every send, fails on demand.

use async_trait::async_trait;
use relay_types::{CallbackPayload, CallbackSender, DeliveryError};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub url: String,
    pub credential: String,
    pub payload: CallbackPayload,
}

#[derive(Default)]
pub struct RecordingSender {
    failures: Mutex<VecDeque<DeliveryError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next sends fail with these errors, in order. Every send is recorded.
    pub fn fail_next<I: IntoIterator<Item = DeliveryError>>(self, errors: I) -> Self {
        lock(&self.failures).extend(errors);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl CallbackSender for RecordingSender {
    async fn send(
        &self,
        url: &str,
        credential: &str,
        payload: &CallbackPayload,
    ) -> Result<(), DeliveryError> {
        lock(&self.calls).push(RecordedCall {
            url: url.to_string(),
            credential: credential.to_string(),
            payload: payload.clone(),
        });
        match lock(&self.failures).pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

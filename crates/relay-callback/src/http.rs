//! reqwest-backed callback sender.

use async_trait::async_trait;
use relay_types::{CallbackPayload, CallbackSender, DeliveryError};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts payloads as JSON with bearer authorization.
#[derive(Debug, Clone)]
pub struct HttpCallbackSender {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpCallbackSender {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for HttpCallbackSender {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn send(
        &self,
        url: &str,
        credential: &str,
        payload: &CallbackPayload,
    ) -> Result<(), DeliveryError> {
        let res = self
            .client
            .post(url)
            .bearer_auth(credential)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout {
                        after: self.timeout,
                    }
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

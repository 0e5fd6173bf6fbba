//! Primary delivery plus a single fallback carrying the transport failure.

use relay_types::{CallbackPayload, CallbackSender, CallbackTarget, DeliveryError};
use std::sync::Arc;

/// How delivery of one payload ended.
#[derive(Debug, Clone)]
pub enum DeliveryReport {
    Delivered,
    /// Primary failed, the error fallback got through.
    DeliveredFallback { primary: DeliveryError },
    /// Both sends failed; nothing more is attempted.
    Failed {
        primary: DeliveryError,
        fallback: DeliveryError,
    },
}

impl DeliveryReport {
    /// Number of sends made.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryReport::Delivered => 1,
            _ => 2,
        }
    }
}

pub struct CallbackDispatcher {
    sender: Arc<dyn CallbackSender>,
}

impl CallbackDispatcher {
    pub fn new(sender: Arc<dyn CallbackSender>) -> Self {
        Self { sender }
    }

    /// Deliver `payload` to `target`. Never fails: if the primary send fails,
    /// one error payload describing that failure is sent to the same target and
    /// a second failure is only logged.
    pub async fn deliver(&self, target: &CallbackTarget, payload: &CallbackPayload) -> DeliveryReport {
        let primary = match self
            .sender
            .send(&target.url, &target.credential, payload)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    url = %target.url,
                    client_id = %payload.client_id,
                    status = ?payload.open_ai_status,
                    "callback delivered"
                );
                return DeliveryReport::Delivered;
            }
            Err(e) => e,
        };

        tracing::warn!(url = %target.url, error = %primary, "callback failed, sending error fallback");
        let fallback_payload = payload.fallback(primary.to_string());
        match self
            .sender
            .send(&target.url, &target.credential, &fallback_payload)
            .await
        {
            Ok(()) => {
                tracing::info!(url = %target.url, "fallback callback delivered");
                DeliveryReport::DeliveredFallback { primary }
            }
            Err(fallback) => {
                tracing::error!(
                    url = %target.url,
                    primary = %primary,
                    fallback = %fallback,
                    "fallback callback failed, giving up"
                );
                DeliveryReport::Failed { primary, fallback }
            }
        }
    }
}

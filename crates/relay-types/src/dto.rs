//! Inbound request and outbound callback DTOs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inbound chat request as posted by the front-end caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub thread_id: String,
    pub asst_id: String,
    /// Credential for the remote job API.
    pub gpt_token: String,
    /// Credential presented to the callback endpoint.
    pub sale_token: String,
    pub client_id: String,
    pub message: String,
    /// Opaque text echoed back in the callback `message` field; defaults to `message`.
    #[serde(default)]
    pub callback_message: Option<String>,
    /// Overrides the configured callback target for this request.
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// Immediate acknowledgment returned by `/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 acceptance time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatResponse {
    pub fn accepted(request_id: impl Into<String>, accepted_at: impl Into<String>) -> Self {
        Self {
            status: "accepted".to_string(),
            request_id: Some(request_id.into()),
            accepted_at: Some(accepted_at.into()),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            request_id: None,
            accepted_at: None,
            message: Some(message.into()),
        }
    }
}

/// Where and with which credential the outcome of a request is posted.
#[derive(Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub url: String,
    pub credential: String,
}

impl fmt::Debug for CallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTarget")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Validated job request. Immutable once accepted.
#[derive(Clone)]
pub struct JobRequest {
    /// Generated per accepted request; only used for log correlation.
    pub request_id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub message: String,
    pub job_credential: String,
    pub callback: CallbackTarget,
    pub client_id: String,
    pub echo_text: String,
}

impl JobRequest {
    /// Build a job request from an inbound chat request and a resolved callback url.
    ///
    /// Returns `None` when `thread_id` is blank: the core never creates threads.
    pub fn from_chat(req: ChatRequest, callback_url: String) -> Option<Self> {
        let thread_id = req.thread_id.trim().to_string();
        if thread_id.is_empty() {
            return None;
        }
        let echo_text = req.callback_message.unwrap_or_else(|| req.message.clone());
        Some(Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            thread_id,
            assistant_id: req.asst_id,
            message: req.message,
            job_credential: req.gpt_token,
            callback: CallbackTarget {
                url: callback_url,
                credential: req.sale_token,
            },
            client_id: req.client_id,
            echo_text,
        })
    }
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("request_id", &self.request_id)
            .field("thread_id", &self.thread_id)
            .field("assistant_id", &self.assistant_id)
            .field("client_id", &self.client_id)
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

/// Token accounting reported by the remote run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// `open_ai_status` wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Ok,
    Error,
}

/// Body posted to the callback target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub message: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub open_ai_text: String,
    pub open_ai_status: CallbackStatus,
    #[serde(default)]
    pub open_ai_error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CallbackPayload {
    /// Success payload carrying the extracted text.
    pub fn ok(req: &JobRequest, text: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            message: req.echo_text.clone(),
            client_id: req.client_id.clone(),
            thread_id: Some(req.thread_id.clone()),
            open_ai_text: text.into(),
            open_ai_status: CallbackStatus::Ok,
            open_ai_error: String::new(),
            usage,
        }
    }

    /// Error payload carrying a caller-visible reason.
    pub fn error(req: &JobRequest, error: impl Into<String>) -> Self {
        Self {
            message: req.echo_text.clone(),
            client_id: req.client_id.clone(),
            thread_id: Some(req.thread_id.clone()),
            open_ai_text: String::new(),
            open_ai_status: CallbackStatus::Error,
            open_ai_error: error.into(),
            usage: None,
        }
    }

    /// Same correlation fields, status forced to error. Whatever this payload
    /// carried (text or error) is dropped.
    pub fn fallback(&self, error: impl Into<String>) -> Self {
        Self {
            message: self.message.clone(),
            client_id: self.client_id.clone(),
            thread_id: self.thread_id.clone(),
            open_ai_text: String::new(),
            open_ai_status: CallbackStatus::Error,
            open_ai_error: error.into(),
            usage: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.open_ai_status == CallbackStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> ChatRequest {
        ChatRequest {
            thread_id: " thread_1 ".to_string(),
            asst_id: "asst_1".to_string(),
            gpt_token: "sk-secret".to_string(),
            sale_token: "sale-secret".to_string(),
            client_id: "client-9".to_string(),
            message: "Hi there".to_string(),
            callback_message: None,
            callback_url: None,
        }
    }

    #[test]
    fn blank_thread_is_rejected() {
        let mut req = chat();
        req.thread_id = "   ".to_string();
        assert!(JobRequest::from_chat(req, "https://cb".to_string()).is_none());
    }

    #[test]
    fn echo_text_defaults_to_message() {
        let job = JobRequest::from_chat(chat(), "https://cb".to_string()).unwrap();
        assert_eq!(job.thread_id, "thread_1");
        assert_eq!(job.echo_text, "Hi there");
        assert_eq!(job.callback.credential, "sale-secret");

        let mut req = chat();
        req.callback_message = Some("order #12".to_string());
        let job = JobRequest::from_chat(req, "https://cb".to_string()).unwrap();
        assert_eq!(job.echo_text, "order #12");
    }

    #[test]
    fn debug_hides_credentials() {
        let job = JobRequest::from_chat(chat(), "https://cb".to_string()).unwrap();
        let dbg = format!("{:?}", job);
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("sale-secret"));
    }

    #[test]
    fn payload_wire_shape() {
        let job = JobRequest::from_chat(chat(), "https://cb".to_string()).unwrap();
        let ok = serde_json::to_value(CallbackPayload::ok(&job, "Hello", None)).unwrap();
        assert_eq!(ok["message"], "Hi there");
        assert_eq!(ok["client_id"], "client-9");
        assert_eq!(ok["open_ai_text"], "Hello");
        assert_eq!(ok["open_ai_status"], "ok");
        assert_eq!(ok["open_ai_error"], "");
        assert!(ok.get("usage").is_none());

        let err = serde_json::to_value(CallbackPayload::error(&job, "boom")).unwrap();
        assert_eq!(err["open_ai_status"], "error");
        assert_eq!(err["open_ai_error"], "boom");
        assert_eq!(err["open_ai_text"], "");
    }

    #[test]
    fn fallback_keeps_correlation_and_forces_error() {
        let job = JobRequest::from_chat(chat(), "https://cb".to_string()).unwrap();
        let usage = Usage {
            prompt_tokens: 3,
            completion_tokens: 4,
            total_tokens: 7,
        };
        let primary = CallbackPayload::ok(&job, "Hello", Some(usage));
        let fallback = primary.fallback("callback timed out");
        assert_eq!(fallback.message, primary.message);
        assert_eq!(fallback.client_id, primary.client_id);
        assert_eq!(fallback.thread_id, primary.thread_id);
        assert_eq!(fallback.open_ai_status, CallbackStatus::Error);
        assert_eq!(fallback.open_ai_text, "");
        assert_eq!(fallback.open_ai_error, "callback timed out");
        assert!(fallback.usage.is_none());
    }
}

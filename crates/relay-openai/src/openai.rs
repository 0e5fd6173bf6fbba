//! HTTP client for the OpenAI Assistants v2 API.

use async_trait::async_trait;
use relay_types::{
    JobClient, JobClientError, JobClientFactory, RunHandle, RunSnapshot, RunStatus, Usage,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    #[serde(default = "unknown_status")]
    status: RunStatus,
    #[serde(default)]
    last_error: Option<RunLastError>,
    #[serde(default)]
    usage: Option<Usage>,
}

fn unknown_status() -> RunStatus {
    RunStatus::Unknown
}

#[derive(Debug, Deserialize)]
struct RunLastError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

/// Job client bound to one API key.
#[derive(Clone)]
pub struct OpenAiJobClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

impl OpenAiJobClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound on every single API call (lookup, submit, poll, fetch).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Appends `segments` to the base url, each percent-encoded as one path
    /// segment so ids cannot reach another endpoint.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, JobClientError> {
        if let Some(bad) = segments.iter().find(|s| !is_path_segment(s)) {
            return Err(JobClientError::Other(format!("invalid id {:?}", bad)));
        }
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| JobClientError::Other(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| JobClientError::Other(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, JobClientError> {
        Ok(self
            .client
            .request(method, self.url(segments)?)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .timeout(self.request_timeout))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, JobClientError> {
        let res = req
            .send()
            .await
            .map_err(|e| JobClientError::Http(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(JobClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }

    async fn json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, JobClientError> {
        res.json()
            .await
            .map_err(|e| JobClientError::Parse(e.to_string()))
    }
}

/// `.` and `..` are dropped by url path normalisation, so they never name a resource.
fn is_path_segment(s: &str) -> bool {
    !matches!(s, "" | "." | "..")
}

impl fmt::Debug for OpenAiJobClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiJobClient")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl JobClient for OpenAiJobClient {
    async fn thread_exists(&self, thread_id: &str) -> Result<bool, JobClientError> {
        if !is_path_segment(thread_id) {
            tracing::debug!(thread_id, "thread id cannot name a thread");
            return Ok(false);
        }
        let req = self.request(reqwest::Method::GET, &["threads", thread_id])?;
        match self.send(req).await {
            Ok(_) => Ok(true),
            Err(JobClientError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn submit(
        &self,
        thread_id: &str,
        assistant_id: &str,
        message: &str,
    ) -> Result<RunHandle, JobClientError> {
        let body = serde_json::json!({
            "assistant_id": assistant_id,
            "additional_messages": [
                { "role": "user", "content": message }
            ]
        });
        let req = self.request(reqwest::Method::POST, &["threads", thread_id, "runs"])?;
        let res = self.send(req.json(&body)).await?;
        let run: RunObject = Self::json(res).await?;
        tracing::debug!(thread_id, run_id = %run.id, status = %run.status, "run created");
        Ok(RunHandle {
            thread_id: thread_id.to_string(),
            run_id: run.id,
        })
    }

    async fn poll(&self, run: &RunHandle) -> Result<RunSnapshot, JobClientError> {
        let req = self.request(
            reqwest::Method::GET,
            &["threads", &run.thread_id, "runs", &run.run_id],
        )?;
        let res = self.send(req).await?;
        let obj: RunObject = Self::json(res).await?;
        let last_error = obj.last_error.and_then(|e| match (e.message, e.code) {
            (Some(m), _) if !m.is_empty() => Some(m),
            (_, Some(code)) => Some(code),
            _ => None,
        });
        Ok(RunSnapshot {
            status: obj.status,
            last_error,
            usage: obj.usage,
        })
    }

    async fn fetch_result(&self, run: &RunHandle) -> Result<Option<String>, JobClientError> {
        let req = self
            .request(reqwest::Method::GET, &["threads", &run.thread_id, "messages"])?
            .query(&[
            ("order", "desc"),
            ("limit", "1"),
            ("run_id", run.run_id.as_str()),
        ]);
        let res = self.send(req).await?;
        let list: MessageList = Self::json(res).await?;
        let text = list.data.into_iter().next().map(|m| {
            m.content
                .into_iter()
                .filter(|p| p.kind == "text")
                .filter_map(|p| p.text.map(|t| t.value))
                .collect::<Vec<_>>()
                .join("\n")
        });
        Ok(text)
    }
}

/// Builds [`OpenAiJobClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct OpenAiClientFactory {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl OpenAiClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads `OPENAI_API_BASE` (defaults to the public endpoint).
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl JobClientFactory for OpenAiClientFactory {
    fn client(&self, credential: &str) -> Arc<dyn JobClient> {
        Arc::new(
            OpenAiJobClient::new(self.client.clone(), self.base_url.clone(), credential)
                .with_request_timeout(self.request_timeout),
        )
    }
}

//! Turns a completed run into an [`Outcome`].

use relay_types::{JobClient, Outcome, RunError, RunHandle, Usage};
use std::sync::Arc;

pub struct ResultExtractor {
    client: Arc<dyn JobClient>,
}

impl ResultExtractor {
    pub fn new(client: Arc<dyn JobClient>) -> Self {
        Self { client }
    }

    /// Fetch and trim the run's text. Empty or absent text is `EmptyResult`,
    /// which is reported differently from a failed run.
    pub async fn extract(&self, run: &RunHandle, usage: Option<Usage>) -> Outcome {
        match self.client.fetch_result(run).await {
            Ok(Some(text)) if !text.trim().is_empty() => Outcome::Success {
                text: text.trim().to_string(),
                usage,
            },
            Ok(_) => {
                tracing::warn!(run_id = %run.run_id, "run completed without text");
                Outcome::from(&RunError::EmptyResult)
            }
            Err(e) => {
                tracing::error!(run_id = %run.run_id, error = %e, "fetching run result failed");
                Outcome::from(&RunError::ResultUnavailable(e.to_string()))
            }
        }
    }
}

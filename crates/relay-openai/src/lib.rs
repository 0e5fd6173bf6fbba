//! Job client for the OpenAI Assistants API (threads, runs, messages).

#[cfg(feature = "test-util")]
pub mod mock;
mod openai;

pub use openai::{OpenAiClientFactory, OpenAiJobClient};
pub use relay_types::{JobClient, JobClientError, JobClientFactory};

#[cfg(feature = "test-util")]
pub use mock::{MockClientFactory, MockJobClient};

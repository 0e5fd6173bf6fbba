//! Drives one submitted run to a terminal outcome and extracts its text.

mod config;
mod engine;
mod extractor;

pub use config::{PollerConfig, TimeoutPolicy};
pub use engine::{decide, PollTerminal, PollingEngine, RetryDecision};
pub use extractor::ResultExtractor;

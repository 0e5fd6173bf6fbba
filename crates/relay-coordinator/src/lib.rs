//! Request coordination: PollingEngine -> ResultExtractor -> CallbackDispatcher.

mod coordinator;

pub use coordinator::{payload_for, CoordinatorConfig, Processed, RequestCoordinator};

//! Callback delivery: one primary POST, at most one error fallback.

mod dispatcher;
mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod recording;

pub use dispatcher::{CallbackDispatcher, DeliveryReport};
pub use http::HttpCallbackSender;
pub use relay_types::{CallbackSender, DeliveryError};

#[cfg(any(test, feature = "test-util"))]
pub use recording::{RecordedCall, RecordingSender};

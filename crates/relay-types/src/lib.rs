//! Core types and traits for run-relay.
//!
//! Inbound request and callback DTOs keep the field names existing webhook
//! consumers already parse (`open_ai_text`, `open_ai_status`, ...).

mod dto;
mod lifecycle;
mod traits;

pub use dto::*;
pub use lifecycle::*;
pub use traits::*;

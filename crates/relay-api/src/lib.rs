//! run-relay HTTP front end and configuration.

pub mod config;
pub mod server;

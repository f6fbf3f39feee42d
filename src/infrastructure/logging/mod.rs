//! Logging infrastructure: structured output via `tracing`, with secret
//! scrubbing applied ahead of every sink.

pub mod config;
pub mod secret_scrubbing;
pub mod setup;

pub use config::LogConfig;
pub use secret_scrubbing::SecretScrubbingLayer;
pub use setup::{init, LoggingGuard};

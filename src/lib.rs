//! Iris - lock-free single-producer single-consumer ring buffer
//!
//! - [`core`]: the `RingBuffer` and its `Producer`/`Consumer` handles
//! - [`harness`]: producer/consumer demo with retry-with-backoff
//! - [`error`], [`telemetry`]: error types and log setup

pub mod core;
pub mod error;
pub mod harness;
pub mod telemetry;

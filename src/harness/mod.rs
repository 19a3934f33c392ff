//! Producer/consumer harness around the ring buffer.
//!
//! - `config`: command-line flags
//! - `backoff`: retry pacing when the queue is full or empty
//! - `runner`: spawns the two role threads and builds the final report

mod backoff;
mod config;
mod runner;

pub use backoff::{Backoff, RetryPolicy};
pub use config::{parse_args, Command, DemoConfig, USAGE};
pub use runner::{run, Report};

//! Error types.
//!
//! Full/empty are normal, high-frequency conditions: the queue itself reports
//! them through `bool`/`Option`/[`PushError`]. [`QueueError`] only shows up
//! once a caller-side retry policy gives up or is told to stop.

use std::fmt;
use std::io;

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
    /// The other role failed and asked this one to stop retrying
    #[error("retry stopped after the other side failed")]
    Stopped,
}

/// Returned by `Producer::try_push` when the buffer is full; carries the
/// rejected value so the caller can retry with it.
#[derive(Error, PartialEq, Eq)]
#[error("queue is full")]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> From<PushError<T>> for QueueError {
    fn from(_: PushError<T>) -> Self {
        QueueError::Full
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown argument `{0}`")]
    UnknownArgument(String),
    #[error("missing value for `{0}`")]
    MissingValue(&'static str),
    #[error("invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: &'static str, value: String },
    #[error("unknown backoff `{0}` (expected fixed, exponential or spin)")]
    UnknownBackoff(String),
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{role} gave up: {source}")]
    Queue {
        role: &'static str,
        #[source]
        source: QueueError,
    },
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
    #[error("failed to install log subscriber: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),
}

impl HarnessError {
    /// True when this role only stopped because the other one failed.
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            HarnessError::Queue {
                source: QueueError::Stopped,
                ..
            }
        )
    }
}

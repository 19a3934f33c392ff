//! Log subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::HarnessError;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `iris=info`, or `iris=debug` with
/// `verbose`. Thread names are printed so producer and consumer lines can be
/// told apart.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(verbose: bool) -> Result<(), HarnessError> {
    let default_level = if verbose { "iris=debug" } else { "iris=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}

//! Iris demo - one producer, one consumer, one lock-free ring buffer
//!
//! The producer pushes `0..items`, the consumer pops them; whenever the
//! queue is full or empty the caller backs off and retries the same item.
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]

use std::process;

use iris::error::HarnessError;
use iris::harness::{self, Command, DemoConfig};
use iris::telemetry;
use tracing::{error, info};

/// Ring slots; one is always kept free, so 9 values fit at once
const DEMO_SLOTS: usize = 10;

fn main() {
    let config = match harness::parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            println!("{}", harness::USAGE);
            return;
        }
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, harness::USAGE);
            process::exit(1);
        }
    };

    if let Err(e) = telemetry::init(config.verbose) {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(&config) {
        error!(error = %e, "demo failed");
        process::exit(1);
    }
}

fn run(config: &DemoConfig) -> Result<(), HarnessError> {
    let report = harness::run::<DEMO_SLOTS>(config)?;

    info!("Final queue size: {}", report.final_len);
    info!("Queue empty: {}", report.final_empty);
    if !report.is_in_order(config.items) {
        error!(consumed = ?report.consumed, "values arrived out of order");
    }
    Ok(())
}

//! Demo configuration parsed from command-line flags.

use std::time::Duration;

use crate::error::ConfigError;

use super::backoff::{Backoff, RetryPolicy};

/// Demo configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Values produced and consumed (`0..items`)
    pub items: u32,
    /// Producer pause after every attempt, simulating work
    pub produce_delay: Duration,
    /// Consumer pause after every attempt, simulating work
    pub consume_delay: Duration,
    pub retry: RetryPolicy,
    pub verbose: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            items: 15,
            produce_delay: Duration::from_millis(50),
            consume_delay: Duration::from_millis(75),
            retry: RetryPolicy::default(),
            verbose: false,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(DemoConfig),
    Help,
}

pub const USAGE: &str = "\
iris - lock-free SPSC ring buffer demo

Usage: iris [OPTIONS]

Options:
      --items <N>              Values to transfer (default: 15)
      --produce-delay-ms <MS>  Producer pause per attempt (default: 50)
      --consume-delay-ms <MS>  Consumer pause per attempt (default: 75)
      --backoff <KIND>         fixed | exponential | spin (default: fixed)
      --backoff-ms <MS>        Fixed delay, or initial exponential delay (default: 100)
      --max-backoff-ms <MS>    Exponential cap (default: 1000)
      --max-attempts <N>       Give up after N failed attempts (default: never)
  -v, --verbose                Debug logging
  -h, --help                   Show this help";

/// Parse flags (without the program name).
///
/// # Errors
///
/// Unknown flags, missing or malformed values.
pub fn parse_args<I>(args: I) -> Result<Command, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = DemoConfig::default();
    let mut backoff_kind = String::from("fixed");
    let mut backoff_ms = 100;
    let mut max_backoff_ms = 1000;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--items" => config.items = number(&mut args, "--items")?,
            "--produce-delay-ms" => {
                config.produce_delay =
                    Duration::from_millis(number(&mut args, "--produce-delay-ms")?);
            }
            "--consume-delay-ms" => {
                config.consume_delay =
                    Duration::from_millis(number(&mut args, "--consume-delay-ms")?);
            }
            "--backoff" => backoff_kind = value(&mut args, "--backoff")?,
            "--backoff-ms" => backoff_ms = number(&mut args, "--backoff-ms")?,
            "--max-backoff-ms" => max_backoff_ms = number(&mut args, "--max-backoff-ms")?,
            "--max-attempts" => {
                config.retry.max_attempts = Some(number(&mut args, "--max-attempts")?);
            }
            "--verbose" | "-v" => config.verbose = true,
            "--help" | "-h" => return Ok(Command::Help),
            _ => return Err(ConfigError::UnknownArgument(arg)),
        }
    }

    config.retry.backoff = match backoff_kind.as_str() {
        "fixed" => Backoff::Fixed(Duration::from_millis(backoff_ms)),
        "exponential" => Backoff::Exponential {
            initial: Duration::from_millis(backoff_ms),
            max: Duration::from_millis(max_backoff_ms),
        },
        "spin" => Backoff::Spin,
        _ => return Err(ConfigError::UnknownBackoff(backoff_kind)),
    };

    Ok(Command::Run(config))
}

fn value<I>(args: &mut I, flag: &'static str) -> Result<String, ConfigError>
where
    I: Iterator<Item = String>,
{
    args.next().ok_or(ConfigError::MissingValue(flag))
}

fn number<I, N>(args: &mut I, flag: &'static str) -> Result<N, ConfigError>
where
    I: Iterator<Item = String>,
    N: std::str::FromStr,
{
    let raw = value(args, flag)?;
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { flag, value: raw })
}

//! Producer/consumer demonstration over one [`RingBuffer`].
//!
//! One producer thread pushes `0..items`, one consumer thread pops the same
//! number of values. Full/empty results are retried through the configured
//! [`RetryPolicy`](super::RetryPolicy); every thread pauses after each attempt,
//! failed or not, to simulate work, so the two sides drift and exercise both
//! boundaries. When one side fails the other is told to stop retrying, so a
//! failure is reported even without an attempt cap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::core::{Consumer, Producer, RingBuffer};
use crate::error::{HarnessError, QueueError};

use super::config::DemoConfig;

/// Outcome of a demo run, taken after both threads have joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Values in the order the consumer received them
    pub consumed: Vec<u32>,
    /// Failed pushes (queue full)
    pub push_retries: u64,
    /// Failed pops (queue empty)
    pub pop_retries: u64,
    pub final_len: usize,
    pub final_empty: bool,
    pub elapsed: Duration,
}

impl Report {
    /// True when every value arrived exactly once and in order.
    pub fn is_in_order(&self, items: u32) -> bool {
        self.consumed.iter().copied().eq(0..items)
    }
}

/// Run the demo on a buffer of `N` slots.
///
/// # Errors
///
/// Spawn failures, a panicked worker, or a retry policy giving up.
pub fn run<const N: usize>(config: &DemoConfig) -> Result<Report, HarnessError> {
    let mut queue: RingBuffer<u32, N> = RingBuffer::new();
    info!(
        slots = N,
        capacity = queue.capacity(),
        items = config.items,
        "starting producer/consumer demo"
    );

    let start = Instant::now();
    let (producer, consumer) = queue.split();

    let (push_retries, (consumed, pop_retries)) = run_roles(
        move |stop| produce(producer, config, stop),
        move |stop| consume(consumer, config, stop),
    )?;

    // Both threads joined and the handles are gone: these reads are exact
    let report = Report {
        consumed,
        push_retries,
        pop_retries,
        final_len: queue.len(),
        final_empty: queue.is_empty(),
        elapsed: start.elapsed(),
    };

    info!(
        final_size = report.final_len,
        empty = report.final_empty,
        push_retries = report.push_retries,
        pop_retries = report.pop_retries,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "demo finished"
    );

    Ok(report)
}

/// Run the two roles on named threads and join both.
///
/// A role that fails (error or panic) raises the shared stop flag, so the
/// other one leaves its retry loop instead of waiting forever.
fn run_roles<P, C, PR, CR>(produce: P, consume: C) -> Result<(PR, CR), HarnessError>
where
    P: FnOnce(&AtomicBool) -> Result<PR, QueueError> + Send,
    C: FnOnce(&AtomicBool) -> Result<CR, QueueError> + Send,
    PR: Send,
    CR: Send,
{
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        let stop = &stop;
        let producer_thread = thread::Builder::new()
            .name("producer".into())
            .spawn_scoped(s, move || {
                let _guard = StopOnPanic(stop);
                produce(stop).map_err(|e| raise(stop, e))
            })
            .map_err(|source| HarnessError::Spawn {
                role: "producer",
                source,
            })?;

        let consumer_thread = thread::Builder::new()
            .name("consumer".into())
            .spawn_scoped(s, move || {
                let _guard = StopOnPanic(stop);
                consume(stop).map_err(|e| raise(stop, e))
            })
            .map_err(|source| {
                // The producer is already running: it ends at its next failed push
                stop.store(true, Ordering::Relaxed);
                HarnessError::Spawn {
                    role: "consumer",
                    source,
                }
            })?;

        let produced = join_role(producer_thread.join(), "producer");
        let consumed = join_role(consumer_thread.join(), "consumer");

        match (produced, consumed) {
            (Ok(produced), Ok(consumed)) => Ok((produced, consumed)),
            // Report the side that failed first, not the one it stopped
            (Err(first), Err(second)) if first.is_stopped() => Err(second),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    })
}

/// Raises the stop flag if the worker unwinds.
struct StopOnPanic<'a>(&'a AtomicBool);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

fn raise(stop: &AtomicBool, error: QueueError) -> QueueError {
    stop.store(true, Ordering::Relaxed);
    error
}

fn join_role<T>(
    joined: thread::Result<Result<T, QueueError>>,
    role: &'static str,
) -> Result<T, HarnessError> {
    joined
        .map_err(|_| HarnessError::ThreadPanicked(role))?
        .map_err(|source| HarnessError::Queue { role, source })
}

fn produce<const N: usize>(
    producer: Producer<'_, u32, N>,
    config: &DemoConfig,
    stop: &AtomicBool,
) -> Result<u64, QueueError> {
    let mut retries = 0u64;
    for value in 0..config.items {
        let failures = config
            .retry
            .push(&producer, value, config.produce_delay, stop)?;
        retries = retries.saturating_add(failures);
        if failures > 0 {
            info!(value, failures, "pushed after queue was full");
        } else {
            info!(value, len = producer.len(), "pushed");
        }
        pace(config.produce_delay);
    }
    debug!(retries, "producer done");
    Ok(retries)
}

fn consume<const N: usize>(
    consumer: Consumer<'_, u32, N>,
    config: &DemoConfig,
    stop: &AtomicBool,
) -> Result<(Vec<u32>, u64), QueueError> {
    let mut received = Vec::with_capacity(config.items as usize);
    let mut retries = 0u64;
    for _ in 0..config.items {
        let (value, failures) = config.retry.pop(&consumer, config.consume_delay, stop)?;
        retries = retries.saturating_add(failures);
        if failures > 0 {
            info!(value, failures, "popped after queue was empty");
        } else {
            info!(value, "popped");
        }
        received.push(value);
        pace(config.consume_delay);
    }
    debug!(retries, "consumer done");
    Ok((received, retries))
}

fn pace(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::backoff::{Backoff, RetryPolicy};

    fn fast_config(items: u32) -> DemoConfig {
        DemoConfig {
            items,
            produce_delay: Duration::ZERO,
            consume_delay: Duration::ZERO,
            retry: RetryPolicy::new(Backoff::Spin, None),
            verbose: false,
        }
    }

    #[test]
    fn test_run_transfers_everything_in_order() {
        let report = run::<4>(&fast_config(500)).unwrap();

        assert!(report.is_in_order(500));
        assert_eq!(report.final_len, 0);
        assert!(report.final_empty);
    }

    #[test]
    fn test_slow_consumer_forces_push_retries() {
        let config = DemoConfig {
            consume_delay: Duration::from_millis(2),
            retry: RetryPolicy::new(Backoff::Fixed(Duration::from_millis(1)), None),
            ..fast_config(12)
        };
        let report = run::<3>(&config).unwrap();

        assert!(report.is_in_order(12));
        assert!(report.push_retries > 0);
        assert!(report.final_empty);
    }

    #[test]
    fn test_consumer_gives_up_when_queue_stays_empty() {
        let config = DemoConfig {
            produce_delay: Duration::from_millis(50),
            retry: RetryPolicy::new(Backoff::Spin, Some(1)),
            ..fast_config(3)
        };

        // One attempt per item against a producer that sleeps 50ms between pushes
        let err = run::<16>(&config).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Queue {
                source: QueueError::Empty,
                ..
            }
        ));
    }

    #[test]
    fn test_consumer_panic_stops_uncapped_producer() {
        let mut rb: RingBuffer<u32, 2> = RingBuffer::new();
        let (producer, _consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, None);

        // The buffer fills after one push and nobody drains it
        let result = run_roles(
            move |stop| {
                for value in 0..10 {
                    policy.push(&producer, value, Duration::ZERO, stop)?;
                }
                Ok(())
            },
            |_stop| -> Result<(), QueueError> { panic!("consumer crashed") },
        );

        assert!(matches!(result, Err(HarnessError::ThreadPanicked("consumer"))));
    }

    #[test]
    fn test_consumer_error_reported_over_stopped_producer() {
        let mut rb: RingBuffer<u32, 2> = RingBuffer::new();
        let (producer, _consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, None);

        let result = run_roles(
            move |stop| {
                for value in 0..10 {
                    policy.push(&producer, value, Duration::ZERO, stop)?;
                }
                Ok(())
            },
            |_stop| -> Result<(), QueueError> { Err(QueueError::Empty) },
        );

        assert!(matches!(
            result,
            Err(HarnessError::Queue {
                role: "consumer",
                source: QueueError::Empty,
            })
        ));
    }
}

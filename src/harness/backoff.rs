//! Caller-side retry pacing.
//!
//! The ring buffer never waits. When `push`/`pop` report full/empty, the
//! harness asks a [`RetryPolicy`] how long to back off before trying the same
//! item again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::{Consumer, Producer};
use crate::error::QueueError;

/// How long to wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Busy-wait with a CPU spin hint, never sleep.
    Spin,
    /// Sleep the same duration on every retry.
    Fixed(Duration),
    /// Sleep `initial * 2^attempt`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_millis(100))
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0 = first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Spin => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                initial.checked_mul(factor).map_or(max, |d| d.min(max))
            }
        }
    }

    pub fn wait(&self, attempt: u32) {
        match self {
            Backoff::Spin => std::hint::spin_loop(),
            _ => thread::sleep(self.delay(attempt)),
        }
    }
}

/// Backoff plus an optional cap on attempts.
///
/// Without a cap an item is retried until it goes through or the caller
/// raises the stop flag; it is never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn new(backoff: Backoff, max_attempts: Option<u32>) -> Self {
        Self {
            backoff,
            max_attempts,
        }
    }

    /// Push `value`, backing off while the buffer is full.
    ///
    /// After every failed attempt the thread backs off, then sleeps `pause`
    /// (the caller's own per-attempt work). Returns the number of failed
    /// attempts before success.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] once `max_attempts` attempts have failed,
    /// [`QueueError::Stopped`] once `stop` is set.
    pub fn push<T, const N: usize>(
        &self,
        producer: &Producer<'_, T, N>,
        value: T,
        pause: Duration,
        stop: &AtomicBool,
    ) -> Result<u64, QueueError> {
        let mut value = value;
        let mut failures = 0u64;
        loop {
            match producer.try_push(value) {
                Ok(()) => return Ok(failures),
                Err(rejected) => {
                    value = rejected.into_inner();
                    failures = failures.saturating_add(1);
                    if failures == 1 {
                        info!("queue full, failed to push; retrying");
                    } else {
                        debug!(attempt = failures, "queue still full");
                    }
                    self.after_failure(failures, pause, stop, QueueError::Full)?;
                }
            }
        }
    }

    /// Pop a value, backing off while the buffer is empty.
    ///
    /// Same pacing as [`RetryPolicy::push`]. Returns the value and the number
    /// of failed attempts before it.
    ///
    /// # Errors
    ///
    /// [`QueueError::Empty`] once `max_attempts` attempts have failed,
    /// [`QueueError::Stopped`] once `stop` is set.
    pub fn pop<T, const N: usize>(
        &self,
        consumer: &Consumer<'_, T, N>,
        pause: Duration,
        stop: &AtomicBool,
    ) -> Result<(T, u64), QueueError> {
        let mut failures = 0u64;
        loop {
            if let Some(value) = consumer.try_pop() {
                return Ok((value, failures));
            }
            failures = failures.saturating_add(1);
            if failures == 1 {
                info!("queue empty, failed to pop; retrying");
            } else {
                debug!(attempt = failures, "queue still empty");
            }
            self.after_failure(failures, pause, stop, QueueError::Empty)?;
        }
    }

    fn after_failure(
        &self,
        failures: u64,
        pause: Duration,
        stop: &AtomicBool,
        condition: QueueError,
    ) -> Result<(), QueueError> {
        if self.exhausted(failures) {
            return Err(condition);
        }
        if stop.load(Ordering::Relaxed) {
            return Err(QueueError::Stopped);
        }
        self.backoff.wait(retry_index(failures));
        if !pause.is_zero() {
            thread::sleep(pause);
        }
        Ok(())
    }

    fn exhausted(&self, failures: u64) -> bool {
        self.max_attempts.is_some_and(|max| failures >= u64::from(max))
    }
}

/// Zero-based retry number for [`Backoff::delay`], saturating at `u32::MAX`.
fn retry_index(failures: u64) -> u32 {
    u32::try_from(failures.saturating_sub(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RingBuffer;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[test]
    fn test_fixed_delay_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_millis(100));
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_delay_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(50),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(1));
        assert_eq!(backoff.delay(1), Duration::from_millis(2));
        assert_eq!(backoff.delay(4), Duration::from_millis(16));
        assert_eq!(backoff.delay(6), Duration::from_millis(50));
        // Shift overflow must still land on the cap
        assert_eq!(backoff.delay(40), Duration::from_millis(50));
    }

    #[test]
    fn test_spin_never_sleeps() {
        assert_eq!(Backoff::Spin.delay(3), Duration::ZERO);
    }

    #[test]
    fn test_counters_saturate_near_u32_max() {
        let uncapped = RetryPolicy::new(Backoff::Spin, None);
        assert!(!uncapped.exhausted(u64::from(u32::MAX) + 1));
        assert!(!uncapped.exhausted(u64::MAX));

        let capped = RetryPolicy::new(Backoff::Spin, Some(u32::MAX));
        assert!(!capped.exhausted(u64::from(u32::MAX) - 1));
        assert!(capped.exhausted(u64::from(u32::MAX)));

        assert_eq!(retry_index(1), 0);
        assert_eq!(retry_index(u64::from(u32::MAX)), u32::MAX - 1);
        assert_eq!(retry_index(u64::from(u32::MAX) + 5), u32::MAX);
        assert_eq!(retry_index(u64::MAX), u32::MAX);
        assert_eq!(u64::MAX.saturating_add(1), u64::MAX);

        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(50),
        };
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(50));
        assert_eq!(Backoff::Spin.delay(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn test_push_gives_up_after_max_attempts() {
        let mut rb: RingBuffer<u32, 2> = RingBuffer::new();
        let (producer, _consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, Some(3));
        let stop = AtomicBool::new(false);

        assert_eq!(policy.push(&producer, 1, Duration::ZERO, &stop), Ok(0));
        assert_eq!(
            policy.push(&producer, 2, Duration::ZERO, &stop),
            Err(QueueError::Full)
        );
    }

    #[test]
    fn test_pop_gives_up_after_max_attempts() {
        let mut rb: RingBuffer<u32, 4> = RingBuffer::new();
        let (producer, consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, Some(2));
        let stop = AtomicBool::new(false);

        assert_eq!(
            policy.pop(&consumer, Duration::ZERO, &stop),
            Err(QueueError::Empty)
        );
        assert!(producer.push(9));
        assert_eq!(policy.pop(&consumer, Duration::ZERO, &stop), Ok((9, 0)));
    }

    #[test]
    fn test_uncapped_retry_ends_when_stopped() {
        let mut rb: RingBuffer<u32, 4> = RingBuffer::new();
        let (_producer, consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, None);
        let stop = AtomicBool::new(false);

        let stop_flag = &stop;
        thread::scope(|s| {
            let waiter = s.spawn(move || policy.pop(&consumer, Duration::ZERO, stop_flag));
            thread::sleep(Duration::from_millis(20));
            stop_flag.store(true, Ordering::Relaxed);
            assert_eq!(waiter.join().unwrap(), Err(QueueError::Stopped));
        });
    }

    #[test]
    fn test_pause_follows_every_failed_attempt() {
        let mut rb: RingBuffer<u32, 4> = RingBuffer::new();
        let (_producer, consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, Some(3));
        let stop = AtomicBool::new(false);

        // Failures 1 and 2 are retried (each followed by the pause), 3 gives up
        let start = Instant::now();
        let result = policy.pop(&consumer, Duration::from_millis(10), &stop);
        assert_eq!(result, Err(QueueError::Empty));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_first_failure_logged_at_info() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || LineSink(Arc::clone(&sink)))
            .finish();

        let mut rb: RingBuffer<u32, 4> = RingBuffer::new();
        let (_producer, consumer) = rb.split();
        let policy = RetryPolicy::new(Backoff::Spin, Some(5));
        let stop = AtomicBool::new(false);

        tracing::subscriber::with_default(subscriber, || {
            let _ = policy.pop(&consumer, Duration::ZERO, &stop);
        });

        let output = String::from_utf8(lines.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("queue empty, failed to pop").count(), 1);
        assert!(!output.contains("queue still empty"));
    }

    struct LineSink(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LineSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

//! Role handles for cross-thread use of a [`RingBuffer`].
//!
//! [`RingBuffer::split`] hands out exactly one [`Producer`] and one
//! [`Consumer`]. Neither is `Clone` nor `Sync`, so each cursor has a single
//! writer by construction.
//!
//! ```
//! use iris::core::RingBuffer;
//! use std::thread;
//!
//! let mut rb: RingBuffer<u64, 64> = RingBuffer::new();
//! let (producer, consumer) = rb.split();
//!
//! thread::scope(|s| {
//!     s.spawn(move || {
//!         for i in 0..1000 {
//!             while !producer.push(i) {
//!                 std::hint::spin_loop();
//!             }
//!         }
//!     });
//!     s.spawn(move || {
//!         let mut expected = 0;
//!         while expected < 1000 {
//!             if let Some(v) = consumer.try_pop() {
//!                 assert_eq!(v, expected);
//!                 expected += 1;
//!             }
//!         }
//!     });
//! });
//!
//! assert!(rb.is_empty());
//! ```
//!
//! [`RingBuffer`]: super::RingBuffer
//! [`RingBuffer::split`]: super::RingBuffer::split

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use super::ring_buffer::Ring;
use crate::error::PushError;

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of a split [`RingBuffer`](super::RingBuffer).
///
/// `Send` but **not** `Sync`: it can move to the producer thread, but
/// `&Producer` cannot be shared, so there is never a concurrent `push`.
///
/// The roles cannot be duplicated. A `&Producer` cannot be shared with a
/// second thread:
///
/// ```compile_fail
/// use iris::core::RingBuffer;
/// use std::thread;
///
/// let mut rb: RingBuffer<u64, 8> = RingBuffer::new();
/// let (producer, _consumer) = rb.split();
/// let producer = &producer;
///
/// thread::scope(|s| {
///     s.spawn(move || producer.push(1));
///     s.spawn(move || producer.push(2));
/// });
/// ```
///
/// Handles are not `Clone`:
///
/// ```compile_fail
/// use iris::core::{Consumer, RingBuffer};
///
/// let mut rb: RingBuffer<u64, 8> = RingBuffer::new();
/// let (_producer, consumer) = rb.split();
/// let second: Consumer<'_, u64, 8> = consumer.clone();
/// ```
///
/// And the buffer cannot be split again while the first handles are live:
///
/// ```compile_fail
/// use iris::core::RingBuffer;
///
/// let mut rb: RingBuffer<u64, 8> = RingBuffer::new();
/// let (producer, _consumer) = rb.split();
/// let (second_producer, _second_consumer) = rb.split();
/// producer.push(1);
/// second_producer.push(2);
/// ```
pub struct Producer<'a, T, const N: usize> {
    ring: &'a Ring<T, N>,
    _unsync: PhantomUnsync,
}

/// Read end of a split [`RingBuffer`](super::RingBuffer).
///
/// Same thread-safety rules as [`Producer`].
pub struct Consumer<'a, T, const N: usize> {
    ring: &'a Ring<T, N>,
    _unsync: PhantomUnsync,
}

impl<'a, T, const N: usize> Producer<'a, T, N> {
    pub(crate) fn new(ring: &'a Ring<T, N>) -> Self {
        Self {
            ring,
            _unsync: PhantomData,
        }
    }

    /// Push a value (wait-free). Returns `false` if the buffer is full.
    #[inline]
    pub fn push(&self, value: T) -> bool {
        self.try_push(value).is_ok()
    }

    /// Push a value, handing it back in the error if the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`PushError`] carrying `value` when no slot is free.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        // SAFETY: there is exactly one Producer per split and it is !Sync
        unsafe { self.ring.push(value) }.map_err(PushError)
    }

    /// Advisory while the consumer is running.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Advisory while the consumer is running.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<'a, T, const N: usize> Consumer<'a, T, N> {
    pub(crate) fn new(ring: &'a Ring<T, N>) -> Self {
        Self {
            ring,
            _unsync: PhantomData,
        }
    }

    /// Pop the oldest value into `out` (wait-free). Returns `false` and
    /// leaves `out` untouched if the buffer is empty.
    #[inline]
    pub fn pop(&self, out: &mut T) -> bool {
        match self.try_pop() {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Pop the oldest value, `None` if empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        // SAFETY: there is exactly one Consumer per split and it is !Sync
        unsafe { self.ring.pop() }
    }

    /// Advisory while the producer is running.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Advisory while the producer is running.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<T, const N: usize> fmt::Debug for Producer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("len", &self.len()).finish()
    }
}

impl<T, const N: usize> fmt::Debug for Consumer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("len", &self.len()).finish()
    }
}

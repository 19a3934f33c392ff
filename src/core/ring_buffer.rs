//! Lock-Free Single-Producer Single-Consumer (SPSC) Ring Buffer
//!
//! Lamport queue over `N` fixed slots. One slot always stays free so that
//! `read == write` means empty and `(write + 1) % N == read` means full;
//! usable capacity is therefore `N - 1`.
//!
//! No Mutex, no allocation after construction. The buffer exposes `&mut self`
//! push/pop for single-threaded use; threads get a [`Producer`] and a
//! [`Consumer`] from [`RingBuffer::split`].

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::handle::{Consumer, Producer};

/// Slot in the ring - holds one value, written at most once per lap
#[repr(C, align(64))] // Cache line alignment to avoid false sharing between neighbours
struct Slot<T> {
    data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Padding for cache line isolation (64 bytes on x86-64)
#[repr(C, align(64))]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Shared state behind a [`RingBuffer`] and its handles.
///
/// All slot access goes through the `unsafe` push/pop below; callers must
/// guarantee a single producer and a single consumer.
#[repr(C)]
pub(crate) struct Ring<T, const N: usize> {
    // Consumer side - only the consumer stores here
    read: CacheLinePadded<AtomicUsize>,
    // Producer side - only the producer stores here
    write: CacheLinePadded<AtomicUsize>,
    // Pre-allocated on the heap, never resized
    buffer: Box<[Slot<T>]>,
}

// SAFETY: Ring is safe to share because:
// - only one producer stores `write` and writes slot `write`
// - only one consumer stores `read` and reads slot `read`
// - Release/Acquire on the cursors orders slot access between them
// Values only ever move between threads, so `T: Send` suffices.
unsafe impl<T: Send, const N: usize> Send for Ring<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Ring<T, N> {}

impl<T, const N: usize> Ring<T, N> {
    const CAPACITY_OK: () = assert!(N >= 2, "N must be at least 2 (one slot is always kept free)");

    fn new() -> Self {
        let () = Self::CAPACITY_OK;

        let mut buffer = Vec::with_capacity(N);
        for _ in 0..N {
            buffer.push(Slot::new());
        }

        Self {
            read: CacheLinePadded::new(AtomicUsize::new(0)),
            write: CacheLinePadded::new(AtomicUsize::new(0)),
            buffer: buffer.into_boxed_slice(),
        }
    }

    /// Push a value (producer side).
    ///
    /// Returns the value back if the ring is full.
    ///
    /// # Safety
    /// The caller must be the only thread pushing into this ring.
    #[inline(always)]
    pub(crate) unsafe fn push(&self, value: T) -> Result<(), T> {
        // Own cursor: nobody else stores it
        let write = self.write.value.load(Ordering::Relaxed);
        let next = (write + 1) % N;

        if next == self.read.value.load(Ordering::Acquire) {
            return Err(value);
        }

        let slot = &self.buffer[write];

        // SAFETY: slot `write` is outside [read, write), so the consumer is not
        // touching it, and the Acquire above saw its last read complete.
        unsafe {
            (*slot.data.get()).write(value);
        }

        // Publish: the slot write happens-before the consumer's Acquire of `write`
        self.write.value.store(next, Ordering::Release);

        Ok(())
    }

    /// Pop a value (consumer side).
    ///
    /// # Safety
    /// The caller must be the only thread popping from this ring.
    #[inline(always)]
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        let read = self.read.value.load(Ordering::Relaxed);

        if read == self.write.value.load(Ordering::Acquire) {
            return None;
        }

        let slot = &self.buffer[read];

        // SAFETY: slot `read` is inside [read, write): fully written by the producer
        // (Acquire above) and not written again until we advance `read`.
        let value = unsafe { (*slot.data.get()).assume_init_read() };

        // Hand the slot back to the producer
        self.read.value.store((read + 1) % N, Ordering::Release);

        Some(value)
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.read.value.load(Ordering::Relaxed) == self.write.value.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn is_full(&self) -> bool {
        let write = self.write.value.load(Ordering::Relaxed);
        (write + 1) % N == self.read.value.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        let read = self.read.value.load(Ordering::Relaxed);
        let write = self.write.value.load(Ordering::Relaxed);
        if write >= read {
            write - read
        } else {
            N - read + write
        }
    }
}

impl<T, const N: usize> Drop for Ring<T, N> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` - no producer or consumer is left
        while unsafe { self.pop() }.is_some() {}
    }
}

/// Lock-Free SPSC Ring Buffer with `N` slots (`N - 1` usable).
///
/// `is_empty`, `is_full` and `len` use Relaxed loads: while a producer or
/// consumer is running they are only a hint. After both sides are done
/// (threads joined, handles dropped) they are exact.
///
/// # Example
///
/// ```
/// use iris::core::RingBuffer;
///
/// let mut rb: RingBuffer<u32, 4> = RingBuffer::new();
/// assert!(rb.push(1));
/// assert!(rb.push(2));
/// assert!(rb.push(3));
/// assert!(!rb.push(4)); // 3 usable slots
///
/// let mut out = 0;
/// assert!(rb.pop(&mut out));
/// assert_eq!(out, 1);
/// ```
pub struct RingBuffer<T, const N: usize> {
    ring: Ring<T, N>,
    // `&RingBuffer` hands out `&T` (via Clone), so sharing it needs `T: Sync`
    _marker: PhantomData<T>,
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Create an empty ring buffer. `N` must be at least 2.
    ///
    /// The only allocation happens here.
    pub fn new() -> Self {
        Self {
            ring: Ring::new(),
            _marker: PhantomData,
        }
    }

    /// Push a value. Returns `false` if full, leaving the buffer unchanged.
    #[inline]
    pub fn push(&mut self, value: T) -> bool {
        // SAFETY: `&mut self` excludes every other producer
        unsafe { self.ring.push(value) }.is_ok()
    }

    /// Pop the oldest value into `out`. Returns `false` and leaves `out`
    /// untouched if empty.
    #[inline]
    pub fn pop(&mut self, out: &mut T) -> bool {
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
    pub fn try_pop(&mut self) -> Option<T> {
        // SAFETY: `&mut self` excludes every other consumer
        unsafe { self.ring.pop() }
    }

    /// Split into the two role handles for cross-thread use.
    ///
    /// The buffer stays mutably borrowed until both handles are dropped,
    /// so nothing else can touch it while the roles are live.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let ring = &self.ring;
        (Producer::new(ring), Consumer::new(ring))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Number of queued elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Usable capacity: `N - 1`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

/// Copies the queued elements into a fresh buffer with the same cursors.
///
/// Not thread-safe: copying is only meaningful while no producer or consumer
/// is active. Handles from [`RingBuffer::split`] hold a mutable borrow, so the
/// `&self` this needs cannot exist at the same time.
impl<T: Clone, const N: usize> Clone for RingBuffer<T, N> {
    fn clone(&self) -> Self {
        let copy = Ring::new();
        let read = self.ring.read.value.load(Ordering::Relaxed);
        let write = self.ring.write.value.load(Ordering::Relaxed);

        let mut index = read;
        while index != write {
            // SAFETY: slots in [read, write) are initialized and no handle is live
            let value = unsafe { (*self.ring.buffer[index].data.get()).assume_init_ref() }.clone();
            // SAFETY: `copy` is not shared yet
            unsafe {
                (*copy.buffer[index].data.get()).write(value);
            }
            index = (index + 1) % N;
        }

        // Cursors go last: if a clone above panics, `copy` still reads as empty
        copy.read.value.store(read, Ordering::Relaxed);
        copy.write.value.store(write, Ordering::Relaxed);

        Self {
            ring: copy,
            _marker: PhantomData,
        }
    }
}

impl<T, const N: usize> fmt::Debug for RingBuffer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("read", &self.ring.read.value.load(Ordering::Relaxed))
            .field("write", &self.ring.write.value.load(Ordering::Relaxed))
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

//! Core module: Lock-Free SPSC Ring Buffer
//!
//! Design principles:
//! - Lock-Free: only atomic loads/stores, no Mutex/RwLock, no parking
//! - No-Allocation: storage is allocated once in `new`
//! - One writer per cursor: `Producer`/`Consumer` handles from `split`

mod handle;
mod ring_buffer;

pub use handle::{Consumer, Producer};
pub use ring_buffer::RingBuffer;

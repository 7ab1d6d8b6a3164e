// src/buffer/mod.rs

//! Bounded circular byte buffers.
//!
//! Two layers:
//! - [`ring`] is the plain single-owner ring buffer: split read/write
//!   cursors, wrap-around, partial writes, closed-state semantics. No
//!   locking; mutation goes through `&mut self`.
//! - [`shared`] is the producer/consumer form of the same layout: one lock
//!   per role plus an atomic occupancy counter, with condition variables for
//!   "space free" and "data ready". This is what the stream pipe is built
//!   from.

pub mod ring;
pub mod shared;

pub use ring::RingBuffer;
pub use shared::{BufferReader, BufferWriter, pair};

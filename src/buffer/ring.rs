// src/buffer/ring.rs

use crate::errors::BufferError;

/// Fixed-capacity circular byte buffer with independent read and write
/// cursors.
///
/// Invariants:
/// - `rd_size() + wr_size() == capacity()` at all times.
/// - Both cursors stay in `[0, capacity)`; all cursor arithmetic is modulo
///   the capacity, which is fixed at construction.
/// - A write never overwrites unread data: if free space is short, only the
///   bytes that fit are written and the remainder is the caller's to retry.
///
/// Closing is one-way and idempotent. A closed buffer rejects writes but
/// still hands out the bytes buffered before the close; end-of-stream is the
/// explicit [`is_drained`](Self::is_drained) query, never an error.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    capacity: usize,
    /// Next byte to overwrite.
    write_pos: usize,
    /// Next byte to deliver.
    read_pos: usize,
    /// Unread bytes currently buffered.
    occupied: usize,
    closed: bool,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` unread bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a zero-capacity ring could never accept
    /// a byte.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be at least 1");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            capacity,
            write_pos: 0,
            read_pos: 0,
            occupied: 0,
            closed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of unread bytes available to `read`.
    pub fn rd_size(&self) -> usize {
        self.occupied
    }

    /// Number of bytes of free space available to `write`.
    pub fn wr_size(&self) -> usize {
        self.capacity - self.occupied
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once the buffer is closed and every buffered byte has been read.
    pub fn is_drained(&self) -> bool {
        self.closed && self.occupied == 0
    }

    /// Copy as many bytes from `data` as fit into free space, starting at
    /// the write cursor and wrapping around the end of storage.
    ///
    /// Returns the number of bytes written, which may be less than
    /// `data.len()` (including zero) when the buffer is near full. Fails if
    /// the buffer was closed.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, BufferError> {
        if self.closed {
            return Err(BufferError::Closed);
        }

        let n = data.len().min(self.wr_size());
        if n == 0 {
            return Ok(0);
        }

        let first = n.min(self.capacity - self.write_pos);
        self.storage[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        if n > first {
            self.storage[..n - first].copy_from_slice(&data[first..n]);
        }

        self.write_pos = (self.write_pos + n) % self.capacity;
        self.occupied += n;
        Ok(n)
    }

    /// Read up to `n` bytes, or everything currently available when `n` is
    /// `None`, advancing the read cursor.
    ///
    /// Reading from an empty buffer returns an empty vec immediately;
    /// blocking is layered by callers, not here.
    pub fn read(&mut self, n: Option<usize>) -> Vec<u8> {
        let want = match n {
            Some(n) => n.min(self.occupied),
            None => self.occupied,
        };
        if want == 0 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(want);
        let first = want.min(self.capacity - self.read_pos);
        out.extend_from_slice(&self.storage[self.read_pos..self.read_pos + first]);
        if want > first {
            out.extend_from_slice(&self.storage[..want - first]);
        }

        self.read_pos = (self.read_pos + want) % self.capacity;
        self.occupied -= want;
        out
    }

    /// Mark the buffer closed. Idempotent; buffered unread bytes survive.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

// src/buffer/shared.rs

//! Producer/consumer form of the ring buffer.
//!
//! Layout: one mutex per role plus an atomic occupancy counter.
//!
//! - The *write-side* lock guards the write cursor and the transition to
//!   closed.
//! - The *read-side* lock guards the read cursor.
//! - `occupied` is a single atomic, so `rd_size`/`wr_size` always come from
//!   one consistent snapshot and their sum is the capacity.
//!
//! Two condition variables complete the picture: `space_free` (waited on by
//! a blocked writer holding the write lock) and `data_ready` (waited on by a
//! blocked reader holding the read lock). A notifier briefly acquires the
//! *other* role's lock before signalling and never does so while holding its
//! own, which rules out both lock-order cycles and lost wakeups.
//!
//! Dropping either handle closes the ring, so an abandoned reader unblocks a
//! producer stuck on a full buffer and an abandoned writer reads as
//! end-of-stream.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::errors::BufferError;

/// Create a connected writer/reader pair sharing one ring of `capacity`
/// bytes.
///
/// # Panics
///
/// Panics if `capacity` is zero; a zero-capacity ring would block every
/// write forever.
pub fn pair(capacity: usize) -> (BufferWriter, BufferReader) {
    assert!(capacity > 0, "ring buffer capacity must be at least 1");
    let shared = Arc::new(Shared::new(capacity));
    (
        BufferWriter {
            shared: Arc::clone(&shared),
        },
        BufferReader { shared },
    )
}

struct Shared {
    storage: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    /// Unread bytes in the ring. Written with `Release` under the mutating
    /// role's lock, read with `Acquire` by the other role.
    occupied: AtomicUsize,
    closed: AtomicBool,
    /// Write cursor; also serializes the closed-flag transition.
    write_pos: Mutex<usize>,
    /// Read cursor.
    read_pos: Mutex<usize>,
    /// Signalled when the reader frees space or the ring closes.
    space_free: Condvar,
    /// Signalled when the writer commits bytes or the ring closes.
    data_ready: Condvar,
}

// SAFETY: the writer only touches bytes in the free region while holding
// `write_pos`, the reader only touches bytes in the occupied region while
// holding `read_pos`, and the regions are disjoint because `occupied` never
// exceeds `capacity`. The Release/Acquire pair on `occupied` orders the
// byte copies across threads.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

/// Lock acquisition that shrugs off poisoning: the protected state is a
/// bare cursor, which stays valid even if another thread panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn new(capacity: usize) -> Self {
        let storage: Vec<UnsafeCell<u8>> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Self {
            storage: storage.into_boxed_slice(),
            capacity,
            occupied: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            write_pos: Mutex::new(0),
            read_pos: Mutex::new(0),
            space_free: Condvar::new(),
            data_ready: Condvar::new(),
        }
    }

    fn base(&self) -> *mut u8 {
        // UnsafeCell<u8> is repr(transparent) over u8.
        self.storage.as_ptr() as *mut u8
    }

    /// Copy as many bytes as currently fit, starting at `pos`.
    ///
    /// Caller must hold `write_pos`. Returns bytes copied (possibly zero).
    fn copy_in(&self, pos: usize, data: &[u8]) -> usize {
        let free = self.capacity - self.occupied.load(Ordering::Acquire);
        let n = data.len().min(free);
        if n == 0 {
            return 0;
        }

        let first = n.min(self.capacity - pos);
        // SAFETY: holding `write_pos` makes this the only writer; the target
        // region is free space, which the reader never touches.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.base().add(pos), first);
            if n > first {
                std::ptr::copy_nonoverlapping(data.as_ptr().add(first), self.base(), n - first);
            }
        }
        n
    }

    /// Copy `n` bytes out starting at `pos`. Caller must hold `read_pos`
    /// and have verified `n <= occupied`.
    fn copy_out(&self, pos: usize, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        let first = n.min(self.capacity - pos);
        // SAFETY: holding `read_pos` makes this the only reader; the source
        // region holds committed bytes the writer will not overwrite until
        // `occupied` is decremented below.
        unsafe {
            std::ptr::copy_nonoverlapping(self.base().add(pos), out.as_mut_ptr(), first);
            if n > first {
                std::ptr::copy_nonoverlapping(self.base(), out.as_mut_ptr().add(first), n - first);
            }
        }
        out
    }

    /// Wake a reader blocked on `data_ready`. Must be called with no ring
    /// lock held.
    fn notify_data(&self) {
        let _guard = lock(&self.read_pos);
        self.data_ready.notify_all();
    }

    /// Wake a writer blocked on `space_free`. Must be called with no ring
    /// lock held.
    fn notify_space(&self) {
        let _guard = lock(&self.write_pos);
        self.space_free.notify_all();
    }

    fn close(&self) {
        {
            let _guard = lock(&self.write_pos);
            self.closed.store(true, Ordering::Release);
            self.space_free.notify_all();
        }
        {
            let _guard = lock(&self.read_pos);
            self.data_ready.notify_all();
        }
    }
}

/// Producer handle. Writes bytes into the ring and owns the close
/// transition.
pub struct BufferWriter {
    shared: Arc<Shared>,
}

impl BufferWriter {
    /// Write whatever fits right now and return the count, without
    /// blocking. Returns `Ok(0)` when the ring is full.
    pub fn try_write(&self, data: &[u8]) -> Result<usize, BufferError> {
        let shared = &self.shared;
        let n;
        {
            let mut pos = lock(&shared.write_pos);
            if shared.closed.load(Ordering::Acquire) {
                return Err(BufferError::Closed);
            }
            n = shared.copy_in(*pos, data);
            if n > 0 {
                *pos = (*pos + n) % shared.capacity;
                shared.occupied.fetch_add(n, Ordering::Release);
            }
        }
        if n > 0 {
            shared.notify_data();
        }
        Ok(n)
    }

    /// Write all of `data`, blocking on `space_free` whenever the ring is
    /// full. With a timeout the whole call is bounded by one deadline;
    /// without one the call blocks until the reader drains or the ring
    /// closes.
    pub fn write_all(&self, data: &[u8], timeout: Option<Duration>) -> Result<(), BufferError> {
        let shared = &self.shared;
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut written = 0;

        while written < data.len() {
            let committed;
            {
                let mut pos = lock(&shared.write_pos);
                loop {
                    if shared.closed.load(Ordering::Acquire) {
                        return Err(BufferError::Closed);
                    }
                    let n = shared.copy_in(*pos, &data[written..]);
                    if n > 0 {
                        *pos = (*pos + n) % shared.capacity;
                        shared.occupied.fetch_add(n, Ordering::Release);
                        committed = n;
                        break;
                    }
                    // Ring is full; wait for the reader to free space.
                    pos = match deadline {
                        Some(d) => {
                            let now = Instant::now();
                            if now >= d {
                                return Err(BufferError::Timeout);
                            }
                            let (guard, _timed_out) = shared
                                .space_free
                                .wait_timeout(pos, d - now)
                                .unwrap_or_else(|e| e.into_inner());
                            guard
                        }
                        None => shared
                            .space_free
                            .wait(pos)
                            .unwrap_or_else(|e| e.into_inner()),
                    };
                }
            }
            shared.notify_data();
            written += committed;
        }
        Ok(())
    }

    /// Close the ring. Idempotent; buffered bytes stay readable.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Unread bytes currently buffered.
    pub fn rd_size(&self) -> usize {
        self.shared.occupied.load(Ordering::Acquire)
    }

    /// Free space currently available.
    pub fn wr_size(&self) -> usize {
        self.shared.capacity - self.shared.occupied.load(Ordering::Acquire)
    }
}

impl Drop for BufferWriter {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Consumer handle. Reads never block; waiting is the explicit
/// [`wait_data`](Self::wait_data) call.
pub struct BufferReader {
    shared: Arc<Shared>,
}

impl BufferReader {
    /// Read up to `n` bytes, or everything available when `n` is `None`.
    /// Returns an empty vec immediately when nothing is buffered.
    pub fn read(&self, n: Option<usize>) -> Vec<u8> {
        let shared = &self.shared;
        let out;
        {
            let mut pos = lock(&shared.read_pos);
            let avail = shared.occupied.load(Ordering::Acquire);
            let want = match n {
                Some(n) => n.min(avail),
                None => avail,
            };
            if want == 0 {
                return Vec::new();
            }
            out = shared.copy_out(*pos, want);
            *pos = (*pos + want) % shared.capacity;
            shared.occupied.fetch_sub(want, Ordering::Release);
        }
        shared.notify_space();
        out
    }

    /// Block until at least one byte is readable or the ring is closed.
    ///
    /// Returns `true` when data is available. `false` means either
    /// end-of-stream (check [`is_eof`](Self::is_eof)) or an expired timeout.
    pub fn wait_data(&self, timeout: Option<Duration>) -> bool {
        let shared = &self.shared;
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut pos = lock(&shared.read_pos);
        loop {
            if shared.occupied.load(Ordering::Acquire) > 0 {
                return true;
            }
            if shared.closed.load(Ordering::Acquire) {
                return false;
            }
            pos = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return false;
                    }
                    let (guard, _timed_out) = shared
                        .data_ready
                        .wait_timeout(pos, d - now)
                        .unwrap_or_else(|e| e.into_inner());
                    guard
                }
                None => shared
                    .data_ready
                    .wait(pos)
                    .unwrap_or_else(|e| e.into_inner()),
            };
        }
    }

    /// True once the ring is closed and fully drained.
    pub fn is_eof(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
            && self.shared.occupied.load(Ordering::Acquire) == 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Unread bytes currently buffered.
    pub fn rd_size(&self) -> usize {
        self.shared.occupied.load(Ordering::Acquire)
    }

    /// Free space currently available.
    pub fn wr_size(&self) -> usize {
        self.shared.capacity - self.shared.occupied.load(Ordering::Acquire)
    }
}

impl Drop for BufferReader {
    fn drop(&mut self) {
        // Unblocks a producer stuck on a full ring.
        self.shared.close();
    }
}

// src/pipe.rs

//! Execution result channel: two byte channels (out/err) plus a
//! single-assignment exit-status cell.
//!
//! A producer (the process driver) writes command output into the channels,
//! records the exit status exactly once, and closes both channels with every
//! pending write already committed. The consumer (the execute API) drains
//! the channels and blocks on the status cell once both report
//! end-of-stream.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::buffer::shared::{self, BufferReader, BufferWriter};
use crate::entity::ExecOutput;
use crate::errors::PipeError;

/// How long the consumer sleeps between drain polls while both channels are
/// quiet. The buffer condition variables wake it early on any write.
const DRAIN_TICK: Duration = Duration::from_millis(10);

/// Create the two ends of an execution stream with `capacity`-byte channel
/// buffers.
pub fn stream_pipe(capacity: usize) -> (PipeProducer, PipeConsumer) {
    let status = Arc::new(StatusCell::new());
    let (out_w, out_r) = shared::pair(capacity);
    let (err_w, err_r) = shared::pair(capacity);

    (
        PipeProducer {
            stdout: out_w,
            stderr: err_w,
            sender: StatusSender {
                status: Arc::clone(&status),
            },
        },
        PipeConsumer {
            stdout: out_r,
            stderr: err_r,
            status,
        },
    )
}

/// Single-assignment exit-status slot with a blocking wait.
///
/// Also tracks whether the producer side is still alive, so a consumer is
/// never left waiting for a status that can no longer arrive.
struct StatusCell {
    slot: Mutex<StatusSlot>,
    ready: Condvar,
}

#[derive(Default)]
struct StatusSlot {
    code: Option<i32>,
    producer_gone: bool,
}

/// Outcome of a bounded wait on the status cell.
enum StatusWait {
    Code(i32),
    /// The producer went away without recording a status.
    ProducerGone,
    /// The wait's own deadline expired; the producer may still report.
    TimedOut,
}

impl StatusCell {
    fn new() -> Self {
        Self {
            slot: Mutex::new(StatusSlot::default()),
            ready: Condvar::new(),
        }
    }

    fn set(&self, code: i32) -> Result<(), PipeError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.code.is_some() {
            return Err(PipeError::StatusAlreadySet);
        }
        slot.code = Some(code);
        self.ready.notify_all();
        Ok(())
    }

    fn mark_producer_gone(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.producer_gone = true;
        self.ready.notify_all();
    }

    fn get(&self) -> Option<i32> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).code
    }

    /// Block until a status is recorded, the producer goes away, or
    /// `timeout` expires, whichever comes first.
    fn wait(&self, timeout: Option<Duration>) -> StatusWait {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(code) = slot.code {
                return StatusWait::Code(code);
            }
            if slot.producer_gone {
                return StatusWait::ProducerGone;
            }
            slot = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return StatusWait::TimedOut;
                    }
                    let (guard, _timed_out) = self
                        .ready
                        .wait_timeout(slot, d - now)
                        .unwrap_or_else(|e| e.into_inner());
                    guard
                }
                None => self.ready.wait(slot).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

/// Producer side of an execution stream.
///
/// Dropping the producer without [`finish`](Self::finish) closes both
/// channels (buffered bytes stay readable) and the consumer's status wait
/// reports the missing status instead of hanging.
pub struct PipeProducer {
    /// Write handle for the out-channel.
    pub stdout: BufferWriter,
    /// Write handle for the err-channel.
    pub stderr: BufferWriter,
    sender: StatusSender,
}

impl PipeProducer {
    /// Record the exit status, then close both channels.
    ///
    /// Writes issued before this call are already committed in the buffers,
    /// so the consumer never observes the close with bytes missing, and it
    /// always finds the status once it sees both channels closed.
    pub fn finish(self, exit_code: i32) -> Result<(), PipeError> {
        debug!(exit_code, "finishing execution stream");
        self.sender.send(exit_code)?;
        self.stdout.close();
        self.stderr.close();
        Ok(())
    }

    /// Split into independently owned writers plus a status sender, for
    /// drivers that pump stdout and stderr from separate threads.
    ///
    /// Each writer closes its channel on drop, so the producer contract
    /// holds as long as the status is sent after the pump threads are
    /// joined.
    pub fn into_parts(self) -> (BufferWriter, BufferWriter, StatusSender) {
        (self.stdout, self.stderr, self.sender)
    }
}

/// Detached handle for recording the exit status once.
pub struct StatusSender {
    status: Arc<StatusCell>,
}

impl StatusSender {
    pub fn send(&self, exit_code: i32) -> Result<(), PipeError> {
        self.status.set(exit_code)
    }
}

impl Drop for StatusSender {
    fn drop(&mut self) {
        self.status.mark_producer_gone();
    }
}

/// Consumer side of an execution stream.
pub struct PipeConsumer {
    /// Read handle for the out-channel.
    pub stdout: BufferReader,
    /// Read handle for the err-channel.
    pub stderr: BufferReader,
    status: Arc<StatusCell>,
}

impl PipeConsumer {
    /// Exit status, if the producer has recorded one yet.
    pub fn exit_status(&self) -> Option<i32> {
        self.status.get()
    }

    /// Block until the exit status is recorded. Returns `None` when the
    /// producer went away without one, or when `timeout` expires first.
    pub fn wait_exit(&self, timeout: Option<Duration>) -> Option<i32> {
        match self.status.wait(timeout) {
            StatusWait::Code(code) => Some(code),
            StatusWait::ProducerGone | StatusWait::TimedOut => None,
        }
    }

    /// Drain both channels to end-of-stream and return the collected
    /// output together with the exit status.
    ///
    /// Both channels are serviced in one loop: with the producer pumping
    /// stdout and stderr from separate threads, neither channel filling up
    /// can starve the other. `deadline`, if given, bounds the whole drain.
    pub fn collect(self, deadline: Option<Instant>) -> Result<ExecOutput, PipeError> {
        let mut out = Vec::new();
        let mut err = Vec::new();

        loop {
            if let Some(d) = deadline
                && Instant::now() >= d
            {
                return Err(PipeError::DrainTimeout);
            }

            let mut progressed = false;

            let chunk = self.stdout.read(None);
            if !chunk.is_empty() {
                out.extend_from_slice(&chunk);
                progressed = true;
            }
            let chunk = self.stderr.read(None);
            if !chunk.is_empty() {
                err.extend_from_slice(&chunk);
                progressed = true;
            }

            if self.stdout.is_eof() && self.stderr.is_eof() {
                break;
            }

            if !progressed {
                self.stdout.wait_data(Some(DRAIN_TICK));
            }
        }

        // The channels may hit end-of-stream long before the command ends
        // (a child can close its pipes and linger), so the status wait is
        // bounded by the same deadline and its expiry is a drain timeout,
        // not a missing status.
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        match self.status.wait(remaining) {
            StatusWait::Code(code) => {
                debug!(
                    exit_code = code,
                    stdout_bytes = out.len(),
                    stderr_bytes = err.len(),
                    "execution stream drained"
                );
                Ok(ExecOutput {
                    stdout: out,
                    stderr: err,
                    exit_code: code,
                })
            }
            StatusWait::ProducerGone => Err(PipeError::MissingStatus),
            StatusWait::TimedOut => Err(PipeError::DrainTimeout),
        }
    }
}

// src/errors.rs

//! Crate-wide error types.
//!
//! The typed enums below cover the failure taxonomy of the execution core:
//!
//! - [`BufferError`]: lifecycle errors on the ring-buffer pipe (writing to a
//!   closed buffer, timing out while blocked on a full one).
//! - [`PipeError`]: stream-pipe lifecycle errors (exit status set twice,
//!   stream closed without a status, drain deadline exceeded).
//! - [`ExecError`]: per-invocation execution failures (spawn, transport,
//!   timeout) as surfaced by entities and the repeated executor.
//!
//! Higher-level glue (config loading, logging setup) uses `anyhow` instead,
//! so we re-export its `Error`/`Result` here as the single import point.

use std::time::Duration;

pub use anyhow::{Error, Result};

/// Errors raised by the buffer layer.
///
/// Note that reading past the last byte of a closed, fully-drained buffer is
/// *not* an error; end-of-stream is detected via the explicit
/// closed-and-empty query.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// The buffer was closed before (or while) writing.
    #[error("write on closed buffer")]
    Closed,

    /// A blocking write waited for free space longer than its timeout.
    #[error("timed out waiting for buffer space")]
    Timeout,
}

/// Lifecycle errors of a stream pipe (two channels + exit-status cell).
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// The exit-status cell is single-assignment; a second set is rejected.
    #[error("exit status already set")]
    StatusAlreadySet,

    /// Both channels closed but no exit status was ever recorded
    /// (the producer was dropped without finishing).
    #[error("stream closed without an exit status")]
    MissingStatus,

    /// The consumer's drain deadline expired before the stream closed.
    #[error("timed out draining execution stream")]
    DrainTimeout,
}

/// Failures of a single execute invocation against an entity.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The command process could not be started at all.
    #[error("failed to spawn command")]
    Spawn(#[source] std::io::Error),

    /// The transport to the entity failed (connection dropped, worker
    /// thread died, ...).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The invocation exceeded its per-call timeout. Distinct from the
    /// repeat-sequence TTL, which ends the sequence without an error.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

// src/lib.rs

//! Uniform command execution against heterogeneous hosts.
//!
//! The crate has three layers:
//!
//! - [`buffer`]: bounded circular byte buffers, including the dual-lock
//!   producer/consumer form.
//! - [`pipe`]: the execution result channel (out/err buffers plus a
//!   single-assignment exit-status cell) connecting a process driver to the
//!   execute API.
//! - [`entity`] and [`exec`]: execution targets behind one trait, and the
//!   repeated-execution schedule (count, interval, TTL) on top of them.
//!
//! A one-shot run looks like:
//!
//! ```no_run
//! use std::sync::Arc;
//! use hostlink::{LocalShell, RepeatOptions, execute_repeated};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let host = Arc::new(LocalShell::new());
//! let mut run = execute_repeated(host, "echo hello", RepeatOptions::default());
//! while let Some(result) = run.next().await {
//!     let output = result?;
//!     print!("{}", output.stdout_lossy());
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod entity;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipe;

pub use buffer::{BufferReader, BufferWriter, RingBuffer};
pub use entity::{Entity, ExecOutput, LocalShell};
pub use errors::{BufferError, ExecError, PipeError};
pub use exec::{RepeatOptions, RepeatRun, TimeoutPolicy, execute_repeated};
pub use pipe::{PipeConsumer, PipeProducer, StatusSender, stream_pipe};

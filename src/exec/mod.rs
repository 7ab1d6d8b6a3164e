// src/exec/mod.rs

//! Repeated-execution layer.
//!
//! This module drives N (or unbounded) invocations of an entity's
//! single-shot execute operation, honoring a fixed inter-iteration interval
//! and an overall time-to-live.
//!
//! - [`repeat`] owns the iteration state machine and the two consumption
//!   modes: an inline lazy sequence pulled with `next().await`, and a
//!   background loop feeding an `mpsc` channel the caller polls.

pub mod repeat;

pub use repeat::{RepeatOptions, RepeatRun, TimeoutPolicy, execute_repeated};

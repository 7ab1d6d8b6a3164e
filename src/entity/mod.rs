// src/entity/mod.rs

//! Execution targets ("entities").
//!
//! An entity is an addressable host (the local OS now, remote shells over
//! other transports later) exposing one uniform operation: run a command
//! line, get back stdout, stderr, and an exit code.
//!
//! - [`Entity`] is the trait every target implements.
//! - [`local`] drives the platform shell on the local machine through the
//!   stream pipe.

pub mod local;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ExecError;

pub use local::LocalShell;

/// Result of one command invocation against an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout as text, with invalid UTF-8 replaced.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as text, with invalid UTF-8 replaced.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// An addressable execution target.
///
/// `execute` runs a single command line and resolves once the command has
/// terminated (or failed to). `timeout` bounds this one invocation; it is
/// distinct from the TTL that bounds a whole repeated sequence.
#[async_trait]
pub trait Entity: Send + Sync {
    /// Name of the target, used in log fields.
    fn name(&self) -> &str;

    async fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecOutput, ExecError>;
}

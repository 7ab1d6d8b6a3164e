// src/entity/local.rs

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::buffer::shared::BufferWriter;
use crate::entity::{Entity, ExecOutput};
use crate::errors::{ExecError, PipeError};
use crate::pipe::stream_pipe;

/// Default per-channel buffer capacity for local executions.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// How often the reaper thread polls the child for exit.
const REAP_TICK: Duration = Duration::from_millis(10);

/// The local machine as an execution target.
///
/// Commands run through the platform shell (`cmd /C` on Windows, `sh -c`
/// elsewhere). Output is streamed through a stream pipe: one pump thread
/// per channel feeds the ring buffers while the calling side drains them,
/// so output larger than the buffer capacity flows without loss.
pub struct LocalShell {
    name: String,
    buffer_capacity: usize,
}

impl LocalShell {
    pub fn new() -> Self {
        Self {
            name: "local".to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Override the per-channel buffer capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Entity for LocalShell {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecOutput, ExecError> {
        let entity = self.name.clone();
        let command = command.to_string();
        let capacity = self.buffer_capacity;

        tokio::task::spawn_blocking(move || run_shell(&entity, &command, capacity, timeout))
            .await
            .map_err(|err| ExecError::Transport(format!("executor thread failed: {err}")))?
    }
}

/// Run one shell command to completion, streaming its output through a
/// stream pipe. Blocking; called from `spawn_blocking`.
fn run_shell(
    entity: &str,
    command: &str,
    capacity: usize,
    timeout: Option<Duration>,
) -> Result<ExecOutput, ExecError> {
    info!(entity, command, "executing command");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(ExecError::Spawn)?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (producer, consumer) = stream_pipe(capacity);
    let (out_w, err_w, status_tx) = producer.into_parts();

    let pump_out = spawn_pump(stdout, out_w, "stdout");
    let pump_err = spawn_pump(stderr, err_w, "stderr");

    let child = Arc::new(Mutex::new(child));

    // Reaper: poll the child for exit, join the pumps (their writers close
    // the channels with every byte committed), then record the status.
    {
        let child = Arc::clone(&child);
        let entity = entity.to_string();
        thread::spawn(move || {
            let code = loop {
                {
                    let mut guard = child.lock().unwrap_or_else(|e| e.into_inner());
                    match guard.try_wait() {
                        Ok(Some(status)) => break status.code().unwrap_or(-1),
                        Ok(None) => {}
                        Err(err) => {
                            warn!(entity = %entity, error = %err, "failed to poll child process");
                            break -1;
                        }
                    }
                }
                thread::sleep(REAP_TICK);
            };

            if let Some(h) = pump_out {
                let _ = h.join();
            }
            if let Some(h) = pump_err {
                let _ = h.join();
            }

            if status_tx.send(code).is_err() {
                debug!(entity = %entity, "exit status already recorded");
            }
        });
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    match consumer.collect(deadline) {
        Ok(output) => {
            info!(
                entity,
                command,
                exit_code = output.exit_code,
                success = output.success(),
                "command exited"
            );
            Ok(output)
        }
        Err(PipeError::DrainTimeout) => {
            warn!(entity, command, ?timeout, "command timed out; killing process");
            if let Err(err) = child.lock().unwrap_or_else(|e| e.into_inner()).kill() {
                debug!(entity, error = %err, "kill after timeout failed (already exited?)");
            }
            Err(ExecError::Timeout(timeout.unwrap_or_default()))
        }
        Err(err) => Err(ExecError::Transport(err.to_string())),
    }
}

/// Spawn a thread copying one child output channel into its ring buffer.
///
/// The writer is dropped (closing the channel) when the child's pipe hits
/// end-of-file, or earlier if the consumer went away.
fn spawn_pump(
    src: Option<impl Read + Send + 'static>,
    writer: BufferWriter,
    channel: &'static str,
) -> Option<thread::JoinHandle<()>> {
    let mut src = src?;

    Some(thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match src.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(err) = writer.write_all(&buf[..n], None) {
                        debug!(channel, error = %err, "stream consumer gone; stopping pump");
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(channel, error = %err, "error reading child output");
                    break;
                }
            }
        }
    }))
}

// src/exec/repeat.rs

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::entity::{Entity, ExecOutput};
use crate::errors::ExecError;

/// What a single-iteration timeout does to the rest of the sequence.
///
/// This has to be an explicit choice: a timeout is a failure of one
/// invocation, and whether the schedule keeps going is policy, not accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// A timed-out iteration aborts the sequence (default).
    Abort,
    /// A timed-out iteration is yielded as an error and the schedule
    /// continues.
    Continue,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy::Abort
    }
}

impl FromStr for TimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(TimeoutPolicy::Abort),
            "continue" => Ok(TimeoutPolicy::Continue),
            other => Err(format!(
                "invalid on_timeout policy: {other} (expected \"abort\" or \"continue\")"
            )),
        }
    }
}

/// Parameters of one repeated-execution session.
#[derive(Debug, Clone)]
pub struct RepeatOptions {
    /// Number of invocations. Negative means unbounded; zero yields nothing.
    pub count: i64,

    /// Fixed interval between iteration *starts*. The schedule is
    /// clock-aligned: the next iteration begins at
    /// `last_iteration_start + interval`, keeping the period stable under
    /// variable work duration.
    pub interval: Duration,

    /// Time-to-live for the whole sequence, measured from the first
    /// iteration. `None` means unbounded.
    pub ttl: Option<Duration>,

    /// Per-invocation timeout, passed through to the entity. Distinct from
    /// `ttl`.
    pub timeout: Option<Duration>,

    /// What a single-iteration timeout does to the sequence.
    pub on_timeout: TimeoutPolicy,
}

impl Default for RepeatOptions {
    fn default() -> Self {
        Self {
            count: 1,
            interval: Duration::ZERO,
            ttl: None,
            timeout: None,
            on_timeout: TimeoutPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Init,
    Running,
    Done,
    Aborted,
}

/// A lazy sequence of command invocations against one entity.
///
/// Pull results with [`next`](Self::next) (inline mode), or hand the whole
/// loop to the runtime with [`spawn`](Self::spawn) and poll the returned
/// channel (background mode). Dropping the run (or the channel receiver) is
/// the cooperative cancellation point; an in-flight iteration is never
/// preempted.
///
/// With unbounded count *and* unbounded TTL the sequence is infinite and the
/// caller must supply its own stopping condition.
pub struct RepeatRun<E: ?Sized> {
    entity: Arc<E>,
    command: String,
    opts: RepeatOptions,
    state: RunState,
    /// Iterations left when `opts.count` is bounded.
    remaining: i64,
    /// Absolute TTL deadline, recorded at the first iteration.
    deadline: Option<Instant>,
    /// Clock-aligned start of the next iteration.
    next_at: Option<Instant>,
}

/// Entry point for repeated execution; equivalent to [`RepeatRun::new`].
pub fn execute_repeated<E>(
    entity: Arc<E>,
    command: impl Into<String>,
    opts: RepeatOptions,
) -> RepeatRun<E>
where
    E: Entity + ?Sized + 'static,
{
    RepeatRun::new(entity, command, opts)
}

impl<E> RepeatRun<E>
where
    E: Entity + ?Sized + 'static,
{
    pub fn new(entity: Arc<E>, command: impl Into<String>, opts: RepeatOptions) -> Self {
        let remaining = opts.count;
        Self {
            entity,
            command: command.into(),
            opts,
            state: RunState::Init,
            remaining,
            deadline: None,
            next_at: None,
        }
    }

    /// True once the sequence has ended, normally or by abort.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Done | RunState::Aborted)
    }

    /// Run the next iteration and yield its result.
    ///
    /// Returns `None` when the sequence is exhausted: count reached zero,
    /// TTL expired, or a previous iteration aborted the run. Exhaustion is
    /// never signalled through an error.
    pub async fn next(&mut self) -> Option<Result<ExecOutput, ExecError>> {
        match self.state {
            RunState::Done | RunState::Aborted => return None,
            RunState::Init => {
                if self.opts.count == 0 {
                    debug!(command = %self.command, "count is zero; nothing to run");
                    self.state = RunState::Done;
                    return None;
                }
                self.deadline = self.opts.ttl.map(|ttl| Instant::now() + ttl);
                self.state = RunState::Running;
                info!(
                    entity = %self.entity.name(),
                    command = %self.command,
                    count = self.opts.count,
                    interval = ?self.opts.interval,
                    ttl = ?self.opts.ttl,
                    "starting repeated execution"
                );
            }
            RunState::Running => {
                if let Some(at) = self.next_at {
                    sleep_until(at).await;
                }
            }
        }

        let iter_start = Instant::now();
        let result = self
            .entity
            .execute(&self.command, self.opts.timeout)
            .await;

        let fatal = match &result {
            Ok(output) => {
                debug!(
                    command = %self.command,
                    exit_code = output.exit_code,
                    "iteration completed"
                );
                false
            }
            Err(ExecError::Timeout(_)) if self.opts.on_timeout == TimeoutPolicy::Continue => {
                warn!(command = %self.command, "iteration timed out; continuing per policy");
                false
            }
            Err(err) => {
                error!(command = %self.command, error = %err, "iteration failed; aborting sequence");
                true
            }
        };
        if fatal {
            self.state = RunState::Aborted;
            return Some(result);
        }

        if self.opts.count > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                debug!(command = %self.command, "iteration count exhausted");
                self.state = RunState::Done;
            }
        }

        if self.state == RunState::Running
            && let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            debug!(command = %self.command, "ttl reached; ending sequence");
            self.state = RunState::Done;
        }

        if self.state == RunState::Running {
            self.next_at = Some(iter_start + self.opts.interval);
        }

        Some(result)
    }

    /// Run the sequence on a background task and return the channel the
    /// caller polls.
    ///
    /// The loop stops on its own when the sequence ends, and cooperatively
    /// as soon as the receiver is dropped.
    pub fn spawn(mut self) -> mpsc::Receiver<Result<ExecOutput, ExecError>> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            while let Some(result) = self.next().await {
                if tx.send(result).await.is_err() {
                    debug!(
                        command = %self.command,
                        "result receiver dropped; stopping background execution"
                    );
                    break;
                }
            }
        });

        rx
    }
}

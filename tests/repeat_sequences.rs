use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hostlink::errors::ExecError;
use hostlink::{Entity, ExecOutput, RepeatOptions, TimeoutPolicy, execute_repeated};

/// Entity whose invocations follow a fixed script; calls beyond the script
/// succeed with exit code 0.
#[derive(Clone, Copy)]
enum Step {
    Succeed(i32),
    Fail,
    TimeOut,
}

struct Scripted {
    steps: Vec<Step>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
        })
    }

    fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Entity for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        _command: &str,
        _timeout: Option<Duration>,
    ) -> Result<ExecOutput, ExecError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.get(call).copied().unwrap_or(Step::Succeed(0)) {
            Step::Succeed(code) => Ok(ExecOutput {
                stdout: format!("iteration {call}\n").into_bytes(),
                stderr: Vec::new(),
                exit_code: code,
            }),
            Step::Fail => Err(ExecError::Transport("connection lost".into())),
            Step::TimeOut => Err(ExecError::Timeout(Duration::from_secs(1))),
        }
    }
}

#[tokio::test]
async fn bounded_count_yields_exactly_that_many() {
    let entity = Scripted::always_ok();
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 10,
            ..Default::default()
        },
    );

    let mut results = 0;
    while let Some(result) = run.next().await {
        let output = result.expect("iteration failed");
        assert_eq!(output.exit_code, 0);
        results += 1;
    }

    assert_eq!(results, 10);
    assert_eq!(entity.calls(), 10);
    assert!(run.is_finished());
    assert!(run.next().await.is_none());
}

#[tokio::test]
async fn count_zero_yields_nothing() {
    let entity = Scripted::always_ok();
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 0,
            ..Default::default()
        },
    );

    assert!(run.next().await.is_none());
    assert!(run.is_finished());
    assert_eq!(entity.calls(), 0);
}

#[tokio::test]
async fn unbounded_run_stops_when_caller_breaks() {
    let entity = Scripted::always_ok();
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: -1,
            ..Default::default()
        },
    );

    for _ in 0..10 {
        let result = run.next().await.expect("unbounded run ended by itself");
        result.expect("iteration failed");
    }
    drop(run);

    assert_eq!(entity.calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn interval_is_clock_aligned() {
    let entity = Scripted::always_ok();
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 3,
            interval: Duration::from_secs(5),
            ..Default::default()
        },
    );

    let started = tokio::time::Instant::now();
    while let Some(result) = run.next().await {
        result.expect("iteration failed");
    }
    let elapsed = started.elapsed();

    // Iterations start at t=0, t=5, t=10.
    assert!(elapsed >= Duration::from_secs(10), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn ttl_cuts_an_unbounded_sequence() {
    let entity = Scripted::always_ok();
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: -1,
            interval: Duration::from_secs(1),
            ttl: Some(Duration::from_millis(2500)),
            ..Default::default()
        },
    );

    let mut results = 0;
    while let Some(result) = run.next().await {
        result.expect("iteration failed");
        results += 1;
    }

    // Starts at t=0,1,2,3; the TTL check after the t=3 iteration ends the
    // run.
    assert_eq!(results, 4);
    assert!(run.is_finished());
}

#[tokio::test]
async fn fatal_error_aborts_the_sequence() {
    let entity = Scripted::new(vec![Step::Succeed(0), Step::Fail]);
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 5,
            ..Default::default()
        },
    );

    let first = run.next().await.expect("missing first result");
    assert!(first.is_ok());

    let second = run.next().await.expect("missing second result");
    assert!(matches!(second, Err(ExecError::Transport(_))));

    // Aborted: no retries, no further iterations.
    assert!(run.next().await.is_none());
    assert!(run.is_finished());
    assert_eq!(entity.calls(), 2);
}

#[tokio::test]
async fn timeout_aborts_by_default() {
    let entity = Scripted::new(vec![Step::TimeOut]);
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 3,
            ..Default::default()
        },
    );

    let first = run.next().await.expect("missing first result");
    assert!(matches!(first, Err(ExecError::Timeout(_))));
    assert!(run.next().await.is_none());
    assert_eq!(entity.calls(), 1);
}

#[tokio::test]
async fn timeout_continue_policy_keeps_the_schedule() {
    let entity = Scripted::new(vec![Step::Succeed(0), Step::TimeOut, Step::Succeed(0)]);
    let mut run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 3,
            on_timeout: TimeoutPolicy::Continue,
            ..Default::default()
        },
    );

    assert!(run.next().await.expect("first").is_ok());
    assert!(matches!(
        run.next().await.expect("second"),
        Err(ExecError::Timeout(_))
    ));
    assert!(run.next().await.expect("third").is_ok());
    assert!(run.next().await.is_none());
    assert_eq!(entity.calls(), 3);
}

#[tokio::test]
async fn background_mode_delivers_all_results() {
    let entity = Scripted::always_ok();
    let run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: 5,
            ..Default::default()
        },
    );

    let mut rx = run.spawn();
    let mut results = 0;
    while let Some(result) = rx.recv().await {
        result.expect("iteration failed");
        results += 1;
    }

    assert_eq!(results, 5);
    assert_eq!(entity.calls(), 5);
}

#[tokio::test]
async fn background_mode_stops_when_receiver_drops() {
    let entity = Scripted::always_ok();
    let run = execute_repeated(
        Arc::clone(&entity),
        "probe",
        RepeatOptions {
            count: -1,
            ..Default::default()
        },
    );

    let mut rx = run.spawn();
    for _ in 0..10 {
        rx.recv().await.expect("stream ended early").expect("iteration failed");
    }
    drop(rx);

    // Let the background task notice the dropped receiver and stop.
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    let settled = entity.calls();
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(entity.calls(), settled);
}

#[tokio::test]
async fn works_through_a_trait_object() {
    let entity: Arc<dyn Entity> = Scripted::always_ok();
    let mut run = execute_repeated(entity, "probe", RepeatOptions::default());

    let output = run
        .next()
        .await
        .expect("missing result")
        .expect("iteration failed");
    assert!(output.success());
    assert!(run.next().await.is_none());
}

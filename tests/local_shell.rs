#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use hostlink::errors::ExecError;
use hostlink::{Entity, LocalShell, RepeatOptions, execute_repeated};

#[tokio::test]
async fn echo_round_trip() {
    let host = LocalShell::new();
    let output = host
        .execute("echo hello", None)
        .await
        .expect("execute failed");

    assert_eq!(output.stdout_lossy(), "hello\n");
    assert!(output.stderr.is_empty());
    assert_eq!(output.exit_code, 0);
    assert!(output.success());
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let host = LocalShell::new();
    let output = host.execute("exit 7", None).await.expect("execute failed");

    assert_eq!(output.exit_code, 7);
    assert!(!output.success());
}

#[tokio::test]
async fn stderr_is_captured_separately() {
    let host = LocalShell::new();
    let output = host
        .execute("echo oops >&2", None)
        .await
        .expect("execute failed");

    assert!(output.stdout.is_empty());
    assert_eq!(output.stderr_lossy(), "oops\n");
    assert_eq!(output.exit_code, 0);
}

#[tokio::test]
async fn unknown_command_fails_inside_the_shell() {
    // The shell itself spawns fine; the failure surfaces as its exit code.
    let host = LocalShell::new();
    let output = host
        .execute("definitely-not-a-command-7f3a", None)
        .await
        .expect("execute failed");

    assert_eq!(output.exit_code, 127);
}

#[tokio::test]
async fn output_larger_than_buffer_capacity_streams_through() {
    // 1 KiB channels force the pump threads to block while the consumer
    // drains; nothing may be lost or reordered.
    let host = LocalShell::new().with_capacity(1024);
    let output = host
        .execute("seq 1 20000", None)
        .await
        .expect("execute failed");

    assert_eq!(output.exit_code, 0);
    let text = output.stdout_lossy();
    assert_eq!(text.lines().count(), 20000);
    assert!(text.starts_with("1\n2\n"));
    assert!(text.ends_with("19999\n20000\n"));
}

#[tokio::test]
async fn timeout_kills_a_hanging_command() {
    let host = LocalShell::new();
    let started = Instant::now();

    let err = host
        .execute("sleep 30", Some(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn timeout_applies_when_child_closes_its_pipes_and_lingers() {
    // The child sheds both output pipes immediately, so the channels hit
    // end-of-stream long before the deadline while the process itself keeps
    // running. This must still be a timeout, and the child must be killed.
    let host = LocalShell::new();
    let started = Instant::now();

    let err = host
        .execute("exec 1>&- 2>&-; sleep 30", Some(Duration::from_millis(300)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn repeated_shell_execution_end_to_end() {
    let host = Arc::new(LocalShell::new());
    let mut run = execute_repeated(
        host,
        "echo tick",
        RepeatOptions {
            count: 3,
            ..Default::default()
        },
    );

    let mut outputs = Vec::new();
    while let Some(result) = run.next().await {
        outputs.push(result.expect("iteration failed"));
    }

    assert_eq!(outputs.len(), 3);
    for output in outputs {
        assert_eq!(output.stdout_lossy(), "tick\n");
        assert_eq!(output.exit_code, 0);
    }
}

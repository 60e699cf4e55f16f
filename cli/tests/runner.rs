//! # Detonator Runner Integration Tests
//!
//! File: cli/tests/runner.rs
//!
//! ## Overview
//!
//! Exercises the library API the way a tool screen does: blocking probes,
//! streaming listeners cancelled by pid, and launch failures. Real processes
//! are simulated with `sh`, so no security tooling needs to be installed.
//! Unix-only (signals).
//!
#![cfg(unix)]

mod common;
use common::{test_runner, wait_for_exit};
use detonator::{
    common::process::{OutputAggregator, SIGTERM},
    Outcome, ProcessEvent, ProcessId, RunnerError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PORT_SCAN_LINE: &str = "Connection to 10.0.0.5 80 port [tcp/*] succeeded!";

/// Stand-in for `nc -z 10.0.0.5 80`: nc reports the result on stderr.
fn fake_port_scan() -> Vec<String> {
    vec![
        "-c".to_string(),
        format!("echo '{}' >&2", PORT_SCAN_LINE),
    ]
}

#[tokio::test]
async fn test_port_scan_blocking_output_is_exact() {
    let runner = test_runner();
    let output = runner.run_blocking("sh", fake_port_scan()).await.unwrap();
    assert_eq!(output, PORT_SCAN_LINE);
}

#[tokio::test]
async fn test_port_scan_streaming_is_success() {
    let runner = test_runner();
    let mut scan = runner.run_streaming("sh", fake_port_scan()).await.unwrap();

    let mut fragments = Vec::new();
    let mut terminations = Vec::new();
    let result = scan
        .drive(
            |f| fragments.push(f.text.clone()),
            |end| terminations.push(*end),
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(terminations.len(), 1);
    assert_eq!(fragments, vec![PORT_SCAN_LINE.to_string()]);
    assert_eq!(scan.output(), PORT_SCAN_LINE);
}

#[tokio::test]
async fn test_listener_cancelled_after_100ms() {
    let runner = test_runner();
    // Long-running "listener" that keeps printing until killed.
    let mut listener = runner
        .run_streaming("sh", ["-c", "echo listening; while true; do sleep 0.05; done"])
        .await
        .unwrap();
    let pid = listener.id();

    tokio::time::sleep(Duration::from_millis(100)).await;
    runner.cancel(pid).unwrap();

    let mut events = Vec::new();
    while let Some(event) = listener.next_event().await {
        events.push(event);
    }

    let termination_positions: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, ProcessEvent::Terminated(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(termination_positions, vec![events.len() - 1]);

    let Some(ProcessEvent::Terminated(result)) = events.last() else {
        panic!("last event must be the termination");
    };
    assert_eq!(result.signal, Some(SIGTERM));
    assert_eq!(result.outcome, Outcome::ManualTermination);
    assert_eq!(result.message(), "Process was manually terminated.");
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_double_cancel_is_harmless() {
    let runner = test_runner();
    let mut inv = runner.run_streaming("sleep", ["30"]).await.unwrap();
    let pid = inv.id();

    runner.cancel(pid).unwrap();
    // Still registered until the exit is observed; a second request is a no-op.
    let _ = runner.cancel(pid);
    let result = inv.wait().await.unwrap();
    assert_eq!(result.outcome, Outcome::ManualTermination);

    let before = runner.registry().len();
    assert!(matches!(
        runner.cancel(pid),
        Err(RunnerError::UnknownProcess { .. })
    ));
    assert_eq!(runner.registry().len(), before);
}

#[tokio::test]
async fn test_cancel_unknown_pid_is_error_not_panic() {
    let runner = test_runner();
    let err = runner.cancel(ProcessId::from_raw(u32::MAX)).unwrap_err();
    assert!(matches!(err, RunnerError::UnknownProcess { .. }));
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_nonexistent_binary_is_launch_error() {
    let runner = test_runner();
    let err = runner
        .run_streaming("detonator-definitely-missing", ["--help"])
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Launch { .. }));
    assert!(runner.registry().is_empty());

    let err = runner
        .run_blocking("detonator-definitely-missing", Vec::<String>::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Launch { .. }));
}

#[tokio::test]
async fn test_abnormal_exit_message_contains_code_and_signal() {
    let runner = test_runner();
    let mut inv = runner.run_streaming("sh", ["-c", "exit 2"]).await.unwrap();
    let result = inv.wait().await.unwrap();
    assert_eq!(result.outcome, Outcome::AbnormalExit);
    assert_eq!(
        result.message(),
        "Process terminated with exit code: 2 and signal code: none"
    );
}

#[tokio::test]
async fn test_kill_signal_is_abnormal_not_manual() {
    let runner = test_runner();
    let mut inv = runner
        .run_streaming("sh", ["-c", "kill -9 $$"])
        .await
        .unwrap();
    let result = inv.wait().await.unwrap();
    assert_eq!(result.signal, Some(9));
    assert_eq!(result.outcome, Outcome::AbnormalExit);
    assert!(result.message().contains("signal code: 9"));
}

#[tokio::test]
async fn test_runners_have_isolated_registries() {
    let a = test_runner();
    let b = test_runner();
    let mut inv = a.run_streaming("sleep", ["30"]).await.unwrap();

    assert!(a.registry().contains(inv.id()));
    assert!(!b.registry().contains(inv.id()));
    assert!(b.cancel(inv.id()).is_err());

    a.cancel(inv.id()).unwrap();
    inv.wait().await.unwrap();
}

#[tokio::test]
async fn test_caller_side_aggregation_from_another_task() {
    let runner = test_runner();
    let mut inv = runner
        .run_streaming("sh", ["-c", "for i in 1 2 3; do echo line$i; sleep 0.02; done"])
        .await
        .unwrap();

    // Caller state updated from the consumer task, as a UI would.
    let shared = Arc::new(Mutex::new(OutputAggregator::new()));
    let sink = Arc::clone(&shared);
    let consumer = tokio::spawn(async move {
        inv.drive(
            move |f| {
                sink.lock().unwrap().append(&f.text);
            },
            |_| {},
        )
        .await
    });

    let result = consumer.await.unwrap().unwrap();
    assert!(result.is_success());
    assert_eq!(shared.lock().unwrap().text(), "line1\nline2\nline3");
}

#[tokio::test]
async fn test_cancel_is_not_starved_by_output_flood() {
    let runner = test_runner();
    let mut flood = runner
        .run_streaming("yes", ["flood-line"])
        .await
        .unwrap();

    runner.cancel(flood.id()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), flood.wait())
        .await
        .expect("flooding process was never terminated")
        .unwrap();

    assert_eq!(result.outcome, Outcome::ManualTermination);
    assert_eq!(result.signal, Some(SIGTERM));
    assert!(runner.registry().is_empty());
}

#[tokio::test]
async fn test_cancel_terminates_shell_wrapped_tool() {
    let runner = test_runner();
    // `sh -c` wrapper around the real tool, which keeps the pipes open.
    let mut wrapped = runner
        .run_streaming("sh", ["-c", "sleep 31337 & echo $!; wait"])
        .await
        .unwrap();

    let tool_pid: i32 = match wrapped.next_event().await {
        Some(ProcessEvent::Fragment(f)) => f.text.trim().parse().unwrap(),
        other => panic!("expected the tool's pid first, got {other:?}"),
    };

    runner.cancel(wrapped.id()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), wrapped.wait())
        .await
        .expect("wrapper was never terminated")
        .unwrap();

    assert_eq!(result.outcome, Outcome::ManualTermination);
    assert!(
        wait_for_exit(tool_pid, Duration::from_secs(5)),
        "tool {tool_pid} outlived its cancelled wrapper"
    );
}

#[tokio::test]
async fn test_cancel_between_exit_and_termination_event() {
    let runner = detonator::CommandRunner::new(detonator::RunnerSettings {
        initial_output_window: Duration::from_millis(50),
        drain_timeout: Duration::from_millis(1000),
        ..Default::default()
    });
    // `sh` exits at once; the background sleep holds the pipes through the drain.
    let mut inv = runner
        .run_streaming("sh", ["-c", "sleep 3 & echo x"])
        .await
        .unwrap();
    let pid = inv.id();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!inv.is_finished());
    assert!(matches!(
        runner.cancel(pid),
        Err(RunnerError::UnknownProcess { .. })
    ));

    let result = inv.wait().await.unwrap();
    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.signal, None);
}

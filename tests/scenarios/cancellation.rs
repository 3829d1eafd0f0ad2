//! Test: Cancellation - stopping a run mid-stage

use crate::helpers::*;
use pipeline_runtime::core::{Config, Stage, Step};
use pipeline_runtime::{Runtime, RuntimeError, RunStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn long_running() -> Config {
    Config::new(vec![
        Stage::new(
            "test",
            vec![Step::new("integration", "rust"), Step::new("unit", "rust")],
        ),
        Stage::new("deploy", vec![Step::new("deploy", "alpine")]),
    ])
}

/// Cancelling kills running steps and stops later stages
#[tokio::test]
async fn test_cancel_mid_stage() {
    let engine = MockEngine::new().hanging("integration");
    let runtime = Runtime::new(long_running(), engine.clone());
    let cancel = runtime.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = runtime.run().await;
    assert_eq!(result, Err(RuntimeError::Cancelled));
    assert_eq!(RunStatus::of(&result), RunStatus::Cancelled);

    assert_eq!(engine.count(&Event::Kill("integration".to_string())), 1);
    // Finished steps are not killed
    assert_eq!(engine.count(&Event::Kill("unit".to_string())), 0);
    assert!(!engine.executed().contains(&"deploy".to_string()));
    assert_eq!(engine.count(&Event::Destroy), 1);
    assert_eq!(engine.count(&Event::Close), 1);
}

/// A detached step still running at cancellation is killed too
#[tokio::test]
async fn test_cancel_kills_detached_steps() {
    let engine = MockEngine::new().hanging("test");
    let config = Config::new(vec![
        Stage::new("services", vec![Step::new("db", "postgres:16").detached()]),
        Stage::new("test", vec![Step::new("test", "rust")]),
    ]);
    let token = CancellationToken::new();
    let runtime = Runtime::new(config, engine.clone()).with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    assert_eq!(runtime.run().await, Err(RuntimeError::Cancelled));
    assert_eq!(engine.count(&Event::Kill("db".to_string())), 1);
    assert_eq!(engine.count(&Event::Kill("test".to_string())), 1);
}

/// A run cancelled before it starts never sets up but still tears down
#[tokio::test]
async fn test_cancel_before_start() {
    let engine = MockEngine::new();
    let runtime = Runtime::new(long_running(), engine.clone());
    runtime.cancellation_token().cancel();

    assert_eq!(runtime.run().await, Err(RuntimeError::Cancelled));
    assert_eq!(engine.events(), vec![Event::Destroy, Event::Close]);
}

fn wide_stage(width: usize) -> Config {
    let steps = (0..width)
        .map(|i| Step::new(format!("shard-{}", i), "rust"))
        .collect();
    Config::new(vec![Stage::new("shards", steps)])
}

/// Cancelling while setup runs starts no step, even with worker threads racing
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_during_setup_starts_nothing() {
    for _ in 0..100 {
        let token = CancellationToken::new();
        let engine = MockEngine::new().cancel_on(Event::Setup, token.clone());
        let result = Runtime::new(wide_stage(8), engine.clone())
            .with_cancellation(token)
            .run()
            .await;

        assert_eq!(result, Err(RuntimeError::Cancelled));
        assert!(engine.executed().is_empty(), "started after cancellation: {:?}", engine.executed());
        assert_eq!(engine.count(&Event::Destroy), 1);
    }
}

/// Cancelling as a stage finishes keeps the next stage from starting
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_at_stage_boundary() {
    let token = CancellationToken::new();
    let engine = MockEngine::new().cancel_on(Event::Wait("build".to_string()), token.clone());

    let result = Runtime::new(ci_config(), engine.clone())
        .with_cancellation(token)
        .run()
        .await;

    assert_eq!(result, Err(RuntimeError::Cancelled));
    assert_eq!(engine.executed(), vec!["build"]);
}

/// A step whose start is interrupted by cancellation is still killed
#[tokio::test]
async fn test_cancel_during_exec_kills_step() {
    let token = CancellationToken::new();
    let engine = MockEngine::new()
        .stalled_exec("deploy")
        .cancel_on(Event::Exec("deploy".to_string()), token.clone());
    let config = Config::new(vec![Stage::new("deploy", vec![Step::new("deploy", "alpine")])]);

    let result = Runtime::new(config, engine.clone())
        .with_cancellation(token)
        .run()
        .await;

    assert_eq!(result, Err(RuntimeError::Cancelled));
    assert_eq!(engine.count(&Event::Kill("deploy".to_string())), 1);
    assert!(engine.position(&Event::Kill("deploy".to_string())) < engine.position(&Event::Destroy));
}

//! Test: Hooks - tracer snapshots and logger streams

use crate::helpers::*;
use pipeline_runtime::core::{Config, Stage, Step};
use pipeline_runtime::{Runtime, RuntimeError};
use std::sync::Arc;

/// The tracer sees each step before and after it runs
#[tokio::test]
async fn test_tracer_called_pre_then_post() {
    let engine = MockEngine::new().with_exit("test", 7);
    let tracer = RecordingTracer::new();

    let runtime = Runtime::new(ci_config(), engine).with_tracer(Arc::new(tracer.clone()));
    let run_id = runtime.run_id();
    runtime.run().await.unwrap_err();

    let test = tracer.for_step("test");
    assert_eq!(test.len(), 2);
    assert!(test[0].process.is_none());
    assert_eq!(test[1].process.map(|p| p.exit_code), Some(7));
    assert!(test.iter().all(|s| s.run_id == run_id));

    // The failure is visible to steps of later stages
    let notify = tracer.for_step("notify");
    assert!(notify[0].failed());
    assert_eq!(notify[0].error.as_ref().and_then(|e| e.step_name()), Some("test"));

    let started_at = tracer.snapshots()[0].started_at;
    assert!(tracer.snapshots().iter().all(|s| s.started_at == started_at));
}

/// A tracer skip prevents the step from starting
#[tokio::test]
async fn test_tracer_skip_prevents_exec() {
    let engine = MockEngine::new();
    let tracer = RecordingTracer::skipping(&["lint"]);

    let result = Runtime::new(ci_config(), engine.clone())
        .with_tracer(Arc::new(tracer.clone()))
        .run()
        .await;

    assert!(result.is_ok());
    assert!(!engine.executed().contains(&"lint".to_string()));
    assert_eq!(tracer.for_step("lint").len(), 1);
}

/// A tracer abort fails the step without starting it
#[tokio::test]
async fn test_tracer_abort_fails_step() {
    let engine = MockEngine::new();
    let tracer = RecordingTracer::aborting(&["build"]);

    let result = Runtime::new(ci_config(), engine.clone())
        .with_tracer(Arc::new(tracer))
        .run()
        .await;

    assert_eq!(
        result,
        Err(RuntimeError::Trace {
            step: "build".to_string(),
            message: "blocked by policy".to_string()
        })
    );
    assert!(!engine.executed().contains(&"build".to_string()));
}

/// Gated steps never reach the tracer
#[tokio::test]
async fn test_gated_step_is_not_traced() {
    let engine = MockEngine::new().with_exit("build", 1);
    let tracer = RecordingTracer::new();
    let config = Config::new(vec![
        Stage::new("build", vec![Step::new("build", "rust")]),
        Stage::new(
            "deploy",
            vec![Step::new("deploy", "alpine")
                .with_run_policy(pipeline_runtime::RunPolicy::OnSuccess)],
        ),
    ]);

    Runtime::new(config, engine)
        .with_tracer(Arc::new(tracer.clone()))
        .run()
        .await
        .unwrap_err();
    assert!(tracer.for_step("deploy").is_empty());
}

/// The logger receives each step's output
#[tokio::test]
async fn test_logger_receives_output() {
    let engine = MockEngine::new()
        .with_output("build", "Compiling app v0.1.0\nFinished\n")
        .with_output("test", "test result: ok\n");
    let logger = CollectingLogger::new();

    Runtime::new(ci_config(), engine.clone())
        .with_logger(Arc::new(logger.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(
        logger.output_of("build").await.as_deref(),
        Some("Compiling app v0.1.0\nFinished\n")
    );
    assert_eq!(logger.output_of("test").await.as_deref(), Some("test result: ok\n"));
    assert_eq!(engine.count(&Event::Tail("notify".to_string())), 1);
}

/// Without a logger no output stream is opened
#[tokio::test]
async fn test_no_logger_no_tail() {
    let engine = MockEngine::new();
    let config = Config::new(vec![Stage::new("build", vec![Step::new("build", "rust")])]);

    Runtime::new(config, engine.clone()).run().await.unwrap();
    assert_eq!(engine.count(&Event::Tail("build".to_string())), 0);
}

//! Test doubles for driving the runtime without a container daemon

use async_trait::async_trait;
use pipeline_runtime::backend::{Engine, EngineError, LogStream};
use pipeline_runtime::core::{Config, PipelineState, ProcessState, Stage, Step};
use pipeline_runtime::execution::{Logger, TraceError, Tracer};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Backend call recorded by [`MockEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Setup,
    Exec(String),
    Tail(String),
    Wait(String),
    Kill(String),
    Destroy,
    Close,
}

#[derive(Default)]
struct MockState {
    events: Vec<Event>,
    outcomes: HashMap<String, ProcessState>,
    exec_failures: HashSet<String>,
    stalled_execs: HashSet<String>,
    delays: HashMap<String, Duration>,
    hanging: HashSet<String>,
    output: HashMap<String, String>,
    cancel_on: Vec<(Event, CancellationToken)>,
    setup_fails: bool,
    destroy_fails: bool,
}

/// Engine that records every call and reports scripted outcomes
///
/// Clones share state, so a test can keep a handle after giving one to the
/// runtime. Steps exit with code 0 unless scripted otherwise.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit(self, step: &str, code: i64) -> Self {
        self.with_outcome(step, ProcessState::exited(code))
    }

    pub fn with_oom(self, step: &str, code: i64) -> Self {
        self.with_outcome(step, ProcessState::oom_killed(code))
    }

    pub fn with_outcome(self, step: &str, process: ProcessState) -> Self {
        self.state.lock().unwrap().outcomes.insert(step.to_string(), process);
        self
    }

    /// Make the step's exec fail with a missing image
    pub fn failing_exec(self, step: &str) -> Self {
        self.state.lock().unwrap().exec_failures.insert(step.to_string());
        self
    }

    /// Make the step's exec never return
    pub fn stalled_exec(self, step: &str) -> Self {
        self.state.lock().unwrap().stalled_execs.insert(step.to_string());
        self
    }

    pub fn failing_setup(self) -> Self {
        self.state.lock().unwrap().setup_fails = true;
        self
    }

    pub fn failing_destroy(self) -> Self {
        self.state.lock().unwrap().destroy_fails = true;
        self
    }

    /// Delay the step's wait by `delay`
    pub fn with_delay(self, step: &str, delay: Duration) -> Self {
        self.state.lock().unwrap().delays.insert(step.to_string(), delay);
        self
    }

    /// Make the step's wait never return
    pub fn hanging(self, step: &str) -> Self {
        self.state.lock().unwrap().hanging.insert(step.to_string());
        self
    }

    pub fn with_output(self, step: &str, output: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .output
            .insert(step.to_string(), output.to_string());
        self
    }

    /// Cancel `token` as soon as `event` is recorded
    pub fn cancel_on(self, event: Event, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on.push((event, token));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Names of executed steps in call order
    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Exec(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Index of the first occurrence of `event`
    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{:?} was never recorded", event))
    }

    fn record(&self, event: Event) {
        let mut state = self.state.lock().unwrap();
        for (trigger, token) in &state.cancel_on {
            if *trigger == event {
                token.cancel();
            }
        }
        state.events.push(event);
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn setup(&self, _config: &Config) -> Result<(), EngineError> {
        self.record(Event::Setup);
        if self.state.lock().unwrap().setup_fails {
            return Err(EngineError::Internal("network create failed".to_string()));
        }
        Ok(())
    }

    async fn exec(&self, step: &Step) -> Result<(), EngineError> {
        self.record(Event::Exec(step.name.clone()));
        let (fails, stalls) = {
            let state = self.state.lock().unwrap();
            (
                state.exec_failures.contains(&step.name),
                state.stalled_execs.contains(&step.name),
            )
        };
        if stalls {
            std::future::pending::<()>().await;
        }
        if fails {
            return Err(EngineError::ImageNotFound(step.image.clone()));
        }
        Ok(())
    }

    async fn wait(&self, step: &Step) -> Result<ProcessState, EngineError> {
        let (delay, hang) = {
            let state = self.state.lock().unwrap();
            (
                state.delays.get(&step.name).copied(),
                state.hanging.contains(&step.name),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.record(Event::Wait(step.name.clone()));
        let outcome = self.state.lock().unwrap().outcomes.get(&step.name).copied();
        Ok(outcome.unwrap_or(ProcessState::exited(0)))
    }

    async fn tail(&self, step: &Step) -> Result<LogStream, EngineError> {
        self.record(Event::Tail(step.name.clone()));
        let output = self
            .state
            .lock()
            .unwrap()
            .output
            .get(&step.name)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(std::io::Cursor::new(output.into_bytes())))
    }

    async fn kill(&self, step: &Step) -> Result<(), EngineError> {
        self.record(Event::Kill(step.name.clone()));
        Ok(())
    }

    async fn destroy(&self, _config: &Config) -> Result<(), EngineError> {
        self.record(Event::Destroy);
        if self.state.lock().unwrap().destroy_fails {
            return Err(EngineError::Teardown(vec!["volume cache: in use".to_string()]));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(Event::Close);
        Ok(())
    }
}

/// Tracer that records every snapshot and can skip or abort chosen steps
#[derive(Clone, Default)]
pub struct RecordingTracer {
    snapshots: Arc<Mutex<Vec<PipelineState>>>,
    skip: Arc<HashSet<String>>,
    abort: Arc<HashSet<String>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipping(steps: &[&str]) -> Self {
        Self {
            skip: Arc::new(steps.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn aborting(steps: &[&str]) -> Self {
        Self {
            abort: Arc::new(steps.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn snapshots(&self) -> Vec<PipelineState> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Snapshots for one step, in call order
    pub fn for_step(&self, name: &str) -> Vec<PipelineState> {
        self.snapshots()
            .into_iter()
            .filter(|s| s.step.name == name)
            .collect()
    }
}

impl Tracer for RecordingTracer {
    fn trace(&self, state: &PipelineState) -> Result<(), TraceError> {
        self.snapshots.lock().unwrap().push(state.clone());
        if state.process.is_none() && self.skip.contains(&state.step.name) {
            return Err(TraceError::Skip);
        }
        if state.process.is_none() && self.abort.contains(&state.step.name) {
            return Err(TraceError::Abort("blocked by policy".to_string()));
        }
        Ok(())
    }
}

/// Logger that collects each step's full output
#[derive(Clone, Default)]
pub struct CollectingLogger {
    output: Arc<Mutex<HashMap<String, String>>>,
}

impl CollectingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of a step once its stream has been fully consumed
    pub async fn output_of(&self, step: &str) -> Option<String> {
        for _ in 0..100 {
            let text = self.output.lock().unwrap().get(step).cloned();
            if text.is_some() {
                return text;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }
}

#[async_trait]
impl Logger for CollectingLogger {
    async fn log(&self, step: &Step, mut stream: LogStream) {
        let mut text = String::new();
        let _ = stream.read_to_string(&mut text).await;
        self.output.lock().unwrap().insert(step.name.clone(), text);
    }
}

/// build -> [test, lint] -> notify
pub fn ci_config() -> Config {
    Config::new(vec![
        Stage::new("build", vec![Step::new("build", "rust:1.80")]),
        Stage::new(
            "check",
            vec![Step::new("test", "rust:1.80"), Step::new("lint", "rust:1.80")],
        ),
        Stage::new("report", vec![Step::new("notify", "alpine")]),
    ])
}

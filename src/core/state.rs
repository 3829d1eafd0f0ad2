//! Execution state models

use crate::core::step::Step;
use crate::execution::RuntimeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Idle,
    /// Stages are executing
    Running,
    /// Every stage behaved as expected
    Completed,
    /// The run was cancelled before all stages completed
    Cancelled,
    /// Setup or a step failed
    Failed,
}

impl RunStatus {
    /// Terminal status for the result of a run
    pub fn of(result: &Result<(), RuntimeError>) -> Self {
        match result {
            Ok(()) => RunStatus::Completed,
            Err(RuntimeError::Cancelled) => RunStatus::Cancelled,
            Err(_) => RunStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed
        )
    }
}

/// Terminal outcome of one step as reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    /// The process has terminated
    pub exited: bool,

    /// Process exit code
    pub exit_code: i64,

    /// The process was killed by the out-of-memory killer
    pub oom_killed: bool,
}

impl ProcessState {
    /// A process that exited with the given code
    pub fn exited(exit_code: i64) -> Self {
        Self {
            exited: true,
            exit_code,
            oom_killed: false,
        }
    }

    /// A process killed by the out-of-memory killer
    pub fn oom_killed(exit_code: i64) -> Self {
        Self {
            exited: true,
            exit_code,
            oom_killed: true,
        }
    }

    pub fn success(&self) -> bool {
        !self.oom_killed && self.exit_code == 0
    }
}

/// Snapshot handed to the tracer before and after each step
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Run identifier
    pub run_id: Uuid,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// The step being evaluated
    pub step: Step,

    /// Accumulated pipeline error at dispatch time
    pub error: Option<RuntimeError>,

    /// Process outcome; `None` before the step has been waited on
    pub process: Option<ProcessState>,
}

impl PipelineState {
    /// Whether the pipeline was in a failure posture when the step was dispatched
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether this snapshot was taken after the step finished
    pub fn is_post_execution(&self) -> bool {
        self.process.is_some()
    }
}

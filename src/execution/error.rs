//! Runtime error taxonomy

use crate::backend::EngineError;
use thiserror::Error;

/// Errors produced by a pipeline run
///
/// Errors are cloneable so the accumulated pipeline error can be handed to
/// every step task of the next stage by value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("pipeline setup failed: {0}")]
    Setup(#[source] EngineError),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("step {step}: failed to start: {source}")]
    Start { step: String, source: EngineError },

    #[error("step {step}: failed to open logs: {source}")]
    Tail { step: String, source: EngineError },

    #[error("step {step}: failed waiting for completion: {source}")]
    Wait { step: String, source: EngineError },

    #[error("step {name}: exit code {code}")]
    Exit { name: String, code: i64 },

    #[error("step {name}: killed by the out-of-memory killer (exit code {code})")]
    Oom { name: String, code: i64 },

    #[error("step {name}: timed out after {secs} seconds")]
    Timeout { name: String, secs: u64 },

    #[error("step {step}: trace aborted: {message}")]
    Trace { step: String, message: String },

    #[error("stage {stage}: step task panicked: {message}")]
    Panicked { stage: String, message: String },
}

impl RuntimeError {
    /// Name of the step the error belongs to, if it is step-scoped
    pub fn step_name(&self) -> Option<&str> {
        match self {
            RuntimeError::Start { step, .. }
            | RuntimeError::Tail { step, .. }
            | RuntimeError::Wait { step, .. }
            | RuntimeError::Trace { step, .. } => Some(step),
            RuntimeError::Exit { name, .. }
            | RuntimeError::Oom { name, .. }
            | RuntimeError::Timeout { name, .. } => Some(name),
            RuntimeError::Setup(_) | RuntimeError::Cancelled | RuntimeError::Panicked { .. } => {
                None
            }
        }
    }

    /// Exit code carried by exit and OOM errors
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            RuntimeError::Exit { code, .. } | RuntimeError::Oom { code, .. } => Some(*code),
            _ => None,
        }
    }
}

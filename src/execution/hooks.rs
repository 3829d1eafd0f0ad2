//! Observation hooks invoked by the runtime
//!
//! Both hooks are optional. A [`Tracer`] sees a [`PipelineState`] snapshot
//! before and after every executed step; calls for concurrent steps of the
//! same stage may interleave, so implementations own any serialization they
//! need. A [`Logger`] receives each step's output stream on its own task.

use crate::backend::LogStream;
use crate::core::{PipelineState, Step};
use async_trait::async_trait;
use thiserror::Error;

/// Signal returned by a tracer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// Skip the step without running it; not a failure
    #[error("step skipped by tracer")]
    Skip,

    /// Abort the step with the given reason
    #[error("{0}")]
    Abort(String),
}

/// Called before and after each executed step
pub trait Tracer: Send + Sync {
    fn trace(&self, state: &PipelineState) -> Result<(), TraceError>;
}

impl<F> Tracer for F
where
    F: Fn(&PipelineState) -> Result<(), TraceError> + Send + Sync,
{
    fn trace(&self, state: &PipelineState) -> Result<(), TraceError> {
        self(state)
    }
}

/// Consumes a step's output stream until it closes
#[async_trait]
pub trait Logger: Send + Sync {
    async fn log(&self, step: &Step, stream: LogStream);
}

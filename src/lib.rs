//! pipeline-runtime - staged container pipelines over pluggable backends

pub mod backend;
pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use backend::{DockerConfig, DockerEngine, Engine, EngineError, LogStream};
pub use crate::core::{Config, PipelineState, ProcessState, RunPolicy, RunStatus, Stage, Step};
pub use execution::{Logger, Runtime, RuntimeError, TraceError, Tracer};

//! Container backends
//!
//! The [`Engine`] trait is the only capability boundary between the runtime
//! and a concrete container runtime. The runtime never depends on a concrete
//! backend, so any type implementing the trait (including test doubles) can
//! drive a pipeline.

pub mod docker;
pub mod error;

use crate::core::{Config, ProcessState, Step};
use async_trait::async_trait;
use tokio::io::AsyncRead;

pub use docker::{DockerConfig, DockerEngine};
pub use error::EngineError;

/// Live step output with stdout and stderr merged; dropping it closes the stream
pub type LogStream = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for container backends
///
/// Cancelling an in-flight call is done by dropping its future, so
/// implementations should release any per-call resources on drop.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Provision shared resources (volumes, networks) before any step runs
    async fn setup(&self, config: &Config) -> Result<(), EngineError>;

    /// Start the step; returns once the step is running, not when it completes
    async fn exec(&self, step: &Step) -> Result<(), EngineError>;

    /// Wait for a started step to terminate and report how it ended
    async fn wait(&self, step: &Step) -> Result<ProcessState, EngineError>;

    /// Open the step's combined output stream
    async fn tail(&self, step: &Step) -> Result<LogStream, EngineError>;

    /// Forcibly terminate a running step
    async fn kill(&self, step: &Step) -> Result<(), EngineError>;

    /// Tear down everything `setup` created plus any remaining step resources
    ///
    /// Best effort: a failed removal must not stop the remaining removals.
    async fn destroy(&self, config: &Config) -> Result<(), EngineError>;

    /// Release the backend's own resources; called once, after `destroy`
    async fn close(&self) -> Result<(), EngineError>;
}

//! Pipeline execution runtime

pub mod error;
pub mod executor;
pub mod hooks;
pub mod runtime;

pub use error::RuntimeError;
pub use executor::{StepExecutor, StepOutcome};
pub use hooks::{Logger, TraceError, Tracer};
pub use runtime::Runtime;

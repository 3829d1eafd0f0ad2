//! Backend error types

use thiserror::Error;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("`{command}` exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("unexpected backend response: {0}")]
    Protocol(String),

    #[error("teardown incomplete: {}", .0.join("; "))]
    Teardown(Vec<String>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the error reports a resource that does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            EngineError::ImageNotFound(_) => true,
            EngineError::Command { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("no such") || stderr.contains("not found")
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

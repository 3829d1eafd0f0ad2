//! Parsing of `docker inspect` container state

use crate::backend::EngineError;
use crate::core::ProcessState;
use serde::Deserialize;

/// Go template printing a container's `.State` as JSON
pub const STATE_FORMAT: &str = "{{json .State}}";

#[derive(Debug, Deserialize)]
struct ContainerState {
    #[serde(rename = "Running", default)]
    running: bool,

    #[serde(rename = "ExitCode", default)]
    exit_code: i64,

    #[serde(rename = "OOMKilled", default)]
    oom_killed: bool,
}

/// Parse the output of `docker inspect --format '{{json .State}}'`
pub fn parse_state(json: &str) -> Result<ProcessState, EngineError> {
    let state: ContainerState = serde_json::from_str(json.trim())
        .map_err(|e| EngineError::Protocol(format!("invalid container state: {}", e)))?;

    Ok(ProcessState {
        exited: !state.running,
        exit_code: state.exit_code,
        oom_killed: state.oom_killed,
    })
}

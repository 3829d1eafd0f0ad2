//! Conditional execution policy for steps

use serde::{Deserialize, Serialize};

/// When a step is eligible to run, given the pipeline outcome so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPolicy {
    /// Run regardless of earlier failures
    #[default]
    Always,
    /// Run only while every earlier stage has succeeded
    OnSuccess,
    /// Run only after an earlier stage has failed
    OnFailure,
}

impl RunPolicy {
    /// Build a policy from the legacy `run_on_success` / `run_on_failure` flags
    ///
    /// Returns `None` when both flags are false, since such a step could never run.
    pub fn from_flags(on_success: bool, on_failure: bool) -> Option<Self> {
        match (on_success, on_failure) {
            (true, true) => Some(RunPolicy::Always),
            (true, false) => Some(RunPolicy::OnSuccess),
            (false, true) => Some(RunPolicy::OnFailure),
            (false, false) => None,
        }
    }

    pub fn runs_on_success(self) -> bool {
        matches!(self, RunPolicy::Always | RunPolicy::OnSuccess)
    }

    pub fn runs_on_failure(self) -> bool {
        matches!(self, RunPolicy::Always | RunPolicy::OnFailure)
    }

    /// Check whether a step with this policy runs given the pipeline posture
    pub fn permits(self, pipeline_failed: bool) -> bool {
        if pipeline_failed {
            self.runs_on_failure()
        } else {
            self.runs_on_success()
        }
    }
}

impl std::fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPolicy::Always => write!(f, "always"),
            RunPolicy::OnSuccess => write!(f, "on-success"),
            RunPolicy::OnFailure => write!(f, "on-failure"),
        }
    }
}

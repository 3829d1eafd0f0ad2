//! Step domain model

use crate::core::condition::RunPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single containerized unit of work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Step name, also used as the backend container name
    pub name: String,

    /// Container image reference
    pub image: String,

    /// When to pull the image
    pub pull: PullPolicy,

    /// Entrypoint override; the first element is the executable
    pub entrypoint: Vec<String>,

    /// Command arguments
    pub command: Vec<String>,

    /// Working directory inside the container
    pub working_dir: Option<String>,

    /// Plain environment variables
    pub environment: BTreeMap<String, String>,

    /// Secrets exposed to the container as environment variables
    pub secrets: Vec<Secret>,

    /// Registry credentials used when pulling the image
    pub auth: Option<AuthConfig>,

    /// Networks to attach after the container is created
    pub networks: Vec<NetworkAttachment>,

    /// Explicit network mode (e.g. "host"); disables network attachment
    pub network_mode: Option<String>,

    /// Volume binds in `source:target[:mode]` form
    pub volumes: Vec<String>,

    /// Conditional execution policy
    pub run_policy: RunPolicy,

    /// Fire-and-forget: started but never awaited
    pub detached: bool,

    /// Upper bound on how long the runtime waits for the step
    pub timeout_secs: Option<u64>,
}

impl Step {
    /// Create a step with the given name and image and default settings
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_run_policy(mut self, policy: RunPolicy) -> Self {
        self.run_policy = policy;
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Legacy flag view of the run policy
    pub fn run_on_success(&self) -> bool {
        self.run_policy.runs_on_success()
    }

    /// Legacy flag view of the run policy
    pub fn run_on_failure(&self) -> bool {
        self.run_policy.runs_on_failure()
    }

    /// Whether registry credentials with a password were supplied
    pub fn has_credentials(&self) -> bool {
        self.auth
            .as_ref()
            .is_some_and(|auth| !auth.username.is_empty() && !auth.password.is_empty())
    }
}

/// Image pull policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullPolicy {
    /// Pull before every start
    Always,
    /// Pull only when the image is missing locally
    #[default]
    IfNotPresent,
    /// Never pull; a missing image fails the step
    Never,
}

/// Registry credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// Registry host; derived from the image when absent
    pub server: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// A secret exposed to the step as an environment variable
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    /// Environment variable name inside the container
    pub name: String,
    pub value: String,
}

impl Secret {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Attachment of a step to a declared network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    pub name: String,

    #[serde(default)]
    pub aliases: Vec<String>,
}

//! Pipeline configuration from YAML

use crate::core::{
    condition::RunPolicy,
    pipeline::{Config, Network, Stage, Volume},
    step::{AuthConfig, NetworkAttachment, PullPolicy, Secret, Step},
};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Volumes shared by the steps
    #[serde(default)]
    pub volumes: Vec<Volume>,

    /// Networks shared by the steps
    #[serde(default)]
    pub networks: Vec<Network>,

    /// Stages in execution order
    pub stages: Vec<StageConfig>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step name, unique across the pipeline
    pub name: String,

    /// Container image
    pub image: String,

    #[serde(default)]
    pub pull: PullPolicy,

    #[serde(default)]
    pub entrypoint: Vec<String>,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub secrets: Vec<SecretConfig>,

    #[serde(default)]
    pub auth: Option<AuthEntry>,

    #[serde(default)]
    pub networks: Vec<NetworkAttachment>,

    #[serde(default)]
    pub network_mode: Option<String>,

    /// Volume binds (`volume:/path` or `/host/path:/path`)
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Run policy; mutually exclusive with the legacy flags below
    #[serde(default)]
    pub when: Option<RunPolicy>,

    #[serde(default)]
    pub run_on_success: Option<bool>,

    #[serde(default)]
    pub run_on_failure: Option<bool>,

    /// Start the step without waiting for it
    #[serde(default)]
    pub detached: bool,

    /// Maximum time to wait for the step (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Secret definition: a literal value or an environment variable of the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Variable name inside the container
    pub name: String,

    #[serde(default, skip_serializing)]
    pub value: Option<String>,

    #[serde(default)]
    pub from_env: Option<String>,
}

/// Registry credentials as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEntry {
    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    #[serde(default)]
    pub server: Option<String>,
}

fn name_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$"))
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Invalid step name pattern: {}", e))
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let mut stage_names = HashSet::new();
        for stage in &self.stages {
            if !stage_names.insert(&stage.name) {
                anyhow::bail!("Duplicate stage name: {}", stage.name);
            }
        }

        let pattern = name_pattern()?;
        let volume_names: HashSet<&str> = self.volumes.iter().map(|v| v.name.as_str()).collect();

        // Step names double as container names, so they are unique pipeline-wide
        let mut step_names = HashSet::new();
        for step in self.stages.iter().flat_map(|stage| stage.steps.iter()) {
            if !step_names.insert(&step.name) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }
            if !pattern.is_match(&step.name) {
                anyhow::bail!(
                    "Step name '{}' must start with a letter or digit and contain only [a-zA-Z0-9_.-]",
                    step.name
                );
            }
            if step.image.trim().is_empty() {
                anyhow::bail!("Step '{}' has no image", step.name);
            }

            step.run_policy()?;

            for bind in &step.volumes {
                let source = bind.split(':').next().unwrap_or_default();
                let is_host_path = source.starts_with('/') || source.starts_with('.');
                if !is_host_path && !volume_names.contains(source) {
                    anyhow::bail!(
                        "Step '{}' mounts undeclared volume '{}'",
                        step.name,
                        source
                    );
                }
            }

            for secret in &step.secrets {
                if secret.value.is_some() == secret.from_env.is_some() {
                    anyhow::bail!(
                        "Secret '{}' of step '{}' needs exactly one of `value` or `from_env`",
                        secret.name,
                        step.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Convert the configuration into the runtime model
    ///
    /// Secrets sourced from the environment are resolved here.
    pub fn to_config(&self) -> Result<Config> {
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                let steps = stage
                    .steps
                    .iter()
                    .map(StepConfig::to_step)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Stage::new(stage.name.clone(), steps))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Config {
            stages,
            volumes: self.volumes.clone(),
            networks: self.networks.clone(),
        })
    }

    /// Total number of steps across all stages
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }
}

impl StepConfig {
    /// Resolve the run policy from `when` or the legacy flags
    ///
    /// An unset legacy flag counts as true, so a step runs unless explicitly excluded.
    pub fn run_policy(&self) -> Result<RunPolicy> {
        let has_flags = self.run_on_success.is_some() || self.run_on_failure.is_some();
        match self.when {
            Some(_) if has_flags => anyhow::bail!(
                "Step '{}' sets both `when` and run_on_success/run_on_failure",
                self.name
            ),
            Some(policy) => Ok(policy),
            None => RunPolicy::from_flags(
                self.run_on_success.unwrap_or(true),
                self.run_on_failure.unwrap_or(true),
            )
            .with_context(|| {
                format!(
                    "Step '{}' disables both run_on_success and run_on_failure and could never run",
                    self.name
                )
            }),
        }
    }

    /// Build the runtime step
    pub fn to_step(&self) -> Result<Step> {
        let secrets = self
            .secrets
            .iter()
            .map(|secret| secret.resolve(&self.name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Step {
            name: self.name.clone(),
            image: self.image.clone(),
            pull: self.pull,
            entrypoint: self.entrypoint.clone(),
            command: self.command.clone(),
            working_dir: self.working_dir.clone(),
            environment: self.environment.clone(),
            secrets,
            auth: self.auth.as_ref().map(|auth| AuthConfig {
                username: auth.username.clone(),
                password: auth.password.clone(),
                server: auth.server.clone(),
            }),
            networks: self.networks.clone(),
            network_mode: self.network_mode.clone(),
            volumes: self.volumes.clone(),
            run_policy: self.run_policy()?,
            detached: self.detached,
            timeout_secs: self.timeout_secs,
        })
    }
}

impl SecretConfig {
    fn resolve(&self, step_name: &str) -> Result<Secret> {
        let value = match (&self.value, &self.from_env) {
            (Some(value), None) => value.clone(),
            (None, Some(var)) => std::env::var(var).with_context(|| {
                format!(
                    "Secret '{}' of step '{}' reads unset environment variable {}",
                    self.name, step_name, var
                )
            })?,
            _ => anyhow::bail!(
                "Secret '{}' of step '{}' needs exactly one of `value` or `from_env`",
                self.name,
                step_name
            ),
        };
        Ok(Secret::new(self.name.clone(), value))
    }
}

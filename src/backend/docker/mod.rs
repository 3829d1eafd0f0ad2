//! Reference backend driven through the docker CLI
//!
//! Each step maps to one container named after the step. Declared volumes
//! and networks are created by `setup` and removed by `destroy`.

pub mod args;
pub mod cli;
pub mod config;
pub mod inspect;
pub mod logs;

pub use cli::DockerCli;
pub use config::DockerConfig;

use crate::backend::{Engine, EngineError, LogStream};
use crate::core::{Config, ProcessState, PullPolicy, Step};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the in-memory pipe between the log follower and its reader
const LOG_PIPE_CAPACITY: usize = 64 * 1024;

/// Engine backed by a local (or `--host`) docker daemon
#[derive(Debug)]
pub struct DockerEngine {
    cli: DockerCli,

    /// Client config directory holding registry logins for this engine only
    auth_dir: Mutex<Option<PathBuf>>,
}

impl DockerEngine {
    pub fn new(config: DockerConfig) -> Self {
        Self {
            cli: DockerCli::new(&config),
            auth_dir: Mutex::new(None),
        }
    }

    /// Pull the step's image, logging in first when credentials are set
    async fn pull(&self, step: &Step) -> Result<(), EngineError> {
        info!("Pulling image {} for step {}", step.image, step.name);

        let mut cmd = self.cli.command();
        if let Some(dir) = self.login(step).await? {
            cmd.arg("--config").arg(dir);
        }
        cmd.args(["pull", "--quiet"]).arg(&step.image);
        self.cli.output(cmd, None).await.map(|_| ())
    }

    /// Log in to the step's registry; returns the config directory to use
    async fn login(&self, step: &Step) -> Result<Option<PathBuf>, EngineError> {
        let Some(auth) = step.auth.as_ref().filter(|_| step.has_credentials()) else {
            return Ok(None);
        };

        let dir = {
            let mut guard = self.auth_dir.lock().await;
            match guard.as_ref() {
                Some(dir) => dir.clone(),
                None => {
                    let dir = std::env::temp_dir().join(format!("piperun-{}", Uuid::new_v4()));
                    tokio::fs::create_dir_all(&dir).await?;
                    *guard = Some(dir.clone());
                    dir
                }
            }
        };

        let server = auth
            .server
            .clone()
            .unwrap_or_else(|| args::registry_of(&step.image).to_string());

        let mut cmd = self.cli.command();
        cmd.arg("--config")
            .arg(&dir)
            .args(["login", "--username", auth.username.as_str(), "--password-stdin"])
            .arg(&server);
        self.cli.output(cmd, Some(auth.password.as_bytes())).await?;

        debug!("Logged in to {} for step {}", server, step.name);
        Ok(Some(dir))
    }

    async fn create(&self, step: &Step) -> Result<(), EngineError> {
        let mut cmd = self.cli.command();
        cmd.args(args::create_args(step));
        for secret in &step.secrets {
            cmd.env(&secret.name, &secret.value);
        }

        match self.cli.output(cmd, None).await {
            Ok(_) => Ok(()),
            Err(EngineError::Command { stderr, .. }) if args::is_missing_image(&stderr) => {
                Err(EngineError::ImageNotFound(step.image.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a resource, treating "already gone" as success
    async fn remove(&self, what: String, args: &[&str], failures: &mut Vec<String>) {
        match self.cli.run(args).await {
            Ok(_) => debug!("Removed {}", what),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", what, e);
                failures.push(format!("{}: {}", what, e));
            }
        }
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn setup(&self, config: &Config) -> Result<(), EngineError> {
        for volume in &config.volumes {
            debug!("Creating volume {}", volume.name);
            self.cli.run(args::volume_create_args(volume)).await?;
        }
        for network in &config.networks {
            debug!("Creating network {}", network.name);
            self.cli.run(args::network_create_args(network)).await?;
        }
        Ok(())
    }

    async fn exec(&self, step: &Step) -> Result<(), EngineError> {
        if step.pull == PullPolicy::Always {
            if let Err(e) = self.pull(step).await {
                // Without credentials a cached image is good enough
                if step.has_credentials() {
                    return Err(e);
                }
                warn!("Pull of {} failed, using local image: {}", step.image, e);
            }
        }

        match self.create(step).await {
            Err(EngineError::ImageNotFound(_)) if step.pull != PullPolicy::Never => {
                self.pull(step).await?;
                self.create(step).await?;
            }
            result => result?,
        }

        if step.network_mode.is_none() {
            for network in &step.networks {
                let mut cmd = self.cli.command();
                cmd.args(["network", "connect"]);
                for alias in &network.aliases {
                    cmd.arg("--alias").arg(alias);
                }
                cmd.arg(&network.name).arg(&step.name);
                self.cli.output(cmd, None).await?;
            }
        }

        self.cli.run(["start", step.name.as_str()]).await?;
        debug!("Started container {}", step.name);
        Ok(())
    }

    async fn wait(&self, step: &Step) -> Result<ProcessState, EngineError> {
        self.cli.run(["wait", step.name.as_str()]).await?;

        let state = self
            .cli
            .run([
                "inspect",
                "--type",
                "container",
                "--format",
                inspect::STATE_FORMAT,
                step.name.as_str(),
            ])
            .await?;
        inspect::parse_state(&state)
    }

    async fn tail(&self, step: &Step) -> Result<LogStream, EngineError> {
        let mut cmd = self.cli.command();
        cmd.args(["logs", "--follow"])
            .arg(&step.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
            command: "docker logs".to_string(),
            message: e.to_string(),
        })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(EngineError::Internal(
                "log follower has no output pipes".to_string(),
            ));
        };

        let (writer, reader) = tokio::io::duplex(LOG_PIPE_CAPACITY);
        let name = step.name.clone();
        tokio::spawn(async move {
            if let Err(e) = logs::merge(stdout, stderr, writer).await {
                debug!("Log stream for {} closed: {}", name, e);
            }
            // Dropping the child stops `docker logs` if it is still following
            drop(child);
        });

        Ok(Box::new(reader))
    }

    async fn kill(&self, step: &Step) -> Result<(), EngineError> {
        match self
            .cli
            .run(["kill", "--signal", "KILL", step.name.as_str()])
            .await
        {
            // Steps are tracked before they start, so the container may not exist yet
            Err(e) if e.is_not_found() => Ok(()),
            Err(EngineError::Command { stderr, .. }) if stderr.contains("is not running") => Ok(()),
            result => result.map(|_| ()),
        }
    }

    async fn destroy(&self, config: &Config) -> Result<(), EngineError> {
        let mut failures = Vec::new();

        for step in config.steps() {
            self.remove(
                format!("container {}", step.name),
                &["rm", "--force", "--volumes", step.name.as_str()],
                &mut failures,
            )
            .await;
        }
        for volume in &config.volumes {
            self.remove(
                format!("volume {}", volume.name),
                &["volume", "rm", "--force", volume.name.as_str()],
                &mut failures,
            )
            .await;
        }
        for network in &config.networks {
            self.remove(
                format!("network {}", network.name),
                &["network", "rm", network.name.as_str()],
                &mut failures,
            )
            .await;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Teardown(failures))
        }
    }

    async fn close(&self) -> Result<(), EngineError> {
        let Some(dir) = self.auth_dir.lock().await.take() else {
            return Ok(());
        };
        match tokio::fs::remove_dir_all(&dir).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

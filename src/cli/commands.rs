//! CLI command definitions

use crate::backend::DockerConfig;
use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Docker executable to drive
    #[arg(long, default_value = "docker")]
    pub docker: String,

    /// Daemon address passed to docker as --host
    #[arg(long)]
    pub host: Option<String>,

    /// Don't print step output
    #[arg(long)]
    pub quiet_logs: bool,
}

impl RunCommand {
    /// Backend configuration selected by the command's flags
    pub fn docker_config(&self) -> DockerConfig {
        let config = DockerConfig::new().with_binary(&self.docker);
        match &self.host {
            Some(host) => config.with_host(host),
            None => config,
        }
    }
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

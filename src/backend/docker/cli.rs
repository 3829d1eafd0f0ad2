//! Docker CLI subprocess runner

use crate::backend::docker::config::DockerConfig;
use crate::backend::EngineError;
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs docker CLI commands and captures their output
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    host: Option<String>,
}

impl DockerCli {
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            host: config.host.clone(),
        }
    }

    /// A docker command with global options applied
    ///
    /// The child is killed if the returned command's future is dropped.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.arg("--host").arg(host);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run `docker <args>` and return its trimmed stdout
    pub async fn run<I, S>(&self, args: I) -> Result<String, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args);
        self.output(cmd, None).await
    }

    /// Run a prepared command, optionally feeding `stdin`
    ///
    /// # Errors
    /// Returns `EngineError::Spawn` if the executable cannot be started and
    /// `EngineError::Command` if it exits with a non-zero status.
    pub async fn output(&self, mut cmd: Command, stdin: Option<&[u8]>) -> Result<String, EngineError> {
        let command = describe(&cmd);
        debug!("Running {}", command);

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
            command: command.clone(),
            message: e.to_string(),
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            // Closing stdin signals end of input
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(EngineError::Command {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Short printable form of a command: the executable and its subcommand
///
/// Later arguments are left out so values never end up in error messages.
fn describe(cmd: &Command) -> String {
    let std = cmd.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().into_owned()];
    let mut args = std.get_args().map(|a| a.to_string_lossy().into_owned());
    while let Some(arg) = args.next() {
        if arg == "--host" || arg == "--config" {
            args.next();
            continue;
        }
        parts.push(arg.clone());
        let is_group = matches!(arg.as_str(), "network" | "volume" | "container" | "image");
        if !is_group {
            break;
        }
    }
    parts.join(" ")
}

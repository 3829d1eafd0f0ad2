//! CLI output formatting

use crate::{
    backend::LogStream,
    core::{PipelineState, RunStatus, Step},
    execution::{Logger, TraceError, Tracer},
};
use async_trait::async_trait;
use console::Emoji;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Idle => style("IDLE").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a tracer snapshot as one progress line
pub fn format_trace(state: &PipelineState) -> String {
    let name = &state.step.name;
    match state.process {
        None if state.step.detached => {
            format!("{} {} {}", ROCKET, style(name).cyan(), style("(detached)").dim())
        }
        None => format!("{} {}", SPINNER, style(name).cyan()),
        Some(process) if process.oom_killed => format!(
            "{} {}: {}",
            CROSS,
            style(name).red(),
            style("killed (out of memory)").dim()
        ),
        Some(process) if process.exit_code != 0 => format!(
            "{} {}: {}",
            CROSS,
            style(name).red(),
            style(format!("exit code {}", process.exit_code)).dim()
        ),
        Some(_) => format!("{} {}", CHECK, style(name).green()),
    }
}

/// Notice printed when Ctrl-C cancels a run
pub fn format_interrupted() -> String {
    format!("{}{}", WARN, style("Interrupted, cancelling pipeline").yellow())
}

/// Prefix a line of step output with its step name
pub fn format_log_line(step: &str, line: &str) -> String {
    format!("{} {}", style(format!("[{}]", step)).dim(), line)
}

/// Prints step progress to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTracer;

impl Tracer for ConsoleTracer {
    fn trace(&self, state: &PipelineState) -> Result<(), TraceError> {
        println!("{}", format_trace(state));
        Ok(())
    }
}

/// Prints step output to stdout, one prefixed line at a time
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogger;

#[async_trait]
impl Logger for ConsoleLogger {
    async fn log(&self, step: &Step, stream: LogStream) {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("{}", format_log_line(&step.name, &line)),
                Ok(None) => break,
                Err(e) => {
                    debug!("Output of {} unreadable: {}", step.name, e);
                    break;
                }
            }
        }
    }
}

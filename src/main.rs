use anyhow::{Context, Result};
use pipeline_runtime::cli::commands::{RunCommand, ValidateCommand};
use pipeline_runtime::cli::output::*;
use pipeline_runtime::cli::{Cli, Command};
use pipeline_runtime::core::config::PipelineConfig;
use pipeline_runtime::{DockerEngine, RunStatus, Runtime};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let pipeline = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let config = pipeline.to_config()?;

    println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());

    let mut runtime =
        Runtime::new(config, DockerEngine::new(cmd.docker_config())).with_tracer(Arc::new(ConsoleTracer));
    if !cmd.quiet_logs {
        runtime = runtime.with_logger(Arc::new(ConsoleLogger));
    }

    let cancel = runtime.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{}", format_interrupted());
            warn!("Received Ctrl-C");
            cancel.cancel();
        }
    });

    println!(
        "{} Starting pipeline {} ({})",
        ROCKET,
        style(&pipeline.name).bold(),
        style(&runtime.run_id().to_string()[..8]).dim()
    );
    println!();

    let result = runtime.run().await;
    let status = RunStatus::of(&result);

    match result {
        Ok(()) => {
            println!(
                "\n{} {} {}",
                CHECK,
                style(&pipeline.name).bold(),
                format_status(status)
            );
            Ok(())
        }
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                format_status(status)
            );
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Stages: {}", style(config.stages.len()).cyan());
            println!("  Steps: {}", style(config.step_count()).cyan());
            for stage in &config.stages {
                let names: Vec<&str> = stage.steps.iter().map(|s| s.name.as_str()).collect();
                println!("    {}: {}", style(&stage.name).bold(), names.join(", "));
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

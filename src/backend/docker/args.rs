//! Translation of steps and declared resources into docker CLI arguments

use crate::core::{Network, Step, Volume};
use std::collections::BTreeMap;

const DEFAULT_REGISTRY: &str = "docker.io";

/// Arguments for `docker create` for a step
///
/// The image is never pulled implicitly; pulling is driven by the step's
/// pull policy. Secret values are not included: each secret is passed as a
/// bare `--env NAME` and its value must be set in the CLI's environment.
pub fn create_args(step: &Step) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--pull".to_string(),
        "never".to_string(),
        "--name".to_string(),
        step.name.clone(),
    ];

    let mut entrypoint = step.entrypoint.iter();
    if let Some(executable) = entrypoint.next() {
        args.push("--entrypoint".to_string());
        args.push(executable.clone());
    }

    if let Some(dir) = &step.working_dir {
        args.push("--workdir".to_string());
        args.push(dir.clone());
    }

    for (key, value) in &step.environment {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }

    for secret in &step.secrets {
        args.push("--env".to_string());
        args.push(secret.name.clone());
    }

    for bind in &step.volumes {
        args.push("--volume".to_string());
        args.push(bind.clone());
    }

    if let Some(mode) = &step.network_mode {
        args.push("--network".to_string());
        args.push(mode.clone());
    }

    args.push(step.image.clone());
    args.extend(entrypoint.cloned());
    args.extend(step.command.iter().cloned());
    args
}

/// Arguments for `docker volume create`
pub fn volume_create_args(volume: &Volume) -> Vec<String> {
    resource_create_args("volume", &volume.name, volume.driver.as_deref(), &volume.driver_opts)
}

/// Arguments for `docker network create`
pub fn network_create_args(network: &Network) -> Vec<String> {
    resource_create_args("network", &network.name, network.driver.as_deref(), &network.driver_opts)
}

fn resource_create_args(
    kind: &str,
    name: &str,
    driver: Option<&str>,
    opts: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut args = vec![kind.to_string(), "create".to_string()];
    if let Some(driver) = driver {
        args.push("--driver".to_string());
        args.push(driver.to_string());
    }
    for (key, value) in opts {
        args.push("--opt".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(name.to_string());
    args
}

/// Registry host an image reference resolves to
///
/// The first path component is a registry only if it looks like a host
/// (contains `.` or `:`, or is `localhost`); otherwise the image lives on
/// the default registry.
pub fn registry_of(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first
        }
        _ => DEFAULT_REGISTRY,
    }
}

/// Whether `docker create` failed because the image is not available locally
pub fn is_missing_image(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such image") || stderr.contains("unable to find image")
}

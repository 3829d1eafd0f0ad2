//! Pipeline domain model
//!
//! A [`Config`] is the whole-pipeline description handed to the runtime.
//! Stages run strictly in declared order; the steps of one stage run
//! concurrently. No other ordering exists between steps.

use crate::core::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-pipeline description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Stages in execution order
    pub stages: Vec<Stage>,

    /// Volumes provisioned before any step runs
    pub volumes: Vec<Volume>,

    /// Networks provisioned before any step runs
    pub networks: Vec<Network>,
}

impl Config {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            ..Default::default()
        }
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.networks.push(network);
        self
    }

    /// Iterate over every step of every stage, in declared order
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages.iter().flat_map(|stage| stage.steps.iter())
    }

    /// Total number of steps across all stages
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }

    /// Find a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps().find(|step| step.name == name)
    }
}

/// A named group of steps that run concurrently
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Stage {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// A declared volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,

    #[serde(default)]
    pub driver: Option<String>,

    #[serde(default)]
    pub driver_opts: BTreeMap<String, String>,
}

impl Volume {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A declared network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,

    #[serde(default)]
    pub driver: Option<String>,

    #[serde(default)]
    pub driver_opts: BTreeMap<String, String>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

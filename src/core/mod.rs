//! Core domain models for Pipeline
//!
//! This module defines the immutable data structures that describe what a
//! pipeline runs, and the state snapshots produced while it runs.

pub mod config;
pub mod pipeline;
pub mod step;
pub mod condition;
pub mod state;

pub use condition::RunPolicy;
pub use pipeline::*;
pub use step::*;
pub use state::*;

// src/errors.rs

//! Crate-wide error types.
//!
//! [`StackError`] is what the public API returns. Graph-construction variants
//! are raised before any service is touched. Per-service failures during a
//! run never surface here; they are recorded as [`NodeFailure`]s on the
//! service's state instead.

use std::time::Duration;

use thiserror::Error;

use crate::types::HealthStatus;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Duplicate service name: {0}")]
    DuplicateName(String),

    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency { service: String, dependency: String },

    #[error("Cycle detected in dependency graph: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("Stack is already running; stop it before starting again")]
    AlreadyRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackError {
    /// Whether this error came from validating the dependency declaration.
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            StackError::DuplicateName(_)
                | StackError::UnknownDependency { .. }
                | StackError::Cycle(_)
        )
    }
}

/// Why a single service did not reach `Healthy`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeFailure {
    #[error("start failed: {0}")]
    StartFailure(String),

    #[error("not healthy after {attempts} probe attempt(s) in {elapsed:?} (last result: {last})")]
    HealthTimeout {
        attempts: u32,
        elapsed: Duration,
        last: HealthStatus,
    },

    #[error("dependency '{0}' is not healthy")]
    DependencyFailed(String),

    #[error("run cancelled")]
    Cancelled,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StackError>;

// src/dag/spec.rs

//! Immutable description of one service in a stack.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::Launcher;
use crate::probe::{AlwaysHealthy, Probe};
use crate::types::ServiceName;

/// How long and how often to wait for a service to become healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Budget for the whole start + probe sequence, measured from the moment
    /// the start operation is invoked.
    pub startup_timeout: Duration,
    /// Pause between two probe attempts.
    pub probe_interval: Duration,
    /// Maximum number of probe attempts.
    pub probe_retries: u32,
    /// Hard deadline for a single probe call.
    pub probe_timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            probe_interval: Duration::from_secs(1),
            probe_retries: 30,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// One entry of a stack declaration.
///
/// Cloning is cheap: the launcher and probe are shared.
#[derive(Clone)]
pub struct ServiceSpec {
    pub name: ServiceName,
    pub depends_on: Vec<ServiceName>,
    pub launcher: Arc<dyn Launcher>,
    pub probe: Arc<dyn Probe>,
    pub policy: HealthPolicy,
}

impl ServiceSpec {
    /// A service with no dependencies, no healthcheck and the default policy.
    pub fn new(name: impl Into<ServiceName>, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            launcher,
            probe: Arc::new(AlwaysHealthy),
            policy: HealthPolicy::default(),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceName>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("probe", &self.probe.describe())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

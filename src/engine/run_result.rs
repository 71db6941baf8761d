// src/engine/run_result.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dag::{ServiceState, Transition};
use crate::types::{ServiceName, ServiceStatus};

/// Final snapshot of a run (or of a teardown).
///
/// `services` always lists every declared service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub services: BTreeMap<ServiceName, ServiceState>,
    pub success: bool,
    pub transitions: Vec<Transition>,
    pub teardown_errors: BTreeMap<ServiceName, String>,
}

impl RunResult {
    /// Result of a startup run: successful only if every service is healthy.
    pub fn from_run(
        services: BTreeMap<ServiceName, ServiceState>,
        transitions: Vec<Transition>,
    ) -> Self {
        let success = services.values().all(ServiceState::is_healthy);
        Self {
            services,
            success,
            transitions,
            teardown_errors: BTreeMap::new(),
        }
    }

    /// Result of a teardown: successful if every stop operation succeeded.
    pub fn from_teardown(
        services: BTreeMap<ServiceName, ServiceState>,
        transitions: Vec<Transition>,
        teardown_errors: BTreeMap<ServiceName, String>,
    ) -> Self {
        Self {
            services,
            success: teardown_errors.is_empty(),
            transitions,
            teardown_errors,
        }
    }

    pub fn state_of(&self, service: &str) -> Option<&ServiceState> {
        self.services.get(service)
    }

    pub fn status_of(&self, service: &str) -> Option<ServiceStatus> {
        self.state_of(service).map(|s| s.status)
    }

    /// Services in the order they reached `Healthy`.
    pub fn healthy_order(&self) -> Vec<&str> {
        self.order_reaching(ServiceStatus::Healthy)
    }

    /// Services in the order they were stopped.
    pub fn stop_order(&self) -> Vec<&str> {
        self.order_reaching(ServiceStatus::Stopped)
    }

    /// Services that did not end up healthy, with their cause.
    pub fn failures(&self) -> Vec<(&str, &ServiceState)> {
        self.services
            .iter()
            .filter(|(_, s)| !s.is_healthy())
            .map(|(n, s)| (n.as_str(), s))
            .collect()
    }

    /// Process exit code for a host binary.
    pub fn exit_code(&self) -> i32 {
        if self.success { 0 } else { 1 }
    }

    fn order_reaching(&self, status: ServiceStatus) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|t| t.to == status)
            .map(|t| t.service.as_str())
            .collect()
    }
}

/// Machine-parseable `status()` output: service name -> state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusReport(pub BTreeMap<ServiceName, ServiceState>);

impl StatusReport {
    pub fn get(&self, service: &str) -> Option<&ServiceState> {
        self.0.get(service)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceName, &ServiceState)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

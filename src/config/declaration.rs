// src/config/declaration.rs

use std::sync::Arc;

use anyhow::Context;
use regex::Regex;

use crate::config::model::{HealthcheckKind, ServiceConfig, StackFile};
use crate::dag::ServiceSpec;
use crate::dag::graph::validate_declaration;
use crate::errors::{Result, StackError};
use crate::exec::CommandLauncher;
use crate::probe::{
    AlwaysHealthy, CommandProbe, FileProbe, HttpProbe, LogProbe, LogReadiness, Probe, TcpProbe,
};
use crate::types::ServiceName;

impl StackFile {
    /// Build the orchestrator declaration: one shell launcher and one probe
    /// per service, with `[defaults]` merged into each policy.
    pub fn declaration(&self) -> Result<Vec<ServiceSpec>> {
        self.service.iter().map(|svc| self.service_spec(svc)).collect()
    }

    /// Start order the orchestrator will use, without building anything.
    pub fn start_order(&self) -> Result<Vec<&str>> {
        let declared: Vec<(&str, &[ServiceName])> = self
            .service
            .iter()
            .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
            .collect();
        let order = validate_declaration(&declared)?;
        Ok(order.into_iter().map(|i| self.service[i].name.as_str()).collect())
    }

    fn service_spec(&self, svc: &ServiceConfig) -> Result<ServiceSpec> {
        let policy = self.policy_for(svc);

        let mut launcher = CommandLauncher::new(&svc.name, &svc.start).detached(svc.detach);
        if let Some(stop) = &svc.stop {
            launcher = launcher.with_stop_cmd(stop);
        }

        let probe: Arc<dyn Probe> = match svc.healthcheck.as_ref().and_then(|hc| hc.kind()) {
            None => Arc::new(AlwaysHealthy),
            Some(HealthcheckKind::Cmd(cmd)) => Arc::new(CommandProbe::new(cmd)),
            Some(HealthcheckKind::Http(url)) => Arc::new(
                HttpProbe::new(url, policy.probe_timeout)
                    .with_context(|| format!("building http probe for service '{}'", svc.name))?,
            ),
            Some(HealthcheckKind::Tcp(addr)) => Arc::new(TcpProbe::new(addr)),
            Some(HealthcheckKind::File(path)) => Arc::new(FileProbe::new(path)),
            Some(HealthcheckKind::Log(pattern)) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    StackError::Config(format!(
                        "service '{}': invalid healthcheck log pattern: {}",
                        svc.name, e
                    ))
                })?;
                let readiness = Arc::new(LogReadiness::new(regex));
                launcher = launcher.with_readiness(Arc::clone(&readiness));
                Arc::new(LogProbe::new(readiness))
            }
        };

        Ok(ServiceSpec::new(&svc.name, Arc::new(launcher))
            .depends_on(svc.depends_on.iter().cloned())
            .with_probe(probe)
            .with_policy(policy))
    }
}

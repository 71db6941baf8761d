#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stackup::config::{DefaultsSection, HealthcheckConfig, RawStackFile, ServiceConfig, StackFile};
use stackup::dag::{HealthPolicy, ServiceSpec};
use stackup::probe::Probe;
use stackup::types::HumanDuration;

use crate::fakes::{EventLog, RecordingLauncher};

/// Short timings so failure paths finish quickly in tests.
pub fn fast_policy() -> HealthPolicy {
    HealthPolicy {
        startup_timeout: Duration::from_secs(2),
        probe_interval: Duration::from_millis(10),
        probe_retries: 3,
        probe_timeout: Duration::from_millis(200),
    }
}

/// A service backed by a [`RecordingLauncher`], healthy as soon as it has
/// started, using [`fast_policy`].
pub fn fake_service(name: &str, deps: &[&str], events: &EventLog) -> ServiceSpec {
    ServiceSpec::new(name, Arc::new(RecordingLauncher::new(name, events)))
        .depends_on(deps.iter().copied())
        .with_policy(fast_policy())
}

/// [`fake_service`] with a custom probe.
pub fn fake_service_with_probe(
    name: &str,
    deps: &[&str],
    events: &EventLog,
    probe: Arc<dyn Probe>,
) -> ServiceSpec {
    fake_service(name, deps, events).with_probe(probe)
}

/// Builder for `StackFile` to simplify test setup.
pub struct StackFileBuilder {
    raw: RawStackFile,
}

impl StackFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawStackFile {
                defaults: DefaultsSection::default(),
                service: Vec::new(),
            },
        }
    }

    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.raw.service.push(service);
        self
    }

    pub fn probe_retries(mut self, retries: u32) -> Self {
        self.raw.defaults.probe_retries = retries;
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.raw.defaults.probe_interval = HumanDuration(interval);
        self
    }

    pub fn build_raw(self) -> RawStackFile {
        self.raw
    }

    pub fn build(self) -> StackFile {
        StackFile::try_from(self.raw).expect("Failed to build valid manifest from builder")
    }
}

impl Default for StackFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one `[[service]]` entry.
pub struct ServiceConfigBuilder {
    service: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new(name: &str, start: &str) -> Self {
        Self {
            service: ServiceConfig::new(name, start),
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.service.depends_on.push(dep.to_string());
        self
    }

    pub fn stop(mut self, cmd: &str) -> Self {
        self.service.stop = Some(cmd.to_string());
        self
    }

    pub fn detach(mut self, val: bool) -> Self {
        self.service.detach = val;
        self
    }

    pub fn healthcheck(mut self, hc: HealthcheckConfig) -> Self {
        self.service.healthcheck = Some(hc);
        self
    }

    pub fn healthcheck_cmd(self, cmd: &str) -> Self {
        self.healthcheck(HealthcheckConfig {
            cmd: Some(cmd.to_string()),
            ..Default::default()
        })
    }

    pub fn healthcheck_log(self, pattern: &str) -> Self {
        self.healthcheck(HealthcheckConfig {
            log: Some(pattern.to_string()),
            ..Default::default()
        })
    }

    pub fn probe_retries(mut self, retries: u32) -> Self {
        self.service.probe_retries = Some(retries);
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.service.probe_interval = Some(HumanDuration(interval));
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.service.startup_timeout = Some(HumanDuration(timeout));
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.service
    }
}

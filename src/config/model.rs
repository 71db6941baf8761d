// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::dag::HealthPolicy;
use crate::types::HumanDuration;

/// Stack manifest as read from a TOML file, before validation.
///
/// ```toml
/// [defaults]
/// startup_timeout = "60s"
/// probe_interval = "1s"
///
/// [[service]]
/// name = "db"
/// start = "docker start -a stack-db"
/// stop = "docker stop stack-db"
/// healthcheck = { cmd = "pg_isready -h localhost" }
///
/// [[service]]
/// name = "api"
/// depends_on = ["db"]
/// start = "./target/release/api"
/// healthcheck = { http = "http://localhost:8080/health" }
/// ```
///
/// Services are an array of tables so declaration order is preserved and a
/// repeated name is reported instead of silently overwritten.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStackFile {
    #[serde(default)]
    pub defaults: DefaultsSection,

    #[serde(default)]
    pub service: Vec<ServiceConfig>,
}

/// Validated manifest, produced by `TryFrom<RawStackFile>` in
/// [`validate`](super::validate).
#[derive(Debug, Clone)]
pub struct StackFile {
    pub defaults: DefaultsSection,
    pub service: Vec<ServiceConfig>,
}

impl StackFile {
    pub(crate) fn new_unchecked(defaults: DefaultsSection, service: Vec<ServiceConfig>) -> Self {
        Self { defaults, service }
    }

    /// Effective health policy of a service: its own overrides on top of
    /// `[defaults]`.
    pub fn policy_for(&self, service: &ServiceConfig) -> HealthPolicy {
        let d = &self.defaults;
        HealthPolicy {
            startup_timeout: service.startup_timeout.unwrap_or(d.startup_timeout).into(),
            probe_interval: service.probe_interval.unwrap_or(d.probe_interval).into(),
            probe_retries: service.probe_retries.unwrap_or(d.probe_retries),
            probe_timeout: service.probe_timeout.unwrap_or(d.probe_timeout).into(),
        }
    }
}

/// `[defaults]` section: health policy shared by all services.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: HumanDuration,

    #[serde(default = "default_probe_interval")]
    pub probe_interval: HumanDuration,

    #[serde(default = "default_probe_retries")]
    pub probe_retries: u32,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: HumanDuration,
}

fn default_startup_timeout() -> HumanDuration {
    HumanDuration(HealthPolicy::default().startup_timeout)
}

fn default_probe_interval() -> HumanDuration {
    HumanDuration(HealthPolicy::default().probe_interval)
}

fn default_probe_retries() -> u32 {
    HealthPolicy::default().probe_retries
}

fn default_probe_timeout() -> HumanDuration {
    HumanDuration(HealthPolicy::default().probe_timeout)
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            startup_timeout: default_startup_timeout(),
            probe_interval: default_probe_interval(),
            probe_retries: default_probe_retries(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// One `[[service]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Unique service name.
    pub name: String,

    /// Services that must be healthy before this one is started.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Shell command that launches the service.
    pub start: String,

    /// Optional shell command that stops the service. Without one, a
    /// foreground process is killed.
    #[serde(default)]
    pub stop: Option<String>,

    /// `start` hands the service off to something else and exits.
    #[serde(default)]
    pub detach: bool,

    /// Readiness check. Without one, a started service counts as healthy.
    #[serde(default)]
    pub healthcheck: Option<HealthcheckConfig>,

    #[serde(default)]
    pub startup_timeout: Option<HumanDuration>,

    #[serde(default)]
    pub probe_interval: Option<HumanDuration>,

    #[serde(default)]
    pub probe_retries: Option<u32>,

    #[serde(default)]
    pub probe_timeout: Option<HumanDuration>,
}

/// `healthcheck = { ... }`: exactly one of the fields must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcheckConfig {
    /// Shell command; exit 0 means healthy.
    #[serde(default)]
    pub cmd: Option<String>,

    /// URL answered with 2xx when ready.
    #[serde(default)]
    pub http: Option<String>,

    /// `host:port` accepting TCP connections when ready.
    #[serde(default)]
    pub tcp: Option<String>,

    /// Marker file created when ready.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Regex matched against the service's stdout.
    #[serde(default)]
    pub log: Option<String>,
}

/// The single check a [`HealthcheckConfig`] selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthcheckKind<'a> {
    Cmd(&'a str),
    Http(&'a str),
    Tcp(&'a str),
    File(&'a std::path::Path),
    Log(&'a str),
}

impl HealthcheckConfig {
    /// All checks that are set, in field order.
    pub fn kinds(&self) -> Vec<HealthcheckKind<'_>> {
        let mut kinds = Vec::new();
        if let Some(c) = &self.cmd {
            kinds.push(HealthcheckKind::Cmd(c));
        }
        if let Some(u) = &self.http {
            kinds.push(HealthcheckKind::Http(u));
        }
        if let Some(a) = &self.tcp {
            kinds.push(HealthcheckKind::Tcp(a));
        }
        if let Some(p) = &self.file {
            kinds.push(HealthcheckKind::File(p));
        }
        if let Some(r) = &self.log {
            kinds.push(HealthcheckKind::Log(r));
        }
        kinds
    }

    /// The configured check, if exactly one is set.
    pub fn kind(&self) -> Option<HealthcheckKind<'_>> {
        let mut kinds = self.kinds();
        if kinds.len() == 1 { kinds.pop() } else { None }
    }
}

impl ServiceConfig {
    /// Convenience for building test and programmatic manifests.
    pub fn new(name: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            start: start.into(),
            stop: None,
            detach: false,
            healthcheck: None,
            startup_timeout: None,
            probe_interval: None,
            probe_retries: None,
            probe_timeout: None,
        }
    }
}

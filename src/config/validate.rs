// src/config/validate.rs

use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    DefaultsSection, HealthcheckKind, RawStackFile, ServiceConfig, StackFile,
};
use crate::dag::graph::validate_declaration;
use crate::errors::{Result, StackError};
use crate::types::ServiceName;

impl TryFrom<RawStackFile> for StackFile {
    type Error = StackError;

    fn try_from(raw: RawStackFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_stack(&raw)?;
        Ok(StackFile::new_unchecked(raw.defaults, raw.service))
    }
}

fn validate_raw_stack(cfg: &RawStackFile) -> Result<()> {
    ensure_has_services(cfg)?;
    validate_defaults(&cfg.defaults)?;
    for service in cfg.service.iter() {
        validate_service(service)?;
    }
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_services(cfg: &RawStackFile) -> Result<()> {
    if cfg.service.is_empty() {
        return Err(StackError::Config(
            "manifest must contain at least one [[service]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(defaults: &DefaultsSection) -> Result<()> {
    if defaults.probe_retries == 0 {
        return Err(StackError::Config(
            "[defaults].probe_retries must be >= 1 (got 0)".to_string(),
        ));
    }
    ensure_non_zero("[defaults].startup_timeout", defaults.startup_timeout.0)?;
    ensure_non_zero("[defaults].probe_timeout", defaults.probe_timeout.0)?;
    Ok(())
}

fn validate_service(service: &ServiceConfig) -> Result<()> {
    let name = service.name.trim();
    if name.is_empty() {
        return Err(StackError::Config(
            "every [[service]] needs a non-empty `name`".to_string(),
        ));
    }
    if service.start.trim().is_empty() {
        return Err(StackError::Config(format!(
            "service '{}' has an empty `start` command",
            name
        )));
    }
    if service.probe_retries == Some(0) {
        return Err(StackError::Config(format!(
            "service '{}': probe_retries must be >= 1 (got 0)",
            name
        )));
    }
    if let Some(d) = service.startup_timeout {
        ensure_non_zero(&format!("service '{}': startup_timeout", name), d.0)?;
    }
    if let Some(d) = service.probe_timeout {
        ensure_non_zero(&format!("service '{}': probe_timeout", name), d.0)?;
    }

    if let Some(hc) = &service.healthcheck {
        let kinds = hc.kinds();
        if kinds.len() != 1 {
            return Err(StackError::Config(format!(
                "service '{}': healthcheck must set exactly one of \
                 cmd, http, tcp, file, log (got {})",
                name,
                kinds.len()
            )));
        }
        match kinds[0] {
            HealthcheckKind::Http(url) => {
                url.parse::<reqwest::Url>().map_err(|e| {
                    StackError::Config(format!(
                        "service '{}': invalid healthcheck url '{}': {}",
                        name, url, e
                    ))
                })?;
            }
            HealthcheckKind::Log(pattern) => {
                Regex::new(pattern).map_err(|e| {
                    StackError::Config(format!(
                        "service '{}': invalid healthcheck log pattern: {}",
                        name, e
                    ))
                })?;
                if service.detach {
                    return Err(StackError::Config(format!(
                        "service '{}': a log healthcheck needs a foreground \
                         (detach = false) start command",
                        name
                    )));
                }
            }
            HealthcheckKind::Cmd(cmd) | HealthcheckKind::Tcp(cmd) if cmd.trim().is_empty() => {
                return Err(StackError::Config(format!(
                    "service '{}': healthcheck value must not be empty",
                    name
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Duplicate names, unknown dependencies and cycles, with the same errors
/// the orchestrator would raise.
fn validate_graph(cfg: &RawStackFile) -> Result<()> {
    let declared: Vec<(&str, &[ServiceName])> = cfg
        .service
        .iter()
        .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
        .collect();
    validate_declaration(&declared)?;
    Ok(())
}

fn ensure_non_zero(what: &str, d: Duration) -> Result<()> {
    if d.is_zero() {
        return Err(StackError::Config(format!("{what} must be greater than zero")));
    }
    Ok(())
}

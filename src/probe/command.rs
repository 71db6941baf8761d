// src/probe/command.rs

use std::process::Stdio;

use tracing::debug;

use super::{Probe, ProbeFuture};
use crate::exec::shell_command;
use crate::types::HealthStatus;

/// Runs a shell command; exit status 0 means healthy.
///
/// The child is killed if the probe future is dropped, so the scheduler's
/// timeout never leaves a stray healthcheck process behind.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    cmd: String,
}

impl CommandProbe {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl Probe for CommandProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            let mut cmd = shell_command(&self.cmd);
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true);

            let status = match cmd.status().await {
                Ok(status) => status,
                Err(e) => {
                    debug!(cmd = %self.cmd, error = %e, "failed to spawn healthcheck command");
                    return HealthStatus::Unknown;
                }
            };

            if status.success() {
                HealthStatus::Healthy
            } else {
                debug!(
                    cmd = %self.cmd,
                    exit_code = status.code().unwrap_or(-1),
                    "healthcheck command reported failure"
                );
                HealthStatus::Unhealthy
            }
        })
    }

    fn describe(&self) -> String {
        format!("cmd: {}", self.cmd)
    }
}

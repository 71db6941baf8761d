// src/exec/command.rs

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::{LaunchFuture, Launcher};
use super::shell_command;
use crate::probe::LogReadiness;
use crate::types::ServiceName;

/// How long a foreground process gets to exit on its own after the `stop`
/// command ran, before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Launches a service with shell commands.
///
/// Two modes:
/// - foreground (`detach = false`, default): `start` is the service process
///   itself. It is kept as a child and killed on stop unless a `stop`
///   command takes care of it.
/// - detached (`detach = true`): `start` hands the service off to something
///   else (`docker start`, `systemctl start`, ...) and must exit 0.
#[derive(Debug)]
pub struct CommandLauncher {
    service: ServiceName,
    start_cmd: String,
    stop_cmd: Option<String>,
    detach: bool,
    readiness: Option<Arc<LogReadiness>>,
    child: Mutex<Option<Child>>,
}

impl CommandLauncher {
    pub fn new(service: impl Into<ServiceName>, start_cmd: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            start_cmd: start_cmd.into(),
            stop_cmd: None,
            detach: false,
            readiness: None,
            child: Mutex::new(None),
        }
    }

    pub fn with_stop_cmd(mut self, stop_cmd: impl Into<String>) -> Self {
        self.stop_cmd = Some(stop_cmd.into());
        self
    }

    pub fn detached(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    /// Feed stdout lines of the started process to a log readiness probe.
    pub fn with_readiness(mut self, readiness: Arc<LogReadiness>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    async fn start_inner(&self) -> Result<()> {
        let mut slot = self.child.lock().await;
        if let Some(existing) = slot.as_mut() {
            if existing.try_wait()?.is_none() {
                bail!("service '{}' already has a running process", self.service);
            }
        }

        if let Some(readiness) = &self.readiness {
            readiness.reset();
        }

        info!(
            service = %self.service,
            cmd = %self.start_cmd,
            detach = self.detach,
            "running start command"
        );

        let mut cmd = shell_command(&self.start_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning start command for service '{}'", self.service))?;

        spawn_output_readers(
            &self.service,
            child.stdout.take(),
            child.stderr.take(),
            self.readiness.clone(),
        );

        if self.detach {
            let status = child
                .wait()
                .await
                .with_context(|| {
                    format!("waiting for start command of service '{}'", self.service)
                })?;
            if !status.success() {
                bail!(
                    "start command exited with status {}",
                    status.code().unwrap_or(-1)
                );
            }
            debug!(service = %self.service, "detached start command finished");
            return Ok(());
        }

        debug!(service = %self.service, pid = child.id(), "service process spawned");
        *slot = Some(child);
        Ok(())
    }

    async fn stop_inner(&self) -> Result<()> {
        let mut slot = self.child.lock().await;
        let child = slot.take();

        if let Some(stop_cmd) = &self.stop_cmd {
            info!(service = %self.service, cmd = %stop_cmd, "running stop command");
            let status = shell_command(stop_cmd)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .with_context(|| format!("running stop command for service '{}'", self.service))?;

            if let Some(mut child) = child {
                if tokio::time::timeout(STOP_GRACE, child.wait()).await.is_err() {
                    warn!(
                        service = %self.service,
                        "process still alive after stop command; killing"
                    );
                    kill_child(&self.service, &mut child).await;
                }
            }

            if !status.success() {
                bail!("stop command exited with status {}", status.code().unwrap_or(-1));
            }
            return Ok(());
        }

        match child {
            Some(mut child) => {
                info!(service = %self.service, pid = child.id(), "killing service process");
                kill_child(&self.service, &mut child).await;
            }
            None if self.detach => {
                warn!(
                    service = %self.service,
                    "detached service has no stop command; leaving it running"
                );
            }
            None => {
                debug!(service = %self.service, "no process to stop");
            }
        }

        Ok(())
    }
}

impl Launcher for CommandLauncher {
    fn start(&self) -> LaunchFuture<'_> {
        Box::pin(self.start_inner())
    }

    fn stop(&self) -> LaunchFuture<'_> {
        Box::pin(self.stop_inner())
    }
}

async fn kill_child(service: &str, child: &mut Child) {
    if let Err(e) = child.kill().await {
        // Usually means the process already exited.
        debug!(service = %service, error = %e, "kill failed");
    }
}

/// Always consume stdout/stderr so pipe buffers never fill; log at debug.
fn spawn_output_readers(
    service: &str,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    readiness: Option<Arc<LogReadiness>>,
) {
    if let Some(stdout) = stdout {
        let service = service.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(service = %service, "stdout: {}", line);
                if let Some(readiness) = &readiness {
                    readiness.observe(&line);
                }
            }
            debug!(service = %service, "stdout closed");
        });
    }

    if let Some(stderr) = stderr {
        let service = service.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(service = %service, "stderr: {}", line);
            }
        });
    }
}

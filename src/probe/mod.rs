// src/probe/mod.rs

//! Readiness probes.
//!
//! A probe answers one question on demand: is this service ready to receive
//! traffic? It is deliberately transport-agnostic; the scheduler only sees
//! the [`Probe`] trait.
//!
//! - [`command`] runs a shell command (compose-style `healthcheck.test`).
//! - [`http`] issues a GET against a readiness endpoint.
//! - [`tcp`] checks that something accepts connections on an address.
//! - [`file`] checks for a marker file.
//! - [`log`] watches the launcher's stdout for a readiness line.
//!
//! Probes must not block forever, but the scheduler does not trust them to
//! behave: every call goes through [`check_with_timeout`].

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::types::HealthStatus;

pub mod command;
pub mod file;
pub mod http;
pub mod log;
pub mod tcp;

pub use command::CommandProbe;
pub use file::FileProbe;
pub use http::HttpProbe;
pub use log::{LogProbe, LogReadiness};
pub use tcp::TcpProbe;

/// Boxed future returned by [`Probe::check`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;

/// Trait abstracting a readiness check.
///
/// Implementations should be side-effect free from the scheduler's point of
/// view: they may be called any number of times.
pub trait Probe: Send + Sync + Debug {
    /// Run one check.
    fn check(&self) -> ProbeFuture<'_>;

    /// Short human-readable description used in logs and dry-run output.
    fn describe(&self) -> String;
}

/// Probe used when a service declares no healthcheck: once it has been
/// started it is considered ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

impl Probe for AlwaysHealthy {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async { HealthStatus::Healthy })
    }

    fn describe(&self) -> String {
        "none (running is ready)".to_string()
    }
}

/// Invoke `probe` with a hard deadline. A probe that does not answer within
/// `timeout` is reported as `Unhealthy`.
pub async fn check_with_timeout(probe: &dyn Probe, timeout: Duration) -> HealthStatus {
    match tokio::time::timeout(timeout, probe.check()).await {
        Ok(status) => status,
        Err(_) => {
            debug!(
                probe = %probe.describe(),
                timeout_ms = timeout.as_millis() as u64,
                "probe timed out; treating as unhealthy"
            );
            HealthStatus::Unhealthy
        }
    }
}

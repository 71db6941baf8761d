// src/probe/tcp.rs

use tokio::net::TcpStream;
use tracing::debug;

use super::{Probe, ProbeFuture};
use crate::types::HealthStatus;

/// Healthy once something accepts a TCP connection on `addr` (`host:port`).
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Probe for TcpProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            match TcpStream::connect(self.addr.as_str()).await {
                Ok(_) => HealthStatus::Healthy,
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "tcp connect failed");
                    HealthStatus::Unknown
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!("tcp: {}", self.addr)
    }
}

// src/probe/file.rs

use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use super::{Probe, ProbeFuture};
use crate::types::HealthStatus;

/// Healthy once a marker file exists.
#[derive(Debug, Clone)]
pub struct FileProbe {
    path: PathBuf,
}

impl FileProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Probe for FileProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            match tokio::fs::metadata(&self.path).await {
                Ok(_) => HealthStatus::Healthy,
                Err(e) if e.kind() == ErrorKind::NotFound => HealthStatus::Unhealthy,
                Err(e) => {
                    debug!(path = ?self.path, error = %e, "cannot stat readiness marker");
                    HealthStatus::Unknown
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!("file: {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_file_controls_health() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ready");
        let probe = FileProbe::new(&marker);

        assert_eq!(probe.check().await, HealthStatus::Unhealthy);

        std::fs::write(&marker, b"").unwrap();
        assert_eq!(probe.check().await, HealthStatus::Healthy);
    }
}

// src/probe/http.rs

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use super::{Probe, ProbeFuture};
use crate::types::HealthStatus;

/// GETs a readiness endpoint. Any 2xx response is healthy, any other status
/// is unhealthy, and a request that never gets a response is unknown.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Build a probe for `url`. `request_timeout` bounds a single request;
    /// the scheduler applies its own per-call deadline on top.
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let url: reqwest::Url = url
            .parse()
            .with_context(|| format!("invalid healthcheck url '{url}'"))?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("building http client for healthcheck")?;

        Ok(Self { url, client })
    }
}

impl Probe for HttpProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            match self.client.get(self.url.clone()).send().await {
                Ok(response) if response.status().is_success() => HealthStatus::Healthy,
                Ok(response) => {
                    debug!(
                        url = %self.url,
                        status = response.status().as_u16(),
                        "readiness endpoint returned non-success status"
                    );
                    HealthStatus::Unhealthy
                }
                Err(e) => {
                    debug!(url = %self.url, error = %e, "readiness request failed");
                    HealthStatus::Unknown
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!("http: GET {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve exactly one HTTP/1.1 response with the given status line.
    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nOK"
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });

        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn ok_response_is_healthy() {
        let url = serve_once("200 OK").await;
        let probe = HttpProbe::new(&url, Duration::from_secs(2)).unwrap();
        assert_eq!(probe.check().await, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn server_error_is_unhealthy() {
        let url = serve_once("503 Service Unavailable").await;
        let probe = HttpProbe::new(&url, Duration::from_secs(2)).unwrap();
        assert_eq!(probe.check().await, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn refused_connection_is_unknown() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe =
            HttpProbe::new(&format!("http://{addr}/health"), Duration::from_secs(2)).unwrap();
        assert_eq!(probe.check().await, HealthStatus::Unknown);
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(HttpProbe::new("not a url", Duration::from_secs(1)).is_err());
    }
}

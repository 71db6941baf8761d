// src/dag/state.rs

//! Per-run service state and its publication.
//!
//! Each service's state lives in a `tokio::sync::watch` channel. The
//! service's own task holds the only [`StatePublisher`] (the writer);
//! dependents and `status()` hold receivers and only ever see complete,
//! immutable snapshots.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::errors::NodeFailure;
use crate::types::{ServiceName, ServiceStatus};

/// Snapshot of one service within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceState {
    pub status: ServiceStatus,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Still `Pending` because it will never be attempted in this run (a
    /// dependency failed, or the run was cancelled first).
    pub skipped: bool,
}

impl ServiceState {
    pub fn pending() -> Self {
        Self {
            status: ServiceStatus::Pending,
            last_error: None,
            started_at: None,
            skipped: false,
        }
    }

    /// No further transitions will happen in this run without teardown.
    pub fn is_settled(&self) -> bool {
        match self.status {
            ServiceStatus::Healthy | ServiceStatus::Failed | ServiceStatus::Stopped => true,
            ServiceStatus::Pending => self.skipped,
            ServiceStatus::Starting | ServiceStatus::WaitingHealthy => false,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::pending()
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub service: ServiceName,
    pub from: ServiceStatus,
    pub to: ServiceStatus,
    pub at: DateTime<Utc>,
    pub detail: Option<String>,
}

/// Append-only, ordered log of transitions shared by all tasks of a run.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    entries: Arc<Mutex<Vec<Transition>>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, transition: Transition) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transition);
    }

    pub fn snapshot(&self) -> Vec<Transition> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The single writer of one service's state.
#[derive(Debug)]
pub struct StatePublisher {
    service: ServiceName,
    tx: watch::Sender<ServiceState>,
    log: TransitionLog,
}

impl StatePublisher {
    /// Create a publisher holding `Pending` and a receiver observing it.
    pub fn channel(
        service: impl Into<ServiceName>,
        log: TransitionLog,
    ) -> (Self, watch::Receiver<ServiceState>) {
        let (tx, rx) = watch::channel(ServiceState::pending());
        (
            Self {
                service: service.into(),
                tx,
                log,
            },
            rx,
        )
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn current(&self) -> ServiceState {
        self.tx.borrow().clone()
    }

    /// `Pending -> Starting`, stamping `started_at`.
    pub fn starting(&self) {
        self.apply(ServiceStatus::Starting, None, |s| {
            s.started_at = Some(Utc::now());
            s.last_error = None;
        });
    }

    pub fn waiting_healthy(&self) {
        self.apply(ServiceStatus::WaitingHealthy, None, |_| {});
    }

    pub fn healthy(&self) {
        self.apply(ServiceStatus::Healthy, None, |_| {});
    }

    pub fn stopped(&self) {
        self.apply(ServiceStatus::Stopped, None, |_| {});
    }

    pub fn failed(&self, failure: &NodeFailure) {
        let cause = failure.to_string();
        warn!(service = %self.service, cause = %cause, "service failed");
        self.apply(ServiceStatus::Failed, Some(cause.clone()), |s| {
            s.last_error = Some(cause);
        });
    }

    /// Leave the service `Pending` for good.
    pub fn skipped(&self, reason: &NodeFailure) {
        let cause = reason.to_string();
        info!(service = %self.service, reason = %cause, "service skipped");
        let from = self.tx.borrow().status;
        self.tx.send_modify(|s| {
            s.skipped = true;
            s.last_error = Some(cause.clone());
        });
        self.log.record(Transition {
            service: self.service.clone(),
            from,
            to: ServiceStatus::Pending,
            at: Utc::now(),
            detail: Some(cause),
        });
    }

    /// Record an error without changing status (e.g. cancellation while
    /// `Starting`, so the service is still a teardown candidate).
    pub fn note_error(&self, failure: &NodeFailure) {
        let cause = failure.to_string();
        self.tx.send_modify(|s| s.last_error = Some(cause));
    }

    fn apply(
        &self,
        to: ServiceStatus,
        detail: Option<String>,
        update: impl FnOnce(&mut ServiceState),
    ) {
        let from = self.tx.borrow().status;
        self.tx.send_modify(|s| {
            s.status = to;
            update(s);
        });
        info!(service = %self.service, %from, %to, "service state changed");
        self.log.record(Transition {
            service: self.service.clone(),
            from,
            to,
            at: Utc::now(),
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_updates_receivers_and_log() {
        let log = TransitionLog::new();
        let (publisher, rx) = StatePublisher::channel("db", log.clone());

        publisher.starting();
        publisher.waiting_healthy();
        publisher.healthy();

        let state = rx.borrow().clone();
        assert_eq!(state.status, ServiceStatus::Healthy);
        assert!(state.started_at.is_some());
        assert!(state.is_settled());

        let path: Vec<_> = log.snapshot().iter().map(|t| t.to).collect();
        assert_eq!(
            path,
            vec![
                ServiceStatus::Starting,
                ServiceStatus::WaitingHealthy,
                ServiceStatus::Healthy
            ]
        );
    }

    #[test]
    fn skipped_pending_is_settled_but_plain_pending_is_not() {
        let (publisher, rx) = StatePublisher::channel("api", TransitionLog::new());
        assert!(!rx.borrow().is_settled());

        publisher.skipped(&NodeFailure::DependencyFailed("db".to_string()));
        let state = rx.borrow().clone();
        assert_eq!(state.status, ServiceStatus::Pending);
        assert!(state.skipped);
        assert!(state.is_settled());
        assert_eq!(state.last_error.as_deref(), Some("dependency 'db' is not healthy"));
    }

    #[test]
    fn failure_records_cause() {
        let (publisher, rx) = StatePublisher::channel("api", TransitionLog::new());
        publisher.starting();
        publisher.failed(&NodeFailure::StartFailure("boom".to_string()));

        let state = rx.borrow().clone();
        assert_eq!(state.status, ServiceStatus::Failed);
        assert_eq!(state.last_error.as_deref(), Some("start failed: boom"));
    }
}

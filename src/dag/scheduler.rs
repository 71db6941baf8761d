// src/dag/scheduler.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::spec::ServiceSpec;
use crate::dag::state::{ServiceState, StatePublisher, TransitionLog};
use crate::errors::NodeFailure;
use crate::probe::check_with_timeout;
use crate::types::{HealthStatus, ServiceName, ServiceStatus};

/// Drives one run of a stack: every service gets its own task, which waits
/// for its dependencies to settle, starts the service and polls its probe.
///
/// It is responsible for:
/// - never starting a service before all its dependencies are healthy
/// - skipping every transitive dependent of a failed service
/// - keeping unrelated branches fully concurrent
/// - reacting promptly to cancellation of the run
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<DependencyGraph>,
    publishers: HashMap<ServiceName, StatePublisher>,
    receivers: BTreeMap<ServiceName, watch::Receiver<ServiceState>>,
}

impl Scheduler {
    /// Prepare a run: every service starts out `Pending`.
    pub fn new(graph: Arc<DependencyGraph>, log: TransitionLog) -> Self {
        let mut publishers = HashMap::with_capacity(graph.len());
        let mut receivers = BTreeMap::new();

        for spec in graph.specs() {
            let (publisher, rx) = StatePublisher::channel(spec.name.clone(), log.clone());
            publishers.insert(spec.name.clone(), publisher);
            receivers.insert(spec.name.clone(), rx);
        }

        Self {
            graph,
            publishers,
            receivers,
        }
    }

    /// Receivers observing every service's published state.
    pub fn subscribe(&self) -> BTreeMap<ServiceName, watch::Receiver<ServiceState>> {
        self.receivers.clone()
    }

    /// Run until every service is healthy, failed or skipped, or until
    /// `cancel` fires and all tasks have wound down.
    ///
    /// Returns the publishers (in topological order) so the caller can drive
    /// teardown transitions afterwards.
    pub async fn run(mut self, cancel: CancellationToken) -> Vec<StatePublisher> {
        let order: Vec<ServiceName> = self
            .graph
            .topological_order()
            .into_iter()
            .map(str::to_string)
            .collect();

        info!(?order, "starting stack");

        let mut tasks = JoinSet::new();
        for name in order.iter() {
            let (Some(spec), Some(publisher)) =
                (self.graph.get(name).cloned(), self.publishers.remove(name))
            else {
                warn!(service = %name, "service missing from scheduler state");
                continue;
            };

            let deps: Vec<(ServiceName, watch::Receiver<ServiceState>)> = spec
                .depends_on
                .iter()
                .filter_map(|dep| self.receivers.get(dep).map(|rx| (dep.clone(), rx.clone())))
                .collect();

            tasks.spawn(run_service(spec, deps, publisher, cancel.clone()));
        }

        let mut finished = Vec::with_capacity(order.len());
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(publisher) => finished.push(publisher),
                Err(e) => error!(error = %e, "service task aborted"),
            }
        }

        finished.sort_by_key(|p| order.iter().position(|n| n == p.service()));
        finished
    }
}

/// Full lifecycle of one service within a run.
async fn run_service(
    spec: ServiceSpec,
    deps: Vec<(ServiceName, watch::Receiver<ServiceState>)>,
    publisher: StatePublisher,
    cancel: CancellationToken,
) -> StatePublisher {
    if let Err(reason) = wait_for_dependencies(&spec.name, deps, &cancel).await {
        publisher.skipped(&reason);
        return publisher;
    }

    if cancel.is_cancelled() {
        publisher.skipped(&NodeFailure::Cancelled);
        return publisher;
    }

    let started = Instant::now();
    let deadline = started + spec.policy.startup_timeout;

    publisher.starting();
    let start_result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            publisher.note_error(&NodeFailure::Cancelled);
            return publisher;
        }
        res = timeout(spec.policy.startup_timeout, spec.launcher.start()) => res,
    };

    match start_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            publisher.failed(&NodeFailure::StartFailure(format!("{e:#}")));
            return publisher;
        }
        Err(_) => {
            publisher.failed(&NodeFailure::StartFailure(format!(
                "start did not complete within {:?}",
                spec.policy.startup_timeout
            )));
            return publisher;
        }
    }

    publisher.waiting_healthy();

    match poll_until_healthy(&spec, started, deadline, &cancel).await {
        PollOutcome::Healthy => publisher.healthy(),
        PollOutcome::Cancelled => publisher.note_error(&NodeFailure::Cancelled),
        PollOutcome::GaveUp { attempts, last } => {
            publisher.failed(&NodeFailure::HealthTimeout {
                attempts,
                elapsed: started.elapsed(),
                last,
            });
        }
    }

    publisher
}

/// Suspend until every dependency has settled, then require all of them to
/// be healthy.
async fn wait_for_dependencies(
    service: &str,
    deps: Vec<(ServiceName, watch::Receiver<ServiceState>)>,
    cancel: &CancellationToken,
) -> Result<(), NodeFailure> {
    for (dep, mut rx) in deps {
        debug!(service = %service, dependency = %dep, "waiting for dependency");

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NodeFailure::Cancelled),
            res = rx.wait_for(ServiceState::is_settled) => res.map(|s| s.status).ok(),
        };

        match status {
            Some(ServiceStatus::Healthy) => {}
            Some(_) => return Err(NodeFailure::DependencyFailed(dep)),
            None => {
                // The dependency's task went away without settling.
                warn!(service = %service, dependency = %dep, "dependency state channel closed");
                return Err(NodeFailure::DependencyFailed(dep));
            }
        }
    }
    Ok(())
}

enum PollOutcome {
    Healthy,
    Cancelled,
    GaveUp { attempts: u32, last: HealthStatus },
}

/// Poll the probe every `probe_interval`, at most `probe_retries` times and
/// never past `deadline`. The first attempt always runs.
async fn poll_until_healthy(
    spec: &ServiceSpec,
    started: Instant,
    deadline: Instant,
    cancel: &CancellationToken,
) -> PollOutcome {
    let policy = spec.policy;
    let mut attempts = 0u32;
    let mut last = HealthStatus::Unknown;

    while attempts < policy.probe_retries {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let now = Instant::now();
        if attempts > 0 && now >= deadline {
            break;
        }
        let budget = if attempts == 0 {
            policy.probe_timeout
        } else {
            policy.probe_timeout.min(deadline.saturating_duration_since(now))
        };

        attempts += 1;
        last = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            status = check_with_timeout(spec.probe.as_ref(), budget) => status,
        };

        debug!(
            service = %spec.name,
            attempt = attempts,
            max_attempts = policy.probe_retries,
            status = %last,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe result"
        );

        if last.is_healthy() {
            return PollOutcome::Healthy;
        }
        if attempts >= policy.probe_retries {
            break;
        }

        let wake = (Instant::now() + policy.probe_interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = sleep_until(wake) => {}
        }
    }

    PollOutcome::GaveUp { attempts, last }
}

/// Stop every service that may be running, in reverse topological order.
///
/// Best effort: a failing stop is logged and returned, and the walk goes on.
/// Every stopped service transitions to `Stopped` regardless.
pub async fn teardown(
    graph: &DependencyGraph,
    publishers: &[StatePublisher],
) -> BTreeMap<ServiceName, String> {
    let mut errors = BTreeMap::new();

    for name in graph.shutdown_order() {
        let Some(publisher) = publishers.iter().find(|p| p.service() == name) else {
            continue;
        };
        let state = publisher.current();
        if !state.status.needs_stop() {
            debug!(service = %name, status = %state.status, "nothing to stop");
            continue;
        }
        let Some(spec) = graph.get(name) else {
            continue;
        };

        info!(service = %name, "stopping service");
        if let Err(e) = spec.launcher.stop().await {
            let cause = format!("{e:#}");
            warn!(service = %name, error = %cause, "stop failed; continuing teardown");
            errors.insert(name.to_string(), cause);
        }
        publisher.stopped();
    }

    errors
}

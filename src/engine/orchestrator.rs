// src/engine/orchestrator.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::{
    DependencyGraph, Scheduler, ServiceSpec, ServiceState, StatePublisher, TransitionLog, teardown,
};
use crate::engine::run_result::{RunResult, StatusReport};
use crate::errors::{Result, StackError};
use crate::types::ServiceName;

/// Options for a single `start`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    /// Tear the stack down before returning when the run did not succeed.
    /// The returned result then reflects the post-teardown states.
    pub teardown_on_failure: bool,
}

/// Public façade: owns at most one stack at a time.
///
/// `start` and `stop` take `&self`, so an `Arc<Orchestrator>` can be shared
/// with e.g. a Ctrl-C handler that stops a run still in progress.
#[derive(Debug, Default)]
pub struct Orchestrator {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    run: Option<ActiveRun>,
}

/// Stop failures by service, once teardown has finished.
type TeardownErrors = BTreeMap<ServiceName, String>;

/// Everything retained about the current (or last) run.
#[derive(Debug, Clone)]
struct ActiveRun {
    graph: Arc<DependencyGraph>,
    receivers: BTreeMap<ServiceName, watch::Receiver<ServiceState>>,
    log: TransitionLog,
    cancel: CancellationToken,
    /// Flips to `true` once every service task has finished.
    done: watch::Receiver<bool>,
    /// Publishers handed back by the scheduler, for teardown.
    publishers: Arc<Mutex<Vec<StatePublisher>>>,
    /// Set when teardown begins; carries the stop errors once it has finished.
    teardown: Option<watch::Receiver<Option<TeardownErrors>>>,
}

impl ActiveRun {
    fn snapshot(&self) -> BTreeMap<ServiceName, ServiceState> {
        self.receivers
            .iter()
            .map(|(name, rx)| (name.clone(), rx.borrow().clone()))
            .collect()
    }

    /// Started and not yet completely torn down.
    fn is_active(&self) -> bool {
        match &self.teardown {
            None => true,
            Some(rx) => rx.borrow().is_none(),
        }
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `declaration`, bring the stack up and wait for the run to
    /// finish.
    ///
    /// Fails with [`StackError::AlreadyRunning`] while a previous stack has
    /// not been stopped, and with the graph's validation errors before any
    /// service is touched. Per-service failures are reported in the
    /// returned [`RunResult`], not as an `Err`.
    pub async fn start(
        &self,
        declaration: Vec<ServiceSpec>,
        config: RunConfig,
    ) -> Result<RunResult> {
        let run = {
            let mut inner = self.lock();
            if inner.run.as_ref().is_some_and(ActiveRun::is_active) {
                return Err(StackError::AlreadyRunning);
            }

            let graph = DependencyGraph::build(declaration).inspect_err(|e| {
                if e.is_graph_error() {
                    warn!(error = %e, "declaration rejected; nothing started");
                }
            })?;
            let graph = Arc::new(graph);
            let log = TransitionLog::new();
            let scheduler = Scheduler::new(Arc::clone(&graph), log.clone());
            let cancel = CancellationToken::new();
            let (done_tx, done_rx) = watch::channel(false);
            let publishers = Arc::new(Mutex::new(Vec::new()));

            let run = ActiveRun {
                graph,
                receivers: scheduler.subscribe(),
                log,
                cancel: cancel.clone(),
                done: done_rx,
                publishers: Arc::clone(&publishers),
                teardown: None,
            };
            inner.run = Some(run.clone());

            // The driver outlives this future if the caller stops polling it.
            tokio::spawn(async move {
                let finished = scheduler.run(cancel).await;
                *publishers.lock().unwrap_or_else(PoisonError::into_inner) = finished;
                let _ = done_tx.send(true);
            });

            run
        };

        wait_done(&run).await;

        let result = RunResult::from_run(run.snapshot(), run.log.snapshot());
        info!(
            success = result.success,
            order = ?result.healthy_order(),
            "stack run finished"
        );

        if !result.success && config.teardown_on_failure {
            warn!("run failed; tearing the stack down");
            let stopped = self.stop().await?;
            return Ok(RunResult {
                success: false,
                ..stopped
            });
        }

        Ok(result)
    }

    /// Current state of every service of the current or last run. Empty
    /// before the first `start` and after `reset`.
    pub fn status(&self) -> StatusReport {
        let inner = self.lock();
        StatusReport(
            inner
                .run
                .as_ref()
                .map(ActiveRun::snapshot)
                .unwrap_or_default(),
        )
    }

    /// Cancel an in-flight run, wait for it to wind down, then stop every
    /// service that may be running in reverse dependency order.
    ///
    /// Teardown runs on a task of its own: a caller that stops waiting does
    /// not interrupt it, and concurrent or later calls wait for the same
    /// teardown and report its outcome.
    pub async fn stop(&self) -> Result<RunResult> {
        let (run, mut finished) = {
            let mut inner = self.lock();
            let Some(run) = inner.run.as_mut() else {
                debug!("stop requested but nothing was started");
                return Ok(RunResult::from_teardown(
                    BTreeMap::new(),
                    Vec::new(),
                    BTreeMap::new(),
                ));
            };

            let finished = match &run.teardown {
                Some(rx) => {
                    debug!("teardown already requested; waiting for it");
                    rx.clone()
                }
                None => {
                    let rx = spawn_teardown(run.clone());
                    run.teardown = Some(rx.clone());
                    rx
                }
            };
            (run.clone(), finished)
        };

        let errors = finished
            .wait_for(Option::is_some)
            .await
            .map(|errors| errors.clone().unwrap_or_default())
            .map_err(|_| anyhow::anyhow!("teardown task ended without reporting"))?;

        let result = RunResult::from_teardown(run.snapshot(), run.log.snapshot(), errors);
        info!(
            success = result.success,
            order = ?result.stop_order(),
            "stack stopped"
        );
        Ok(result)
    }

    /// Discard the retained state of a stopped stack.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.run.as_ref().is_some_and(ActiveRun::is_active) {
            return Err(StackError::AlreadyRunning);
        }
        inner.run = None;
        Ok(())
    }

    /// Whether a stack is started and not yet completely torn down.
    pub fn is_running(&self) -> bool {
        self.lock().run.as_ref().is_some_and(ActiveRun::is_active)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancel `run` and stop its services on a spawned task that owns the
/// publishers. The returned receiver turns `Some` when teardown is over.
fn spawn_teardown(run: ActiveRun) -> watch::Receiver<Option<TeardownErrors>> {
    let (tx, rx) = watch::channel(None);

    info!("stopping stack");
    tokio::spawn(async move {
        run.cancel.cancel();
        wait_done(&run).await;

        let publishers = std::mem::take(
            &mut *run
                .publishers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let errors = teardown(&run.graph, &publishers).await;
        let _ = tx.send(Some(errors));
    });

    rx
}

async fn wait_done(run: &ActiveRun) {
    let mut done = run.done.clone();
    // An error means the driver task is gone, which also means it is done.
    let _ = done.wait_for(|d| *d).await;
}

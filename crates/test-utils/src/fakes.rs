use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stackup::exec::{LaunchFuture, Launcher};
use stackup::probe::{Probe, ProbeFuture};
use stackup::types::HealthStatus;
use tokio::sync::Barrier;

/// Shared, ordered record of launcher calls: `"start:db"`, `"stop:db"`, ...
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Service names recorded for `kind` ("start" or "stop"), in order.
    pub fn of_kind(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{kind}:");
        self.snapshot()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn started(&self) -> Vec<String> {
        self.of_kind("start")
    }

    pub fn stopped(&self) -> Vec<String> {
        self.of_kind("stop")
    }
}

/// A launcher that records `start`/`stop` calls instead of spawning
/// anything.
#[derive(Debug)]
pub struct RecordingLauncher {
    name: String,
    events: EventLog,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    start_delay: Option<Duration>,
    stop_delay: Option<Duration>,
    hang_on_start: bool,
    barrier: Option<Arc<Barrier>>,
}

impl RecordingLauncher {
    pub fn new(name: &str, events: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            events: events.clone(),
            fail_start: None,
            fail_stop: None,
            start_delay: None,
            stop_delay: None,
            hang_on_start: false,
            barrier: None,
        }
    }

    /// `start` records the call, then fails with `message`.
    pub fn failing_start(mut self, message: &str) -> Self {
        self.fail_start = Some(message.to_string());
        self
    }

    /// `stop` records the call, then fails with `message`.
    pub fn failing_stop(mut self, message: &str) -> Self {
        self.fail_stop = Some(message.to_string());
        self
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    /// `stop` records the call, then sleeps `delay` before returning.
    pub fn stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = Some(delay);
        self
    }

    /// `start` never completes.
    pub fn hanging(mut self) -> Self {
        self.hang_on_start = true;
        self
    }

    /// `start` waits on `barrier` before returning. With a barrier of size
    /// N, N starts only complete if they run concurrently.
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }
}

impl Launcher for RecordingLauncher {
    fn start(&self) -> LaunchFuture<'_> {
        Box::pin(async move {
            self.events.push(format!("start:{}", self.name));
            if let Some(delay) = self.start_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            if self.hang_on_start {
                std::future::pending::<()>().await;
            }
            match &self.fail_start {
                Some(msg) => Err(anyhow::anyhow!("{msg}")),
                None => Ok(()),
            }
        })
    }

    fn stop(&self) -> LaunchFuture<'_> {
        Box::pin(async move {
            self.events.push(format!("stop:{}", self.name));
            if let Some(delay) = self.stop_delay {
                tokio::time::sleep(delay).await;
            }
            match &self.fail_stop {
                Some(msg) => Err(anyhow::anyhow!("{msg}")),
                None => Ok(()),
            }
        })
    }
}

/// A probe that replays a script of results, then repeats `fallback`.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<HealthStatus>>,
    fallback: HealthStatus,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = HealthStatus>, fallback: HealthStatus) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always(status: HealthStatus) -> Self {
        Self::new(Vec::new(), status)
    }

    /// Every check sleeps `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of checks started so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback)
        })
    }

    fn describe(&self) -> String {
        format!("scripted (fallback {})", self.fallback)
    }
}

// src/probe/log.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use tracing::debug;

use super::{Probe, ProbeFuture};
use crate::types::HealthStatus;

/// Readiness flag flipped by the launcher when a stdout line matches.
///
/// The launcher calls [`observe`](Self::observe) for every line it reads and
/// [`reset`](Self::reset) whenever it starts a fresh process; a
/// [`LogProbe`] reads the flag.
#[derive(Debug)]
pub struct LogReadiness {
    pattern: Regex,
    matched: AtomicBool,
}

impl LogReadiness {
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            matched: AtomicBool::new(false),
        }
    }

    pub fn observe(&self, line: &str) {
        if !self.is_ready() && self.pattern.is_match(line) {
            debug!(pattern = %self.pattern, "stdout matched readiness pattern");
            self.matched.store(true, Ordering::Release);
        }
    }

    pub fn reset(&self) {
        self.matched.store(false, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.matched.load(Ordering::Acquire)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Healthy once the service has printed a line matching its readiness
/// pattern (e.g. `"ready to accept connections"`).
#[derive(Debug, Clone)]
pub struct LogProbe {
    readiness: Arc<LogReadiness>,
}

impl LogProbe {
    pub fn new(readiness: Arc<LogReadiness>) -> Self {
        Self { readiness }
    }
}

impl Probe for LogProbe {
    fn check(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            if self.readiness.is_ready() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unknown
            }
        })
    }

    fn describe(&self) -> String {
        format!("log: /{}/", self.readiness.pattern())
    }
}

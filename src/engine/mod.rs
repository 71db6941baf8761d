// src/engine/mod.rs

//! Orchestration façade.
//!
//! [`Orchestrator`] is the public entry point: it validates a declaration,
//! drives a [`Scheduler`](crate::dag::Scheduler) run on a background task,
//! publishes status snapshots and performs teardown. Results are reported
//! as [`RunResult`] / [`StatusReport`].

pub mod orchestrator;
pub mod run_result;

pub use orchestrator::{Orchestrator, RunConfig};
pub use run_result::{RunResult, StatusReport};

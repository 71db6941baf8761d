// src/dag/mod.rs

//! Dependency graph and scheduling.
//!
//! - [`spec`] describes one service: launcher, probe, dependencies, policy.
//! - [`graph`] validates a declaration and computes the start order.
//! - [`state`] holds per-run service state and its single-writer publisher.
//! - [`scheduler`] runs the per-service state machines and teardown.

pub mod graph;
pub mod scheduler;
pub mod spec;
pub mod state;

pub use graph::DependencyGraph;
pub use scheduler::{Scheduler, teardown};
pub use spec::{HealthPolicy, ServiceSpec};
pub use state::{ServiceState, StatePublisher, Transition, TransitionLog};

// src/exec/backend.rs

//! Pluggable launcher abstraction.
//!
//! Production code uses [`CommandLauncher`](super::CommandLauncher); tests
//! provide their own implementations that, for example, record the order in
//! which services were started or fail on demand.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

/// Boxed future returned by [`Launcher`] operations.
pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how a single service is brought up and torn down.
///
/// `start` returning `Ok` means "launched", not "ready": readiness is the
/// probe's job. An `Err` from `start` fails the service immediately.
pub trait Launcher: Send + Sync + Debug {
    /// Launch the service.
    fn start(&self) -> LaunchFuture<'_>;

    /// Stop the service. Called at most once per successful or in-flight
    /// `start`, in reverse dependency order.
    fn stop(&self) -> LaunchFuture<'_>;
}

// src/exec/mod.rs

//! Service start/stop operations.
//!
//! The scheduler never spawns processes itself. It talks to a [`Launcher`]
//! per service, which makes it easy to swap in fakes in tests while keeping
//! the production implementation in [`command`].
//!
//! - [`backend`] defines the `Launcher` trait.
//! - [`command`] implements it with shell commands via
//!   `tokio::process::Command`, optionally feeding stdout to a log-based
//!   readiness probe.

pub mod backend;
pub mod command;

pub use backend::{LaunchFuture, Launcher};
pub use command::CommandLauncher;

use tokio::process::Command;

/// Build a shell command appropriate for the platform.
pub fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

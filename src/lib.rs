// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod probe;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::StackFile;
use crate::engine::{Orchestrator, RunConfig, RunResult, StatusReport};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - manifest loading and validation
/// - the orchestrator run
/// - Ctrl-C handling and teardown
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let manifest = load_and_validate(&config_path)
        .with_context(|| format!("loading manifest {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&manifest)?;
        return Ok(0);
    }

    let declaration = manifest.declaration()?;
    let orchestrator = Arc::new(Orchestrator::new());

    // Ctrl-C → graceful shutdown.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            shutdown.cancel();
        });
    }

    let config = RunConfig {
        teardown_on_failure: true,
    };

    let started = tokio::select! {
        res = orchestrator.start(declaration, config) => res?,
        _ = shutdown.cancelled() => {
            warn!("interrupted during startup; tearing the stack down");
            let stopped = orchestrator.stop().await?;
            print_report(&stopped, args.json)?;
            return Ok(1);
        }
    };

    print_report(&started, args.json)?;
    if !started.success {
        for (name, state) in started.failures() {
            if let Some(err) = &state.last_error {
                warn!(service = %name, error = %err, "service did not become healthy");
            }
        }
        return Ok(started.exit_code());
    }

    if args.once {
        debug!("--once given; tearing down immediately");
    } else {
        info!("stack is up; press Ctrl-C to stop");
        shutdown.cancelled().await;
    }

    let stopped = orchestrator.stop().await?;
    print_report(&stopped, args.json)?;
    Ok(stopped.exit_code())
}

/// Per-service table (or JSON object) on stdout.
fn print_report(result: &RunResult, json: bool) -> Result<()> {
    let report = StatusReport(result.services.clone());
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let width = report.iter().map(|(n, _)| n.len()).max().unwrap_or(0).max(7);
    println!("{:<width$}  {:<15}  {}", "SERVICE", "STATUS", "DETAIL");
    for (name, state) in report.iter() {
        let detail = state.last_error.as_deref().unwrap_or("");
        println!("{:<width$}  {:<15}  {}", name, state.status.to_string(), detail);
    }
    for (name, err) in result.teardown_errors.iter() {
        println!("stop of '{name}' failed: {err}");
    }
    Ok(())
}

/// Validate only: print services, start order and shutdown order.
fn print_dry_run(manifest: &StackFile) -> Result<()> {
    let order = manifest.start_order()?;

    println!("stackup dry-run");
    println!("  defaults.startup_timeout = {:?}", manifest.defaults.startup_timeout.0);
    println!("  defaults.probe_interval = {:?}", manifest.defaults.probe_interval.0);
    println!("  defaults.probe_retries = {}", manifest.defaults.probe_retries);
    println!("  defaults.probe_timeout = {:?}", manifest.defaults.probe_timeout.0);
    println!();

    println!("services ({}):", manifest.service.len());
    for svc in manifest.service.iter() {
        println!("  - {}", svc.name);
        println!("      start: {}", svc.start);
        if let Some(stop) = &svc.stop {
            println!("      stop: {stop}");
        }
        if !svc.depends_on.is_empty() {
            println!("      depends_on: {:?}", svc.depends_on);
        }
        if svc.detach {
            println!("      detach: true");
        }
        if let Some(kind) = svc.healthcheck.as_ref().and_then(|hc| hc.kind()) {
            println!("      healthcheck: {kind:?}");
        }
    }
    println!();

    println!("start order: {}", order.join(" -> "));
    let shutdown: Vec<&str> = order.iter().rev().copied().collect();
    println!("shutdown order: {}", shutdown.join(" -> "));

    debug!("dry-run complete (nothing started)");
    Ok(())
}

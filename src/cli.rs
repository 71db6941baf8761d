// src/cli.rs

//! CLI argument parsing using `clap` derive.

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `stackup`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stackup",
    version,
    about = "Start a stack of services in dependency order, waiting for each to become healthy.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the stack manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Start the stack, report, tear it down and exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STACKUP_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the manifest and print start/shutdown order without running
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print service status as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_stackup_toml() {
        let args = CliArgs::try_parse_from(["stackup"]).unwrap();
        assert_eq!(args.config, "Stackup.toml");
        assert!(!args.once && !args.dry_run && !args.json);
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "stackup",
            "--config",
            "dev/stack.toml",
            "--once",
            "--json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "dev/stack.toml");
        assert!(args.once);
        assert!(args.json);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }
}

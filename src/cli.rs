// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `devloop`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "devloop",
    version,
    about = "Rebuild, restart and re-attach a debugger to a program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// A missing file is not an error; built-in defaults are used instead.
    #[arg(long, value_name = "PATH", default_value = "devloop.toml")]
    pub config: String,

    /// Project directory to build and watch (overrides `app_path`).
    #[arg(long, value_name = "DIR")]
    pub path: Option<String>,

    /// Name of the binary to build (overrides `app_name`).
    #[arg(long, value_name = "NAME")]
    pub binary: Option<String>,

    /// Preferred debugger port (overrides `listen_port`).
    #[arg(long, value_name = "PORT")]
    pub listen: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build and start the program once, without watching for changes.
    #[arg(long)]
    pub no_watch: bool,

    /// Load and validate the config, print it, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

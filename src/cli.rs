// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `stackctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stackctl",
    version,
    about = "Run the application server, background worker and asset dev-server.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `--verbose`, `STACKCTL_LOG` or `LOG_LEVEL` decide.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run application services.
    #[command(subcommand)]
    Serve(ServeCommand),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ServeCommand {
    /// Start the HTTP server and background worker in a single command.
    RunAll(RunAllArgs),

    /// Run the background job worker (started by `run-all`).
    Worker(WorkerArgs),

    /// Print a system health snapshot.
    Health,
}

/// Flags for `serve run-all`. Every value is optional so that settings can
/// supply the default.
#[derive(Debug, Clone, Default, Args)]
pub struct RunAllArgs {
    /// Host interface to listen on. Use 0.0.0.0 for all available interfaces.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to bind.
    #[arg(short, long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// The number of HTTP worker processes for handling requests.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub http_workers: Option<u64>,

    /// The number of simultaneous jobs a worker process can execute.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub worker_concurrency: Option<u64>,

    /// Enable reload.
    #[arg(short, long)]
    pub reload: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debugging.
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct WorkerArgs {
    /// Jobs each queue may run at once. Defaults to `WORKER_CONCURRENCY`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,
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

impl LogLevel {
    /// Flag value used when forwarding the level to a child process.
    pub fn as_arg(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

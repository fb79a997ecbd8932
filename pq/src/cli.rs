//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::queue::DispatchMode;

/// pq - run operations through a start-rate limited queue
#[derive(Debug, Parser)]
#[command(
    name = "pq",
    about = "Start-rate limited FIFO queue for asynchronous operations",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Push synthetic operations through a queue and print when each started
    Demo {
        /// Number of operations to submit
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,

        /// Minimum delay between starts (overrides config)
        #[arg(short = 'd', long)]
        min_delay_ms: Option<u64>,

        /// How long each operation works before finishing
        #[arg(short, long, default_value_t = 0)]
        work_ms: u64,

        /// Make every K-th operation fail (0 disables)
        #[arg(short, long, default_value_t = 0)]
        fail_every: u32,

        /// Make the operation with this 1-based index panic
        #[arg(long)]
        panic_at: Option<u32>,

        /// Provider whose queue settings to use
        #[arg(short, long)]
        provider: Option<String>,

        /// Dispatch mode (overrides config)
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<DispatchMode>,
    },

    /// Print the effective configuration
    Config,
}

fn parse_mode(s: &str) -> Result<DispatchMode, String> {
    match s.to_lowercase().as_str() {
        "sequential" => Ok(DispatchMode::Sequential),
        "paced" => Ok(DispatchMode::Paced),
        other => Err(format!("unknown dispatch mode '{}' (expected sequential or paced)", other)),
    }
}

//! pq - start-rate limited queue
//!
//! CLI entry point for exercising queues built from configuration.

use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use pacequeue::cli::{Cli, Command};
use pacequeue::config::Config;
use pacequeue::demo::{self, DemoOptions, DemoOutcome, DemoSummary};
use pacequeue::queue::RateQueue;

fn parse_level(s: &str) -> tracing::Level {
    match s.to_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = cli_log_level
        .or(config_log_level)
        .map(parse_level)
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Demo {
            count,
            min_delay_ms,
            work_ms,
            fail_every,
            panic_at,
            provider,
            mode,
        } => {
            let mut queue_config = match provider.as_deref() {
                Some(name) => config.provider(name),
                None => config.queue.clone(),
            };
            if let Some(ms) = min_delay_ms {
                queue_config.min_delay_ms = ms;
            }
            if let Some(mode) = mode {
                queue_config.dispatch = mode;
            }

            let options = DemoOptions {
                count,
                work: Duration::from_millis(work_ms),
                fail_every,
                panic_at,
            };
            cmd_demo(RateQueue::new(queue_config), options).await
        }
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_demo(queue: RateQueue, options: DemoOptions) -> Result<()> {
    info!(count = options.count, min_delay = ?queue.min_delay(), mode = %queue.mode(), "Running demo");
    println!(
        "{} {} operations, min delay {}ms, {} dispatch",
        "▶".cyan(),
        options.count,
        queue.min_delay().as_millis(),
        queue.mode()
    );

    let lines = demo::run(&queue, &options).await;

    for line in &lines {
        let started = match line.started {
            Some(started) => format!("+{}ms", started.as_millis()),
            None => "-".to_string(),
        };
        let outcome = match &line.outcome {
            DemoOutcome::Ok => "ok".green(),
            DemoOutcome::Failed(msg) => format!("failed: {}", msg).red(),
            DemoOutcome::Panicked(msg) => format!("panicked: {}", msg).red().bold(),
            DemoOutcome::Abandoned => "abandoned".yellow(),
        };
        println!("  #{:<4} {:>10}  {}", line.seq, started.dimmed(), outcome);
    }

    let summary = DemoSummary::from_lines(&lines);
    println!(
        "{} {} ok, {} failed, {} panicked",
        "✓".green(),
        summary.ok,
        summary.failed,
        summary.panicked
    );
    if summary.abandoned > 0 {
        println!("  {} {} abandoned", "!".yellow(), summary.abandoned);
    }

    // Dispatch-side counters are final once every ticket has resolved.
    let stats = queue.stats();
    if let Some(wait) = stats.average_wait() {
        println!("  {} dispatched, average wait {}ms", stats.dispatched, wait.as_millis());
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

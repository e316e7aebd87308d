//! mst-server - Multi-client minimum spanning tree server
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use mst_server::config::{CliArgs, LogLevel, ServerConfig};
use mst_server::server::{Server, ServerSummary};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Validate and create config
    let config = ServerConfig::from_args(args).context("Invalid configuration")?;

    // Setup logging
    setup_logging(config.log_level)?;

    let server = Server::bind(config.clone())
        .with_context(|| format!("Failed to bind {}", config.address))?;

    // Setup signal handler for graceful shutdown
    let shutdown_flag = server.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let summary = server.run().context("Server failed")?;
    print_summary(&summary);

    Ok(())
}

fn setup_logging(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.filter()))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn print_summary(summary: &ServerSummary) {
    let stopped_by = if summary.shutdown_by_client {
        "client request"
    } else {
        "signal"
    };

    info!(
        started = %summary.started_at.to_rfc3339(),
        stopped_by,
        abandoned = summary.abandoned_sessions,
        "Run summary"
    );

    eprintln!();
    eprintln!("Server stopped ({})", stopped_by);
    eprintln!("  Started:      {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    eprintln!("  Uptime:       {:.1}s", summary.duration.as_secs_f64());
    eprintln!("  Connections:  {}", summary.connections);
    eprintln!("  Mutations:    {} ({} rejected)", summary.graph_mutations, summary.rejected_mutations);
}

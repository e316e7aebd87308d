//! Configuration types for mst-server
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::mst::Strategy;
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Largest graph a client may install
const MAX_VERTEX_LIMIT: usize = 16_384;

/// Multi-client MST graph server
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mst-server",
    version,
    about = "Multi-client TCP server for minimum spanning tree queries",
    long_about = "Serves one shared weighted graph over a line-oriented text protocol.\n\n\
                  Clients install or edit the graph and query its minimum spanning tree:\n\
                  total weight, shortest and longest path, average edge weight and the\n\
                  tree matrix.",
    after_help = "EXAMPLES:\n    \
        mst-server\n    \
        mst-server -P 9034 -w 8\n    \
        mst-server --scheduler pipeline --strategy boruvka\n    \
        mst-server --bind 127.0.0.1 -P 0 -v"
)]
pub struct CliArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDR")]
    pub bind: String,

    /// Port to listen on (0 picks a free port)
    #[arg(short = 'P', long, default_value_t = 8080, value_name = "PORT")]
    pub port: u16,

    /// Concurrency architecture
    #[arg(short = 's', long, value_enum, default_value_t = SchedulerKind::LeaderFollower)]
    pub scheduler: SchedulerKind,

    /// Worker threads in the leader-follower pool
    #[arg(short = 'w', long, default_value_t = 5, value_name = "NUM")]
    pub workers: usize,

    /// MST strategy (kruskal or boruvka)
    #[arg(long, default_value = "kruskal", value_name = "NAME")]
    pub strategy: String,

    /// Largest vertex count a client may request
    #[arg(long, default_value_t = 1024, value_name = "NUM")]
    pub max_vertices: usize,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Quiet mode - warnings and errors only
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// How client sessions are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchedulerKind {
    /// Fixed worker pool, one session per worker
    LeaderFollower,
    /// Three single-threaded stages per session
    Pipeline,
}

impl SchedulerKind {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerKind::LeaderFollower => "leader-follower",
            SchedulerKind::Pipeline => "pipeline",
        }
    }
}

/// Log verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    /// Filter directive for tracing-subscriber
    pub fn filter(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "mst_server=warn,warn",
            LogLevel::Normal => "mst_server=info,warn",
            LogLevel::Verbose => "mst_server=debug,warn",
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub address: SocketAddr,

    /// Concurrency architecture
    pub scheduler: SchedulerKind,

    /// Pool size (leader-follower only)
    pub worker_count: usize,

    /// MST strategy
    pub strategy: Strategy,

    /// Largest vertex count accepted from a client
    pub max_vertices: usize,

    /// Log verbosity
    pub log_level: LogLevel,
}

impl ServerConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let ip: IpAddr = args
            .bind
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidBindAddress {
                address: args.bind.clone(),
                reason: e.to_string(),
            })?;

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate vertex limit
        if args.max_vertices == 0 || args.max_vertices > MAX_VERTEX_LIMIT {
            return Err(ConfigError::InvalidVertexLimit {
                limit: args.max_vertices,
                max: MAX_VERTEX_LIMIT,
            });
        }

        let strategy = args.strategy.parse::<Strategy>()?;

        let log_level = if args.verbose {
            LogLevel::Verbose
        } else if args.quiet {
            LogLevel::Quiet
        } else {
            LogLevel::Normal
        };

        Ok(Self {
            address: SocketAddr::new(ip, args.port),
            scheduler: args.scheduler,
            worker_count: args.workers,
            strategy,
            max_vertices: args.max_vertices,
            log_level,
        })
    }

    /// Loopback configuration on an ephemeral port
    pub fn local(scheduler: SchedulerKind) -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            scheduler,
            worker_count: 5,
            strategy: Strategy::default(),
            max_vertices: 1024,
            log_level: LogLevel::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("mst-server").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_args(parse(&[])).unwrap();
        assert_eq!(config.address, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.scheduler, SchedulerKind::LeaderFollower);
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.strategy, Strategy::Kruskal);
        assert_eq!(config.max_vertices, 1024);
        assert_eq!(config.log_level, LogLevel::Normal);
    }

    #[test]
    fn test_full_command_line() {
        let config = ServerConfig::from_args(parse(&[
            "--bind",
            "127.0.0.1",
            "-P",
            "9034",
            "-s",
            "pipeline",
            "-w",
            "8",
            "--strategy",
            "boruvka",
            "--max-vertices",
            "64",
            "-v",
        ]))
        .unwrap();

        assert_eq!(config.address, "127.0.0.1:9034".parse::<SocketAddr>().unwrap());
        assert_eq!(config.scheduler, SchedulerKind::Pipeline);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.strategy, Strategy::Boruvka);
        assert_eq!(config.max_vertices, 64);
        assert_eq!(config.log_level, LogLevel::Verbose);
    }

    #[test]
    fn test_invalid_worker_count() {
        let err = ServerConfig::from_args(parse(&["-w", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 0, .. }));

        let err = ServerConfig::from_args(parse(&["-w", "513"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 513, .. }));
    }

    #[test]
    fn test_invalid_vertex_limit() {
        let err = ServerConfig::from_args(parse(&["--max-vertices", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVertexLimit { limit: 0, .. }));
    }

    #[test]
    fn test_invalid_bind_address() {
        let err = ServerConfig::from_args(parse(&["--bind", "not-an-ip"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBindAddress { .. }));
    }

    #[test]
    fn test_unknown_strategy() {
        let err = ServerConfig::from_args(parse(&["--strategy", "prim"])).unwrap_err();
        assert!(matches!(err, ConfigError::Strategy(_)));
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let result = CliArgs::try_parse_from(["mst-server", "-q", "-v"]);
        assert!(result.is_err());

        let config = ServerConfig::from_args(parse(&["-q"])).unwrap();
        assert_eq!(config.log_level.filter(), "mst_server=warn,warn");
    }
}

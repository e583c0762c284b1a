//! Command-line arguments for the Pulse server.
//!
//! Every option can also be supplied through a `PULSE_*` environment variable.
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::Settings;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Ingests data sources and broadcasts throughput and health", long_about = None)]
pub struct Args {
    /// Seconds between live ingestion ticks.
    #[arg(long, env = "PULSE_POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Accepted for compatibility; failed pulls are retried on the next tick only.
    #[arg(long, env = "PULSE_RETRY_COUNT", default_value_t = 3)]
    pub retry_count: u32,

    /// Accepted for compatibility; see `--retry-count`.
    #[arg(long, env = "PULSE_RETRY_DELAY_SECS", default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// Seed demo data and run the synthetic ingestion trigger.
    #[arg(long, env = "PULSE_DEMO")]
    pub demo: bool,

    /// Seconds between synthetic ticks in demo mode.
    #[arg(long, env = "PULSE_SYNTHETIC_INTERVAL_SECS", default_value_t = 3)]
    pub synthetic_interval_secs: u64,

    /// Seconds between scheduled health checks.
    #[arg(long, env = "PULSE_HEALTH_INTERVAL_SECS", default_value_t = 30)]
    pub health_interval_secs: u64,

    /// Let a trigger fire while its previous run is still in progress.
    #[arg(long, env = "PULSE_ALLOW_OVERLAP")]
    pub allow_overlap: bool,

    /// Per-request timeout for feed and API pulls.
    #[arg(long, env = "PULSE_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight ticks.
    #[arg(long, env = "PULSE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Queued events per observer before new ones are dropped.
    #[arg(long, env = "PULSE_OBSERVER_BUFFER", default_value_t = 256)]
    pub observer_buffer: usize,

    /// Fewest records per synthetic tick.
    #[arg(long, env = "PULSE_BATCH_MIN", default_value_t = 3)]
    pub batch_min: usize,

    /// Most records per synthetic tick.
    #[arg(long, env = "PULSE_BATCH_MAX", default_value_t = 6)]
    pub batch_max: usize,

    /// Seed for every random source, for reproducible runs.
    #[arg(long, env = "PULSE_SEED")]
    pub seed: Option<u64>,

    /// JSON file with data source definitions to load at startup.
    #[arg(long, env = "PULSE_SOURCES")]
    pub sources: Option<PathBuf>,

    /// Address the command and data sockets bind to.
    #[arg(long, env = "PULSE_BIND_IP", default_value = "0.0.0.0")]
    pub bind_ip: IpAddr,
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Settings {
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            retry_count: args.retry_count,
            retry_delay: Duration::from_secs(args.retry_delay_secs),
            demo: args.demo,
            synthetic_interval: Duration::from_secs(args.synthetic_interval_secs),
            health_interval: Duration::from_secs(args.health_interval_secs),
            allow_overlap: args.allow_overlap,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            observer_buffer: args.observer_buffer,
            batch_min: args.batch_min,
            batch_max: args.batch_max,
            seed: args.seed,
            sources: args.sources,
            bind_ip: args.bind_ip,
        }
    }
}

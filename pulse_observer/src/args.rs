//! Command-line arguments for the Pulse observer.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use uuid::Uuid;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the pulse server is running.
    #[arg(long, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// Local UDP port to receive events on; 0 picks a free port.
    #[arg(long, default_value_t = 0)]
    pub listen_port: u16,

    /// Join the group of a data source after subscribing. Repeatable.
    #[arg(long = "source", value_name = "SOURCE_ID")]
    pub sources: Vec<Uuid>,

    /// Print the active data sources and exit.
    #[arg(long)]
    pub list_sources: bool,

    /// Run a health check, print the snapshot and exit.
    #[arg(long)]
    pub check_health: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_are_repeatable() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let args = Args::try_parse_from([
            "pulse_observer",
            "--source",
            &a.to_string(),
            "--source",
            &b.to_string(),
        ])
        .unwrap();
        assert_eq!(args.sources, vec![a, b]);
        assert_eq!(args.server_ip, "127.0.0.1");
        assert_eq!(args.listen_port, 0);
    }

    #[test]
    fn rejects_malformed_source_ids() {
        assert!(Args::try_parse_from(["pulse_observer", "--source", "not-a-uuid"]).is_err());
    }
}

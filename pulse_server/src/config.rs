//! Runtime settings of the server.
//!
//! `Settings` is what the library consumes; the binary builds it from `Args`.
//! Data sources can additionally be loaded from a JSON file with `load_sources`.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use pulse_common::model::DataSource;
use pulse_common::{PulseError, Result};

use crate::coordinator::DEFAULT_BATCH;
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Interval of the live ingestion trigger.
    pub poll_interval: Duration,
    /// Parsed for compatibility; no inline retries are performed.
    pub retry_count: u32,
    /// Parsed for compatibility; no inline retries are performed.
    pub retry_delay: Duration,
    pub demo: bool,
    pub synthetic_interval: Duration,
    pub health_interval: Duration,
    pub allow_overlap: bool,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub observer_buffer: usize,
    pub batch_min: usize,
    pub batch_max: usize,
    pub seed: Option<u64>,
    pub sources: Option<PathBuf>,
    pub bind_ip: IpAddr,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            retry_count: 3,
            retry_delay: Duration::from_secs(5),
            demo: false,
            synthetic_interval: Duration::from_secs(3),
            health_interval: Duration::from_secs(30),
            allow_overlap: false,
            request_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
            observer_buffer: 256,
            batch_min: *DEFAULT_BATCH.start(),
            batch_max: *DEFAULT_BATCH.end(),
            seed: None,
            sources: None,
            bind_ip: IpAddr::from([0, 0, 0, 0]),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        for (name, interval) in [
            ("poll interval", self.poll_interval),
            ("synthetic interval", self.synthetic_interval),
            ("health interval", self.health_interval),
        ] {
            if interval.is_zero() {
                return Err(PulseError::Config(format!("{} must be at least one second", name)));
            }
        }
        if self.batch_min == 0 || self.batch_min > self.batch_max {
            return Err(PulseError::Config(format!(
                "invalid batch range {}..={}",
                self.batch_min, self.batch_max
            )));
        }
        if self.observer_buffer == 0 {
            return Err(PulseError::Config("observer buffer must be positive".to_string()));
        }
        Ok(())
    }
}

/// Read a JSON array of data source definitions.
pub fn load_sources(path: &Path) -> Result<Vec<DataSource>> {
    let text = fs::read_to_string(path)?;
    let sources: Vec<DataSource> = serde_json::from_str(&text)?;
    Ok(sources)
}

/// Load the sources file into the store, skipping ids that are already present.
pub fn import_sources(path: &Path, store: &dyn Storage) -> Result<usize> {
    let mut added = 0;
    for source in load_sources(path)? {
        if store.sources().get_by_id(source.id)?.is_some() {
            continue;
        }
        store.sources().add(source)?;
        added += 1;
    }
    if added > 0 {
        store.commit()?;
    }
    info!("Imported {} data source(s) from {}", added, path.display());
    Ok(added)
}

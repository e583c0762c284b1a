//! One ingestion pass over the configured sources.
//!
//! A `Coordinator` runs in one of two modes:
//! - `Live` pulls every active source through the adapter for its kind. The
//!   success/error split is measured: persisted records versus failed pulls and
//!   failed writes.
//! - `Synthetic` draws a batch of symbols, walks their prices and attributes each
//!   record to a source. Its success/error split is cosmetic: a random 90 to 98% of
//!   the emitted records count as successes.
//!
//! A failing source is logged and skipped, the rest of the tick carries on. A failure
//! anywhere else in the tick is logged at the top of `run_tick` and the tick becomes
//! a no-op; nothing propagates to the scheduler.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, error, info};
use pulse_common::Result;
use pulse_common::model::{DataSource, IngestedRecord, TickSummary};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum::Display;

use crate::adapter::Adapters;
use crate::health::{HealthTracker, RateTracker};
use crate::publisher::Publisher;
use crate::storage::Storage;

/// Default number of synthetic records per tick.
pub const DEFAULT_BATCH: RangeInclusive<usize> = 3..=6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IngestMode {
    Live,
    Synthetic,
}

/// Shared collaborators of every coordinator in the process.
#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<dyn Storage>,
    pub adapters: Arc<Adapters>,
    pub rates: Arc<RateTracker>,
    pub health: Arc<HealthTracker>,
    pub publisher: Arc<Publisher>,
}

pub struct Coordinator {
    mode: IngestMode,
    pipeline: Pipeline,
    batch: RangeInclusive<usize>,
    rng: Mutex<StdRng>,
}

struct Persisted {
    written: u64,
    failed: u64,
}

impl Coordinator {
    /// Coordinator with the default synthetic batch size and an OS-seeded rng.
    pub fn new(mode: IngestMode, pipeline: Pipeline) -> Self {
        Self {
            mode,
            pipeline,
            batch: DEFAULT_BATCH,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Synthetic batch size bounds; an inverted range collapses to `min`.
    pub fn with_batch(mut self, min: usize, max: usize) -> Self {
        self.batch = min..=max.max(min);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Run one tick. Never fails: a broken tick is logged and reported as empty.
    pub fn run_tick(&self) -> TickSummary {
        match self.try_tick() {
            Ok(summary) => summary,
            Err(e) => {
                error!("{} ingestion tick failed: {}", self.mode, e);
                TickSummary::empty(Utc::now(), self.pipeline.rates.total())
            }
        }
    }

    fn try_tick(&self) -> Result<TickSummary> {
        let now = Utc::now();
        let sources: Vec<DataSource> = self
            .pipeline
            .store
            .sources()
            .get_all()?
            .into_iter()
            .filter(|s| s.is_active)
            .collect();

        if sources.is_empty() {
            debug!("{} tick: no active sources", self.mode);
            return Ok(TickSummary::empty(now, self.pipeline.rates.total()));
        }

        let (emitted, success_count, error_count) = match self.mode {
            IngestMode::Live => self.pull_live(&sources),
            IngestMode::Synthetic => self.generate_synthetic(&sources)?,
        };

        let summary = self
            .pipeline
            .rates
            .record_tick(now, emitted, success_count, error_count)?;
        info!(
            "{} tick: {} record(s) from {} source(s), {} ok / {} failed, {} total",
            self.mode,
            summary.rate,
            sources.len(),
            summary.success_count,
            summary.error_count,
            summary.total_records
        );
        self.report(&summary);
        Ok(summary)
    }

    fn pull_live(&self, sources: &[DataSource]) -> (u64, u64, u64) {
        let mut written = 0;
        let mut failed = 0;

        for source in sources {
            match self.pipeline.adapters.for_kind(source.kind).pull(source) {
                Ok(records) => {
                    let persisted = self.persist(records);
                    written += persisted.written;
                    failed += persisted.failed;
                }
                Err(e) => {
                    error!("Error ingesting {} source '{}': {}", source.kind, source.name, e);
                    failed += 1;
                }
            }
        }
        (written, written, failed)
    }

    fn generate_synthetic(&self, sources: &[DataSource]) -> Result<(u64, u64, u64)> {
        let synthetic = self.pipeline.adapters.synthetic();
        let mut rng = self.rng.lock()?;

        let count = rng.random_range(self.batch.clone());
        let picks = synthetic.pick_symbols(count, &mut *rng);
        let records = synthetic.generate(&picks, sources, &mut *rng)?;
        let persisted = self.persist(records);

        let ratio = rng.random_range(0.90..=0.98);
        let success_count = ((persisted.written as f64) * ratio).round() as u64;
        Ok((
            persisted.written,
            success_count,
            persisted.written - success_count,
        ))
    }

    /// Stage every record and commit once. Records whose write fails are counted, not retried.
    fn persist(&self, records: Vec<IngestedRecord>) -> Persisted {
        let store = &self.pipeline.store;
        let mut staged = 0;
        let mut failed = 0;

        for record in records {
            let symbol = record.symbol.clone();
            match store.records().add(record) {
                Ok(()) => staged += 1,
                Err(e) => {
                    error!("Failed to store record for '{}': {}", symbol, e);
                    failed += 1;
                }
            }
        }
        if staged == 0 {
            return Persisted { written: 0, failed };
        }
        match store.commit() {
            Ok(_) => Persisted {
                written: staged,
                failed,
            },
            Err(e) => {
                error!("Failed to commit {} record(s): {}", staged, e);
                Persisted {
                    written: 0,
                    failed: failed + staged,
                }
            }
        }
    }

    fn report(&self, summary: &TickSummary) {
        let publisher = &self.pipeline.publisher;
        if let Err(e) = publisher.publish_ingestion_update(summary) {
            error!("Failed to publish ingestion update: {}", e);
        }
        match self.pipeline.health.check_health() {
            Ok(record) => {
                if let Err(e) = publisher.publish_health_update(&record) {
                    error!("Failed to publish health update: {}", e);
                }
            }
            Err(e) => error!("Health check failed: {}", e),
        }
    }
}

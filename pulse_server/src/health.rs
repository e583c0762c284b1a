//! Rate and health bookkeeping.
//!
//! `RateTracker` keeps the running record total and the latest tick summary.
//! `HealthTracker` appends health records to the store and assembles the current
//! per-component snapshot from the history. Reads never fail: a storage error
//! degrades to an empty snapshot, an empty history to the default component set.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, error};
use pulse_common::Result;
use pulse_common::model::{HealthMetrics, HealthRecord, HealthStatus, TickSummary};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::Storage;

/// Components reported when no health history exists, and drawn from in synthetic mode.
pub const COMPONENTS: [&str; 5] = ["Database", "API", "Ingestion", "Broadcast", "Gateway"];

/// Group name for records stored without a component.
const UNNAMED_COMPONENT: &str = "System";

/// Running throughput counters.
#[derive(Default)]
pub struct RateTracker {
    total: AtomicU64,
    latest: Mutex<Option<TickSummary>>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `emitted` to the running total and remember the resulting summary.
    pub fn record_tick(
        &self,
        timestamp: DateTime<Utc>,
        emitted: u64,
        success_count: u64,
        error_count: u64,
    ) -> Result<TickSummary> {
        let total_records = self.total.fetch_add(emitted, Ordering::SeqCst) + emitted;
        let summary = TickSummary {
            timestamp,
            rate: emitted,
            total_records,
            success_count,
            error_count,
        };
        *self.latest.lock()? = Some(summary.clone());
        Ok(summary)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn latest(&self) -> Option<TickSummary> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }
}

/// Produces health records and the current per-component view.
pub struct HealthTracker {
    store: Arc<dyn Storage>,
    synthetic: bool,
    rng: Mutex<StdRng>,
}

impl HealthTracker {
    /// `synthetic` selects randomized component health instead of the nominal system record.
    pub fn new(store: Arc<dyn Storage>, synthetic: bool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store,
            synthetic,
            rng: Mutex::new(rng),
        }
    }

    /// Produce one health record and persist it.
    pub fn check_health(&self) -> Result<HealthRecord> {
        let now = Utc::now();
        let record = if self.synthetic {
            let mut rng = self.rng.lock()?;
            synthetic_record(&mut *rng, now)
        } else {
            HealthRecord {
                name: "System".to_string(),
                ..HealthRecord::new("Infrastructure", HealthStatus::Healthy, now)
            }
            .with_message("All systems nominal")
        };

        self.store.health().add(record.clone())?;
        self.store.commit()?;
        debug!("Health check: {} is {}", record.component, record.status);
        Ok(record)
    }

    /// Latest record per component, or the default set when there is no history.
    pub fn current_snapshot(&self) -> Vec<HealthRecord> {
        match self.store.health().get_all() {
            Ok(history) if history.is_empty() => default_snapshot(Utc::now()),
            Ok(history) => latest_per_component(history),
            Err(e) => {
                error!("Failed to read health history: {}", e);
                Vec::new()
            }
        }
    }
}

fn synthetic_record<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> HealthRecord {
    let component = COMPONENTS[rng.random_range(0..COMPONENTS.len())];
    let roll: f64 = rng.random();
    let status = if roll < 0.80 {
        HealthStatus::Healthy
    } else if roll < 0.95 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };
    let metrics = HealthMetrics {
        cpu_usage: rng.random_range(10..85),
        memory_usage: rng.random_range(15..80),
        response_time_ms: rng.random_range(20..400),
    };
    HealthRecord::new(component, status, now).with_metrics(metrics)
}

/// Keep the most recent record per component. Later history entries win timestamp ties.
pub fn latest_per_component(history: Vec<HealthRecord>) -> Vec<HealthRecord> {
    let mut latest: BTreeMap<String, HealthRecord> = BTreeMap::new();
    for mut record in history {
        if record.component.trim().is_empty() {
            record.component = UNNAMED_COMPONENT.to_string();
        }
        match latest.get(&record.component) {
            Some(current) if current.timestamp > record.timestamp => {}
            _ => {
                latest.insert(record.component.clone(), record);
            }
        }
    }
    latest.into_values().collect()
}

/// Every standard component, Healthy, with default metrics.
pub fn default_snapshot(now: DateTime<Utc>) -> Vec<HealthRecord> {
    COMPONENTS
        .iter()
        .map(|c| HealthRecord::new(c, HealthStatus::Healthy, now).with_metrics(HealthMetrics::default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Repository, UnitOfWork};
    use chrono::Duration;
    use pulse_common::model::{DataSource, IngestedRecord};
    use pulse_common::{PulseError, Result};
    use uuid::Uuid;

    struct BrokenHealth;

    impl Repository<HealthRecord> for BrokenHealth {
        fn get_all(&self) -> Result<Vec<HealthRecord>> {
            Err(PulseError::Storage("disk on fire".to_string()))
        }
        fn get_by_id(&self, _id: Uuid) -> Result<Option<HealthRecord>> {
            Err(PulseError::Storage("disk on fire".to_string()))
        }
        fn add(&self, _entity: HealthRecord) -> Result<()> {
            Err(PulseError::Storage("disk on fire".to_string()))
        }
        fn update(&self, _entity: HealthRecord) -> Result<()> {
            Ok(())
        }
        fn remove(&self, _entity: &HealthRecord) -> Result<()> {
            Ok(())
        }
    }

    struct BrokenStore {
        inner: MemoryStore,
        health: BrokenHealth,
    }

    impl UnitOfWork for BrokenStore {
        fn commit(&self) -> Result<usize> {
            self.inner.commit()
        }
    }

    impl Storage for BrokenStore {
        fn sources(&self) -> &dyn Repository<DataSource> {
            self.inner.sources()
        }
        fn records(&self) -> &dyn Repository<IngestedRecord> {
            self.inner.records()
        }
        fn health(&self) -> &dyn Repository<HealthRecord> {
            &self.health
        }
    }

    #[test]
    fn empty_history_yields_default_components() {
        let tracker = HealthTracker::new(Arc::new(MemoryStore::new()), false, Some(1));
        let snapshot = tracker.current_snapshot();

        let names: Vec<&str> = snapshot.iter().map(|r| r.component.as_str()).collect();
        assert_eq!(names, COMPONENTS.to_vec());
        assert!(snapshot.iter().all(|r| r.status == HealthStatus::Healthy));
        assert!(snapshot.iter().all(|r| r.metrics == Some(HealthMetrics::default())));
    }

    #[test]
    fn latest_record_wins_per_component() {
        let t0 = Utc::now();
        let history = vec![
            HealthRecord::new("API", HealthStatus::Healthy, t0),
            HealthRecord::new("API", HealthStatus::Unhealthy, t0 + Duration::seconds(10)),
            HealthRecord::new("API", HealthStatus::Degraded, t0 + Duration::seconds(5)),
            HealthRecord::new("Database", HealthStatus::Degraded, t0),
        ];
        let snapshot = latest_per_component(history);

        assert_eq!(snapshot.len(), 2);
        let api = snapshot.iter().find(|r| r.component == "API").unwrap();
        assert_eq!(api.status, HealthStatus::Unhealthy);
        assert_eq!(api.timestamp, t0 + Duration::seconds(10));
    }

    #[test]
    fn blank_components_group_as_system() {
        let snapshot = latest_per_component(vec![HealthRecord::new(" ", HealthStatus::Degraded, Utc::now())]);
        assert_eq!(snapshot[0].component, "System");
    }

    #[test]
    fn nominal_check_is_persisted() {
        let store = Arc::new(MemoryStore::new());
        let tracker = HealthTracker::new(store.clone(), false, None);
        let record = tracker.check_health().unwrap();

        assert_eq!(record.name, "System");
        assert_eq!(record.component, "Infrastructure");
        assert_eq!(record.status, HealthStatus::Healthy);
        assert_eq!(record.message.as_deref(), Some("All systems nominal"));
        assert_eq!(store.health().get_all().unwrap(), vec![record.clone()]);

        let snapshot = tracker.current_snapshot();
        assert_eq!(snapshot, vec![record]);
    }

    #[test]
    fn synthetic_checks_stay_in_range() {
        let tracker = HealthTracker::new(Arc::new(MemoryStore::new()), true, Some(9));
        for _ in 0..200 {
            let record = tracker.check_health().unwrap();
            assert!(COMPONENTS.contains(&record.component.as_str()));
            let metrics = record.metrics.unwrap();
            assert!((10..85).contains(&metrics.cpu_usage));
            assert!((15..80).contains(&metrics.memory_usage));
            assert!((20..400).contains(&metrics.response_time_ms));
        }
        assert!(tracker.current_snapshot().len() <= COMPONENTS.len());
    }

    #[test]
    fn synthetic_status_mix_is_mostly_healthy() {
        let mut rng = StdRng::seed_from_u64(21);
        let now = Utc::now();
        let healthy = (0..2_000)
            .filter(|_| synthetic_record(&mut rng, now).status == HealthStatus::Healthy)
            .count();
        assert!((1_450..1_750).contains(&healthy), "{healthy}");
    }

    #[test]
    fn unreadable_history_degrades_to_empty_snapshot() {
        let store = Arc::new(BrokenStore {
            inner: MemoryStore::new(),
            health: BrokenHealth,
        });
        let tracker = HealthTracker::new(store, false, None);
        assert!(tracker.current_snapshot().is_empty());
        assert!(tracker.check_health().is_err());
    }

    #[test]
    fn rate_tracker_accumulates() {
        let rates = RateTracker::new();
        let now = Utc::now();
        rates.record_tick(now, 4, 4, 0).unwrap();
        let summary = rates.record_tick(now, 3, 2, 1).unwrap();

        assert_eq!(summary.rate, 3);
        assert_eq!(summary.total_records, 7);
        assert_eq!(rates.total(), 7);
        assert_eq!(rates.latest(), Some(summary));
    }
}

//! Demo data seeding.
//!
//! Runs once at startup in demo mode. Each step is skipped when the store already
//! holds data of that kind, so restarting against a populated store adds nothing.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::info;
use pulse_common::Result;
use pulse_common::model::{DataSource, IngestedRecord, SourceKind};
use pulse_common::symbols::Symbol;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum::IntoEnumIterator;

use crate::model::price_walk::{DRIFT, MEAN_REVERSION, PriceWalk, step};
use crate::storage::Storage;

/// Length of the seeded history, in one-minute steps.
pub const HISTORY_MINUTES: i64 = 120;

/// The demo source set: name, kind, url, poll interval.
const DEMO_SOURCES: [(&str, SourceKind, &str, u64); 6] = [
    ("Tech News", SourceKind::Feed, "https://example.com/rss/tech", 60),
    ("Market Headlines", SourceKind::Feed, "https://example.com/rss/markets", 90),
    ("Equities Feed", SourceKind::ExternalApi, "https://api.example.com/equities", 15),
    ("FX Rates", SourceKind::ExternalApi, "https://api.example.com/fx", 20),
    ("Crypto Prices", SourceKind::ExternalApi, "https://api.example.com/crypto", 10),
    ("Commodities", SourceKind::ExternalApi, "https://api.example.com/commodities", 30),
];

pub fn demo_sources() -> Vec<DataSource> {
    DEMO_SOURCES
        .iter()
        .map(|(name, kind, url, poll)| {
            let mut source = DataSource::new(name, *kind, url).with_poll_interval(*poll);
            source.config = Some(serde_json::json!({}));
            source
        })
        .collect()
}

pub struct DemoSeeder {
    rng: StdRng,
}

impl DemoSeeder {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Seed the demo sources when the store has none. Returns how many were added.
    pub fn seed_sources(&self, store: &dyn Storage) -> Result<usize> {
        if !store.sources().get_all()?.is_empty() {
            return Ok(0);
        }
        let sources = demo_sources();
        let count = sources.len();
        for source in sources {
            store.sources().add(source)?;
        }
        store.commit()?;
        info!("Seeded {} demo data sources", count);
        Ok(count)
    }

    /// Seed minute-by-minute history ending at `end` for every symbol whose home
    /// source exists. Skipped when any record exists. Returns how many were added.
    pub fn seed_history(&mut self, store: &dyn Storage, end: DateTime<Utc>) -> Result<usize> {
        if !store.records().get_all()?.is_empty() {
            return Ok(0);
        }
        let sources = store.sources().get_all()?;
        if sources.is_empty() {
            return Ok(0);
        }

        let start = end - Duration::minutes(HISTORY_MINUTES);
        let mut added = 0;
        for symbol in Symbol::iter() {
            let Some(home) = sources
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(symbol.home_source()))
            else {
                continue;
            };

            let mut price = symbol.seed_price();
            let mut at = start;
            while at <= end {
                let drift = self.rng.random_range(-DRIFT..DRIFT);
                let mean_reversion = self.rng.random_range(-MEAN_REVERSION..MEAN_REVERSION);
                price = step(price, drift, mean_reversion);
                store
                    .records()
                    .add(IngestedRecord::new(home.id, &symbol.to_string(), price, at, None))?;
                added += 1;
                at += Duration::minutes(1);
            }
        }
        if added > 0 {
            store.commit()?;
            info!("Seeded {} historical records", added);
        }
        Ok(added)
    }
}

/// Continue the walk from the most recent stored value of each symbol.
/// Returns how many symbols were primed.
pub fn prime_walk(walk: &PriceWalk, store: &dyn Storage) -> Result<usize> {
    let mut latest: HashMap<String, IngestedRecord> = HashMap::new();
    for record in store.records().get_all()? {
        let key = record.symbol.to_ascii_uppercase();
        match latest.get(&key) {
            Some(current) if current.timestamp >= record.timestamp => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut primed = 0;
    for (symbol, record) in latest {
        if walk.prime(&symbol, record.value)? {
            primed += 1;
        }
    }
    if primed > 0 {
        info!("Primed price walk for {} symbol(s)", primed);
    }
    Ok(primed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UnitOfWork};

    #[test]
    fn seeds_sources_once() {
        let store = MemoryStore::new();
        let seeder = DemoSeeder::new(Some(1));
        assert_eq!(seeder.seed_sources(&store).unwrap(), 6);
        assert_eq!(seeder.seed_sources(&store).unwrap(), 0);

        let sources = store.sources().get_all().unwrap();
        let crypto = sources.iter().find(|s| s.name == "Crypto Prices").unwrap();
        assert_eq!(crypto.kind, SourceKind::ExternalApi);
        assert_eq!(crypto.poll_interval_seconds, 10);
        assert_eq!(sources.iter().filter(|s| s.kind == SourceKind::Feed).count(), 2);
    }

    #[test]
    fn history_covers_two_hours_per_mapped_symbol() {
        let store = MemoryStore::new();
        let mut seeder = DemoSeeder::new(Some(7));
        seeder.seed_sources(&store).unwrap();

        let end = Utc::now();
        let added = seeder.seed_history(&store, end).unwrap();
        assert_eq!(added, 8 * 121);
        assert_eq!(seeder.seed_history(&store, end).unwrap(), 0);

        let records = store.records().get_all().unwrap();
        assert!(records.iter().all(|r| r.value > 0.0));
        assert!(records.iter().all(|r| r.timestamp >= end - Duration::minutes(HISTORY_MINUTES) && r.timestamp <= end));

        let fx = store
            .sources()
            .get_all()
            .unwrap()
            .into_iter()
            .find(|s| s.name == "FX Rates")
            .unwrap();
        let eurusd: Vec<_> = records.iter().filter(|r| r.symbol == "EURUSD").collect();
        assert_eq!(eurusd.len(), 121);
        assert!(eurusd.iter().all(|r| r.data_source_id == fx.id));
    }

    #[test]
    fn history_needs_home_sources() {
        let store = MemoryStore::new();
        store
            .sources()
            .add(DataSource::new("Tech News", SourceKind::Feed, "https://example.com/rss/tech"))
            .unwrap();
        store.commit().unwrap();
        assert_eq!(DemoSeeder::new(Some(3)).seed_history(&store, Utc::now()).unwrap(), 0);
    }

    #[test]
    fn walk_resumes_from_latest_history() {
        let store = MemoryStore::new();
        let source = DataSource::new("Crypto Prices", SourceKind::ExternalApi, "https://crypto");
        let t0 = Utc::now();
        for (value, minutes) in [(61_000.0, 0), (62_500.5, 2), (61_900.0, 1)] {
            store
                .records()
                .add(IngestedRecord::new(source.id, "btcusd", value, t0 + Duration::minutes(minutes), None))
                .unwrap();
        }
        store.commit().unwrap();

        let walk = PriceWalk::with_seed(5);
        assert_eq!(prime_walk(&walk, &store).unwrap(), 1);
        assert_eq!(walk.last("BTCUSD").unwrap(), Some(62_500.5));

        let next = walk.next("BTCUSD").unwrap();
        assert!((next - 62_500.5).abs() <= 62_500.5 * 0.011 + 1e-9);
    }
}

//! In-memory implementation of the storage port.
//!
//! Each repository keeps committed entities in a `RwLock<Vec<T>>` and staged changes
//! in a `Mutex<Vec<Change<T>>>`. `MemoryStore::commit` applies the staged changes of
//! all repositories. Reads only see committed state. Staging is shared by every
//! caller of the store, so a commit also applies changes staged by a concurrent tick.

use std::sync::{Mutex, RwLock};

use log::debug;
use pulse_common::Result;
use pulse_common::model::{DataSource, HealthRecord, IngestedRecord};
use uuid::Uuid;

use super::{Entity, Repository, Storage, UnitOfWork};

enum Change<T> {
    Add(T),
    Update(T),
    Remove(Uuid),
}

/// One entity collection with staged writes.
pub struct MemoryRepository<T> {
    committed: RwLock<Vec<T>>,
    pending: Mutex<Vec<Change<T>>>,
}

impl<T: Entity> Default for MemoryRepository<T> {
    fn default() -> Self {
        MemoryRepository {
            committed: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Entity> MemoryRepository<T> {
    fn stage(&self, change: Change<T>) -> Result<()> {
        self.pending.lock()?.push(change);
        Ok(())
    }

    fn apply_pending(&self) -> Result<usize> {
        let changes: Vec<Change<T>> = std::mem::take(&mut *self.pending.lock()?);
        if changes.is_empty() {
            return Ok(0);
        }

        let mut committed = self.committed.write()?;
        let mut applied = 0;
        for change in changes {
            match change {
                Change::Add(entity) => {
                    committed.push(entity);
                    applied += 1;
                }
                Change::Update(entity) => {
                    if let Some(slot) = committed.iter_mut().find(|e| e.id() == entity.id()) {
                        *slot = entity;
                        applied += 1;
                    }
                }
                Change::Remove(id) => {
                    let before = committed.len();
                    committed.retain(|e| e.id() != id);
                    applied += before - committed.len();
                }
            }
        }
        Ok(applied)
    }
}

impl<T: Entity> Repository<T> for MemoryRepository<T> {
    fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.committed.read()?.clone())
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<T>> {
        Ok(self.committed.read()?.iter().find(|e| e.id() == id).cloned())
    }

    fn add(&self, entity: T) -> Result<()> {
        self.stage(Change::Add(entity))
    }

    fn update(&self, entity: T) -> Result<()> {
        self.stage(Change::Update(entity))
    }

    fn remove(&self, entity: &T) -> Result<()> {
        self.stage(Change::Remove(entity.id()))
    }
}

/// Process-local store holding sources, records and health history.
#[derive(Default)]
pub struct MemoryStore {
    sources: MemoryRepository<DataSource>,
    records: MemoryRepository<IngestedRecord>,
    health: MemoryRepository<HealthRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnitOfWork for MemoryStore {
    fn commit(&self) -> Result<usize> {
        let applied = self.sources.apply_pending()?
            + self.records.apply_pending()?
            + self.health.apply_pending()?;
        debug!("Committed {} change(s)", applied);
        Ok(applied)
    }
}

impl Storage for MemoryStore {
    fn sources(&self) -> &dyn Repository<DataSource> {
        &self.sources
    }

    fn records(&self) -> &dyn Repository<IngestedRecord> {
        &self.records
    }

    fn health(&self) -> &dyn Repository<HealthRecord> {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::model::SourceKind;

    fn source(name: &str) -> DataSource {
        DataSource::new(name, SourceKind::ExternalApi, "https://api.example.com")
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        store.sources().add(source("FX Rates")).unwrap();
        assert!(store.sources().get_all().unwrap().is_empty());

        assert_eq!(store.commit().unwrap(), 1);
        assert_eq!(store.sources().get_all().unwrap().len(), 1);
    }

    #[test]
    fn commit_counts_changes_across_repositories() {
        let store = MemoryStore::new();
        let fx = source("FX Rates");
        store.sources().add(fx.clone()).unwrap();
        store
            .records()
            .add(IngestedRecord::new(fx.id, "EURUSD", 1.1, chrono::Utc::now(), None))
            .unwrap();
        assert_eq!(store.commit().unwrap(), 2);
        assert_eq!(store.commit().unwrap(), 0);
    }

    #[test]
    fn update_and_remove_by_identity() {
        let store = MemoryStore::new();
        let fx = source("FX Rates");
        store.sources().add(fx.clone()).unwrap();
        store.commit().unwrap();

        store.sources().update(fx.clone().inactive()).unwrap();
        assert_eq!(store.commit().unwrap(), 1);
        let stored = store.sources().get_by_id(fx.id).unwrap().unwrap();
        assert!(!stored.is_active);

        store.sources().remove(&fx).unwrap();
        assert_eq!(store.commit().unwrap(), 1);
        assert!(store.sources().get_by_id(fx.id).unwrap().is_none());
    }

    #[test]
    fn update_of_unknown_entity_applies_nothing() {
        let store = MemoryStore::new();
        store.sources().update(source("ghost")).unwrap();
        assert_eq!(store.commit().unwrap(), 0);
    }
}

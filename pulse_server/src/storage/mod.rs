//! Storage port consumed by the ingestion core.
//!
//! The core never talks to a database directly. It reads and writes through
//! `Repository<T>` per entity type and makes staged changes visible with
//! `UnitOfWork::commit`. `Storage` bundles the three repositories the pipeline
//! needs. Every call may fail; callers decide whether a failure propagates or
//! degrades to an empty answer.

pub mod memory;

use pulse_common::Result;
use pulse_common::model::{DataSource, HealthRecord, IngestedRecord};
use uuid::Uuid;

pub use memory::MemoryStore;

/// Anything stored through a `Repository`.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

impl Entity for DataSource {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for IngestedRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for HealthRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// CRUD access to one entity type. Writes are staged until the owning
/// `UnitOfWork` commits.
pub trait Repository<T: Entity>: Send + Sync {
    fn get_all(&self) -> Result<Vec<T>>;
    fn get_by_id(&self, id: Uuid) -> Result<Option<T>>;
    fn add(&self, entity: T) -> Result<()>;
    fn update(&self, entity: T) -> Result<()>;
    fn remove(&self, entity: &T) -> Result<()>;
}

/// Applies staged changes and returns how many were applied.
pub trait UnitOfWork: Send + Sync {
    fn commit(&self) -> Result<usize>;
}

/// The repositories used by the ingestion pipeline.
pub trait Storage: UnitOfWork {
    fn sources(&self) -> &dyn Repository<DataSource>;
    fn records(&self) -> &dyn Repository<IngestedRecord>;
    fn health(&self) -> &dyn Repository<HealthRecord>;
}

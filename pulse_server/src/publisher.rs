//! Fan-out of broadcast events to observers.
//!
//! Each connected observer owns a bounded `crossbeam_channel` queue; the publisher
//! keeps the sending halves and pushes every event with `try_send`, so one slow or
//! gone observer never blocks the others:
//! - a full queue drops the event for that observer and logs a warning;
//! - a disconnected queue removes the observer and its group memberships.
//!
//! Groups scope future per-source messages: observers `join`/`leave` the group of a
//! data source, and `publish_to_group` delivers to members only.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use pulse_common::model::{HealthRecord, TickSummary};
use pulse_common::{Event, HealthUpdate, PulseError, Result};
use uuid::Uuid;

/// Opaque identity of a connected observer.
pub type ObserverId = u64;

#[derive(Default)]
struct Registry {
    next_id: ObserverId,
    observers: HashMap<ObserverId, Sender<Event>>,
    groups: HashMap<Uuid, HashSet<ObserverId>>,
}

impl Registry {
    fn drop_observer(&mut self, id: ObserverId) -> bool {
        let known = self.observers.remove(&id).is_some();
        self.groups.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        known
    }
}

/// Broadcast hub shared by the coordinator, health trigger and control surface.
pub struct Publisher {
    registry: Mutex<Registry>,
    buffer: usize,
}

impl Publisher {
    /// `buffer` is the per-observer queue capacity.
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new observer and hand back the receiving end of its queue.
    pub fn connect(&self) -> Result<(ObserverId, Receiver<Event>)> {
        let (tx, rx) = bounded(self.buffer);
        let mut registry = self.registry.lock()?;
        registry.next_id += 1;
        let id = registry.next_id;
        registry.observers.insert(id, tx);
        info!("Observer {} connected. Total observers: {}", id, registry.observers.len());
        Ok((id, rx))
    }

    /// Remove an observer; its queue closes once the sender is dropped.
    pub fn disconnect(&self, id: ObserverId) -> Result<bool> {
        let known = self.registry.lock()?.drop_observer(id);
        if known {
            info!("Observer {} disconnected", id);
        }
        Ok(known)
    }

    /// Add a connected observer to the group of `source_id`.
    pub fn join(&self, id: ObserverId, source_id: Uuid) -> Result<()> {
        let mut registry = self.registry.lock()?;
        if !registry.observers.contains_key(&id) {
            return Err(PulseError::UnknownObserver(id.to_string()));
        }
        registry.groups.entry(source_id).or_default().insert(id);
        debug!("Observer {} joined group {}", id, source_id);
        Ok(())
    }

    /// Remove an observer from the group of `source_id`. Leaving a group the
    /// observer is not in is a no-op.
    pub fn leave(&self, id: ObserverId, source_id: Uuid) -> Result<()> {
        let mut registry = self.registry.lock()?;
        if let Some(members) = registry.groups.get_mut(&source_id) {
            members.remove(&id);
            if members.is_empty() {
                registry.groups.remove(&source_id);
            }
        }
        debug!("Observer {} left group {}", id, source_id);
        Ok(())
    }

    pub fn group_members(&self, source_id: Uuid) -> Result<Vec<ObserverId>> {
        let registry = self.registry.lock()?;
        let mut members: Vec<ObserverId> = registry
            .groups
            .get(&source_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        Ok(members)
    }

    /// False once the observer was disconnected or pruned after its queue closed.
    pub fn is_connected(&self, id: ObserverId) -> bool {
        self.registry
            .lock()
            .map(|r| r.observers.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn observer_count(&self) -> usize {
        self.registry.lock().map(|r| r.observers.len()).unwrap_or(0)
    }

    /// Returns how many observers accepted the event.
    pub fn publish_ingestion_update(&self, summary: &TickSummary) -> Result<usize> {
        self.broadcast(Event::IngestionUpdate(summary.clone()))
    }

    /// Returns how many observers accepted the event.
    pub fn publish_health_update(&self, record: &HealthRecord) -> Result<usize> {
        self.broadcast(Event::HealthUpdate(HealthUpdate::from(record)))
    }

    /// Deliver to every connected observer.
    pub fn broadcast(&self, event: Event) -> Result<usize> {
        let mut registry = self.registry.lock()?;
        let targets: Vec<ObserverId> = registry.observers.keys().copied().collect();
        Ok(deliver(&mut registry, &targets, &event))
    }

    /// Deliver to members of one source group only.
    pub fn publish_to_group(&self, source_id: Uuid, event: Event) -> Result<usize> {
        let mut registry = self.registry.lock()?;
        let targets: Vec<ObserverId> = registry
            .groups
            .get(&source_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        Ok(deliver(&mut registry, &targets, &event))
    }
}

fn deliver(registry: &mut Registry, targets: &[ObserverId], event: &Event) -> usize {
    let mut delivered = 0;
    let mut gone = Vec::new();

    for id in targets {
        let Some(tx) = registry.observers.get(id) else {
            continue;
        };
        match tx.try_send(event.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => warn!("Observer {} queue is full, event dropped", id),
            Err(TrySendError::Disconnected(_)) => gone.push(*id),
        }
    }
    for id in gone {
        registry.drop_observer(id);
        info!("Observer {} went away, removed", id);
    }
    delivered
}

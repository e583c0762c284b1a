//! Handling of control commands.
//!
//! `ControlSurface::handle` turns one `Command` into exactly one `Reply`. Every failure
//! becomes a `Reply::Error`, so the connection that sent the command stays usable.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{error, info, warn};
use pulse_common::model::DataSource;
use pulse_common::{Command, HealthUpdate, PulseError, Reply, Result};
use uuid::Uuid;

use crate::health::HealthTracker;
use crate::observer::ObserverRegistry;
use crate::publisher::Publisher;
use crate::storage::Storage;

pub struct ControlSurface {
    store: Arc<dyn Storage>,
    health: Arc<HealthTracker>,
    publisher: Arc<Publisher>,
    observers: Arc<ObserverRegistry>,
}

impl ControlSurface {
    pub fn new(
        store: Arc<dyn Storage>,
        health: Arc<HealthTracker>,
        publisher: Arc<Publisher>,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            store,
            health,
            publisher,
            observers,
        }
    }

    /// `peer` is the IP of the control connection; observer ports are resolved against it.
    pub fn handle(&self, command: Command, peer: IpAddr) -> Reply {
        match self.try_handle(command, peer) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Command from {} rejected: {}", peer, e);
                Reply::error(e)
            }
        }
    }

    fn try_handle(&self, command: Command, peer: IpAddr) -> Result<Reply> {
        match command {
            Command::Subscribe { port: 0 } => Err(PulseError::Format(
                "subscribe needs the observer's UDP port, got 0".to_string(),
            )),
            Command::Subscribe { port } => {
                let observer_id = self.observers.attach(SocketAddr::new(peer, port))?;
                Ok(Reply::Subscribed { observer_id })
            }
            Command::Unsubscribe { port } => {
                self.observers.detach(&SocketAddr::new(peer, port))?;
                Ok(Reply::Ack)
            }
            Command::Join { port, source_id } => {
                let observer = self.subscribed(peer, port)?;
                self.require_source(source_id)?;
                self.publisher.join(observer, source_id)?;
                info!("Observer {} joined source {}", observer, source_id);
                Ok(Reply::Ack)
            }
            Command::Leave { port, source_id } => {
                let observer = self.subscribed(peer, port)?;
                self.publisher.leave(observer, source_id)?;
                Ok(Reply::Ack)
            }
            Command::ListSources => Ok(Reply::Sources {
                sources: self.active_sources(),
            }),
            Command::CheckHealth => Ok(Reply::Health {
                components: self.check_health(),
            }),
        }
    }

    fn subscribed(&self, peer: IpAddr, port: u16) -> Result<u64> {
        let addr = SocketAddr::new(peer, port);
        self.observers
            .observer_id(&addr)
            .ok_or_else(|| PulseError::UnknownObserver(addr.to_string()))
    }

    fn require_source(&self, source_id: Uuid) -> Result<()> {
        match self.store.sources().get_by_id(source_id)? {
            Some(_) => Ok(()),
            None => Err(PulseError::UnknownSource(source_id.to_string())),
        }
    }

    /// Active sources; a read failure yields an empty list.
    pub fn active_sources(&self) -> Vec<DataSource> {
        match self.store.sources().get_all() {
            Ok(sources) => sources.into_iter().filter(|s| s.is_active).collect(),
            Err(e) => {
                error!("Failed to read data sources: {}", e);
                Vec::new()
            }
        }
    }

    /// Run a check now, then report the current snapshot.
    pub fn check_health(&self) -> Vec<HealthUpdate> {
        if let Err(e) = self.health.check_health() {
            error!("On-demand health check failed: {}", e);
        }
        self.health
            .current_snapshot()
            .iter()
            .map(HealthUpdate::from)
            .collect()
    }
}

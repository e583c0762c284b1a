//! UDP delivery to subscribed observers.
//!
//! An observer is addressed by the IP of its control connection plus the UDP port it
//! subscribed with. `attach` connects it to the `Publisher` and spawns a stream thread
//! draining its queue onto the data socket; `detach` stops the thread and removes the
//! observer from the publisher (queue closed, groups left).
//!
//! Observers stay attached only while they keep pinging: `heard_from` refreshes the
//! keep-alive of an attached address and `detach_expired` drops the silent ones.
//!
//! A stream that ends on its own (the send failed) disconnects its observer from the
//! publisher; the registry forgets such entries the next time the address is looked up.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::{debug, error, info};
use pulse_common::{Event, Result};

use crate::model::keepalive::KeepAliveMonitor;
use crate::publisher::{ObserverId, Publisher};

struct ObserverHandle {
    id: ObserverId,
    stop_tx: Sender<()>,
}

/// Attached observers keyed by their UDP address.
pub struct ObserverRegistry {
    publisher: Arc<Publisher>,
    socket: Arc<UdpSocket>,
    keepalive: Mutex<KeepAliveMonitor>,
    streams: Mutex<HashMap<SocketAddr, ObserverHandle>>,
}

impl ObserverRegistry {
    pub fn new(publisher: Arc<Publisher>, socket: Arc<UdpSocket>, keepalive: KeepAliveMonitor) -> Self {
        Self {
            publisher,
            socket,
            keepalive: Mutex::new(keepalive),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Attach the observer at `addr`. Attaching an address twice returns the existing id.
    pub fn attach(&self, addr: SocketAddr) -> Result<ObserverId> {
        let mut streams = self.streams.lock()?;
        let live = self.live_id(&mut streams, &addr)?;
        self.keepalive.lock()?.touch(addr);
        if let Some(id) = live {
            debug!("Observer {} at {} is already attached", id, addr);
            return Ok(id);
        }

        let (id, data_rx) = self.publisher.connect()?;
        let (stop_tx, stop_rx) = unbounded::<()>();
        let socket = Arc::clone(&self.socket);
        let publisher = Arc::clone(&self.publisher);
        let spawned = thread::Builder::new()
            .name(format!("observer-{}", id))
            .spawn(move || {
                if let Err(e) = handle_observer_stream(socket, addr, data_rx, stop_rx) {
                    error!("Observer stream {} failed: {}", addr, e);
                }
                if let Err(e) = publisher.disconnect(id) {
                    error!("Failed to disconnect observer {}: {}", id, e);
                }
            });
        if let Err(e) = spawned {
            self.publisher.disconnect(id)?;
            return Err(e.into());
        }

        streams.insert(addr, ObserverHandle { id, stop_tx });
        info!("Stream created for observer {} on {}", id, addr);
        Ok(id)
    }

    /// Detach the observer at `addr`; returns false when nothing was attached there.
    pub fn detach(&self, addr: &SocketAddr) -> Result<bool> {
        let handle = self.streams.lock()?.remove(addr);
        self.keepalive.lock()?.forget(addr);
        let Some(handle) = handle else {
            return Ok(false);
        };
        let _ = handle.stop_tx.send(());
        self.publisher.disconnect(handle.id)?;
        info!("Stream for observer {} on {} closed", handle.id, addr);
        Ok(true)
    }

    pub fn observer_id(&self, addr: &SocketAddr) -> Option<ObserverId> {
        let mut streams = self.streams.lock().ok()?;
        self.live_id(&mut streams, addr).ok()?
    }

    /// Refresh the keep-alive of an attached observer. Pings from unknown addresses are ignored.
    pub fn heard_from(&self, addr: SocketAddr) -> Result<bool> {
        let mut streams = self.streams.lock()?;
        if self.live_id(&mut streams, &addr)?.is_none() {
            debug!("Ping from unattached address {}", addr);
            return Ok(false);
        }
        self.keepalive.lock()?.touch(addr);
        Ok(true)
    }

    /// Id of the observer at `addr` while its stream is alive. An entry whose
    /// observer the publisher no longer knows is dropped here.
    fn live_id(
        &self,
        streams: &mut HashMap<SocketAddr, ObserverHandle>,
        addr: &SocketAddr,
    ) -> Result<Option<ObserverId>> {
        let Some(id) = streams.get(addr).map(|h| h.id) else {
            return Ok(None);
        };
        if self.publisher.is_connected(id) {
            return Ok(Some(id));
        }
        streams.remove(addr);
        self.keepalive.lock()?.forget(addr);
        info!("Stream for observer {} on {} ended, entry removed", id, addr);
        Ok(None)
    }

    /// Detach every observer whose keep-alive ran out. Returns how many were dropped.
    pub fn detach_expired(&self) -> Result<usize> {
        let expired = self.keepalive.lock()?.expired();
        let mut dropped = 0;
        for addr in expired {
            if self.detach(&addr)? {
                info!("Observer on {} timed out", addr);
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    /// Detach everything, used at shutdown.
    pub fn detach_all(&self) -> Result<()> {
        let addrs: Vec<SocketAddr> = self.streams.lock()?.keys().copied().collect();
        for addr in addrs {
            self.detach(&addr)?;
        }
        Ok(())
    }
}

/// Stream task for a single observer.
///
/// Forwards every event from `data_rx` to `target_addr` as JSON. Ends on a stop signal,
/// when the publisher drops the queue, or when sending fails.
pub fn handle_observer_stream(
    socket: Arc<UdpSocket>,
    target_addr: SocketAddr,
    data_rx: Receiver<Event>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(data_rx) -> msg => match msg {
                Ok(event) => {
                    let data = event.to_json_bytes()?;
                    if let Err(e) = socket.send_to(&data, target_addr) {
                        error!("Failed to send UDP packet to {}: {}", target_addr, e);
                        break;
                    }
                }
                Err(_) => {
                    debug!("Queue for {} closed", target_addr);
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_common::model::TickSummary;
    use std::time::{Duration, Instant};

    fn local_socket() -> Arc<UdpSocket> {
        Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap())
    }

    fn registry(timeout: Duration) -> (Arc<Publisher>, ObserverRegistry) {
        let publisher = Arc::new(Publisher::new(16));
        let registry = ObserverRegistry::new(
            Arc::clone(&publisher),
            local_socket(),
            KeepAliveMonitor::new(timeout),
        );
        (publisher, registry)
    }

    #[test]
    fn attached_observer_receives_events_over_udp() {
        let (publisher, registry) = registry(Duration::from_secs(5));
        let observer = UdpSocket::bind("127.0.0.1:0").unwrap();
        observer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let addr = observer.local_addr().unwrap();
        let id = registry.attach(addr).unwrap();
        assert_eq!(registry.attach(addr).unwrap(), id);
        assert_eq!(registry.observer_id(&addr), Some(id));

        let summary = TickSummary::empty(Utc::now(), 9);
        assert_eq!(publisher.publish_ingestion_update(&summary).unwrap(), 1);

        let mut buf = [0u8; 2048];
        let size = observer.recv(&mut buf).unwrap();
        let event = Event::from_json_bytes(&buf[..size]).unwrap();
        assert_eq!(event, Event::IngestionUpdate(summary));
    }

    #[test]
    fn detach_disconnects_from_publisher() {
        let (publisher, registry) = registry(Duration::from_secs(5));
        let addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        registry.attach(addr).unwrap();
        assert_eq!(publisher.observer_count(), 1);

        assert!(registry.detach(&addr).unwrap());
        assert!(!registry.detach(&addr).unwrap());
        assert_eq!(publisher.observer_count(), 0);
        assert_eq!(registry.observer_id(&addr), None);
    }

    #[test]
    fn silent_observers_expire() {
        let (publisher, registry) = registry(Duration::from_millis(30));
        let quiet: SocketAddr = "127.0.0.1:40002".parse().unwrap();
        let chatty: SocketAddr = "127.0.0.1:40003".parse().unwrap();
        registry.attach(quiet).unwrap();
        registry.attach(chatty).unwrap();

        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(15));
            assert!(registry.heard_from(chatty).unwrap());
        }
        assert_eq!(registry.detach_expired().unwrap(), 1);
        assert_eq!(registry.observer_id(&quiet), None);
        assert!(registry.observer_id(&chatty).is_some());
        assert_eq!(publisher.observer_count(), 1);
    }

    #[test]
    fn stream_that_cannot_send_is_forgotten() {
        let (publisher, registry) = registry(Duration::from_secs(5));
        let unreachable: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = registry.attach(unreachable).unwrap();
        publisher
            .publish_ingestion_update(&TickSummary::empty(Utc::now(), 1))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while registry.observer_id(&unreachable).is_some() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(registry.observer_id(&unreachable), None);
        assert_eq!(publisher.observer_count(), 0);
        assert!(!registry.heard_from(unreachable).unwrap());

        let second = registry.attach(unreachable).unwrap();
        assert_ne!(second, first);
        assert!(publisher.join(second, uuid::Uuid::new_v4()).is_ok());
    }

    #[test]
    fn pings_from_strangers_are_ignored() {
        let (_, registry) = registry(Duration::from_secs(5));
        let stranger: SocketAddr = "127.0.0.1:40004".parse().unwrap();
        assert!(!registry.heard_from(stranger).unwrap());
        assert_eq!(registry.detach_expired().unwrap(), 0);
    }
}

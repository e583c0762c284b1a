use std::net::UdpSocket;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, select, tick};
use log::{debug, error, warn};
use pulse_common::Result;
use pulse_common::net::PING;

use crate::observer::ObserverRegistry;

/// How often silent observers are looked for.
pub const EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// UDP listener that receives PING datagrams from observers on the data socket
/// and refreshes their keep-alive.
pub struct UdpPingListener;

impl UdpPingListener {
    /// Spawn a background thread reading datagrams from `socket`. The socket should
    /// carry a read timeout so the thread notices `stop_rx` closing.
    pub fn start(
        socket: Arc<UdpSocket>,
        observers: Arc<ObserverRegistry>,
        stop_rx: Receiver<()>,
    ) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("ping-listener".to_string())
            .spawn(move || {
                let mut buf = [0u8; 128];
                loop {
                    if stop_requested(&stop_rx) {
                        break;
                    }
                    match socket.recv_from(&mut buf) {
                        Ok((size, addr)) if buf[..size].starts_with(PING) => {
                            debug!("Received ping from {}", addr);
                            if let Err(e) = observers.heard_from(addr) {
                                error!("Failed to record ping from {}: {}", addr, e);
                            }
                        }
                        Ok((_, addr)) => warn!("Unexpected datagram from {}", addr),
                        Err(e) if is_timeout(&e) => {}
                        Err(e) => debug!("UDP receive error: {}", e),
                    }
                }
                debug!("Ping listener stopped");
            })?;
        Ok(handle)
    }
}

/// Spawn the thread detaching observers whose keep-alive ran out.
pub fn start_expiry_monitor(
    observers: Arc<ObserverRegistry>,
    interval: Duration,
    stop_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("keepalive-monitor".to_string())
        .spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(e) = observers.detach_expired() {
                            error!("Keep-alive check failed: {}", e);
                        }
                    }
                }
            }
            debug!("Keep-alive monitor stopped");
        })?;
    Ok(handle)
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    matches!(
        stop_rx.try_recv(),
        Ok(()) | Err(crossbeam_channel::TryRecvError::Disconnected)
    )
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::keepalive::KeepAliveMonitor;
    use crate::publisher::Publisher;
    use crossbeam_channel::unbounded;

    #[test]
    fn pings_keep_an_observer_attached() {
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        server.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let server_addr = server.local_addr().unwrap();
        let publisher = Arc::new(Publisher::new(4));
        let observers = Arc::new(ObserverRegistry::new(
            Arc::clone(&publisher),
            Arc::clone(&server),
            KeepAliveMonitor::new(Duration::from_millis(150)),
        ));

        let pinging = UdpSocket::bind("127.0.0.1:0").unwrap();
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        observers.attach(pinging.local_addr().unwrap()).unwrap();
        observers.attach(silent.local_addr().unwrap()).unwrap();

        let (stop_tx, stop_rx) = unbounded::<()>();
        let listener = UdpPingListener::start(server, Arc::clone(&observers), stop_rx.clone()).unwrap();
        let monitor = start_expiry_monitor(Arc::clone(&observers), Duration::from_millis(20), stop_rx).unwrap();

        for _ in 0..15 {
            pinging.send_to(PING, server_addr).unwrap();
            thread::sleep(Duration::from_millis(30));
        }

        assert!(observers.observer_id(&pinging.local_addr().unwrap()).is_some());
        assert!(observers.observer_id(&silent.local_addr().unwrap()).is_none());
        assert_eq!(publisher.observer_count(), 1);

        drop(stop_tx);
        listener.join().unwrap();
        monitor.join().unwrap();
    }
}

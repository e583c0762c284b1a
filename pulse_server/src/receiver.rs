use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use log::{debug, error, info, warn};
use pulse_common::{Command, Reply, Result};

use crate::control::ControlSurface;

/// Longest accepted command line in bytes, newline included.
pub const MAX_COMMAND_LEN: usize = 4096;

/// TCP command receiver for observer control connections.
///
/// Every accepted connection gets its own thread reading newline-delimited JSON
/// `Command`s and answering each with one `Reply` line. A bad line or a broken
/// connection only ends that connection; the listener keeps accepting.
pub struct CommandReceiver {
    listener: TcpListener,
}

impl CommandReceiver {
    /// Bind a new TCP receiver to `bind_addr` (e.g., `0.0.0.0:7070`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is raised. The flag is checked between
    /// connections, so a final wake-up connection may be needed to return.
    pub fn accept_loop(self, surface: Arc<ControlSurface>, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!("Command TCP server is started on {}", self.listener.local_addr()?);

        for stream in self.listener.incoming() {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let surface = Arc::clone(&surface);
                    let spawned = thread::Builder::new()
                        .name("control-conn".to_string())
                        .spawn(move || {
                            if let Err(e) = serve_connection(stream, &surface) {
                                warn!("Control connection ended with error: {}", e);
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Failed to start control connection thread: {}", e);
                    }
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        info!("Command TCP server stopped");
        Ok(())
    }
}

/// Serve one control connection until the peer closes it. A line longer than
/// `MAX_COMMAND_LEN` gets an error reply and ends the connection.
pub fn serve_connection(stream: TcpStream, surface: &ControlSurface) -> Result<()> {
    let peer = stream.peer_addr()?;
    debug!("Control connection from {}", peer);
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(256);

    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(MAX_COMMAND_LEN as u64)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        if read == MAX_COMMAND_LEN && line.last() != Some(&b'\n') {
            warn!("Command from {} exceeds {} bytes, closing", peer, MAX_COMMAND_LEN);
            let reply = Reply::error(format!("command longer than {} bytes", MAX_COMMAND_LEN));
            writer.write_all(reply.to_line()?.as_bytes())?;
            writer.flush()?;
            break;
        }
        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Command>(trimmed) {
            Ok(command) => {
                info!("Received command {:?} from {}", command, peer);
                surface.handle(command, peer.ip())
            }
            Err(e) => {
                warn!("Malformed command from {}: {}", peer, e);
                Reply::error(format!("malformed command: {}", e))
            }
        };
        writer.write_all(reply.to_line()?.as_bytes())?;
        writer.flush()?;
    }
    debug!("Control connection from {} closed", peer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthTracker;
    use crate::model::keepalive::KeepAliveMonitor;
    use crate::observer::ObserverRegistry;
    use crate::publisher::Publisher;
    use crate::storage::MemoryStore;
    use std::net::UdpSocket;
    use std::time::Duration;

    fn surface() -> Arc<ControlSurface> {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(Publisher::new(8));
        let observers = Arc::new(ObserverRegistry::new(
            Arc::clone(&publisher),
            Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap()),
            KeepAliveMonitor::new(Duration::from_secs(5)),
        ));
        let health = Arc::new(HealthTracker::new(store.clone(), false, None));
        Arc::new(ControlSurface::new(store, health, publisher, observers))
    }

    fn start() -> (SocketAddr, Arc<AtomicBool>) {
        let receiver = CommandReceiver::new("127.0.0.1:0").unwrap();
        let addr = receiver.local_addr().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let surface = surface();
        thread::spawn(move || receiver.accept_loop(surface, flag));
        (addr, shutdown)
    }

    #[test]
    fn bad_lines_get_error_replies_and_the_connection_survives() {
        let (addr, shutdown) = start();

        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut replies = BufReader::new(client.try_clone().unwrap());

        client.write_all(b"{\"command\":\"explode\"}\n").unwrap();
        let mut line = String::new();
        replies.read_line(&mut line).unwrap();
        assert!(matches!(serde_json::from_str::<Reply>(&line).unwrap(), Reply::Error { .. }));

        client.write_all(Command::ListSources.to_line().unwrap().as_bytes()).unwrap();
        line.clear();
        replies.read_line(&mut line).unwrap();
        assert_eq!(
            serde_json::from_str::<Reply>(&line).unwrap(),
            Reply::Sources { sources: vec![] }
        );

        let mut second = TcpStream::connect(addr).unwrap();
        second.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        second.write_all(Command::CheckHealth.to_line().unwrap().as_bytes()).unwrap();
        line.clear();
        BufReader::new(second).read_line(&mut line).unwrap();
        assert!(matches!(serde_json::from_str::<Reply>(&line).unwrap(), Reply::Health { .. }));

        shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(addr);
    }

    #[test]
    fn oversized_command_is_refused_and_the_connection_closed() {
        let (addr, shutdown) = start();

        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        client.write_all(&vec![b'x'; MAX_COMMAND_LEN]).unwrap();

        let mut replies = BufReader::new(client);
        let mut line = String::new();
        replies.read_line(&mut line).unwrap();
        let Reply::Error { message } = serde_json::from_str::<Reply>(&line).unwrap() else {
            panic!("expected error reply, got {line}");
        };
        assert!(message.contains("longer"), "{message}");

        line.clear();
        assert_eq!(replies.read_line(&mut line).unwrap(), 0);

        shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(addr);
    }
}

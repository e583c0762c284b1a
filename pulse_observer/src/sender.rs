//! Talking to the pulse server.
//!
//! `CommandSender` owns the TCP control connection: every `request` writes one
//! command line and reads back exactly one reply line. `start_ping_thread` keeps the
//! UDP subscription alive with periodic `PING`s.
use log::{debug, error, info};
use pulse_common::net::PING;
use pulse_common::{Command, PulseError, Reply, Result};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// PING interval in milliseconds used by the background thread.
const INTERVAL_MS: u64 = 2000;

/// Request/reply client over the control connection.
pub struct CommandSender {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl CommandSender {
    pub fn connect(server_addr: &str) -> Result<Self> {
        let writer = TcpStream::connect(server_addr)
            .map_err(|e| PulseError::Format(format!("Failed to connect to server {}: {}", server_addr, e)))?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { writer, reader })
    }

    /// Send `command` and wait for its reply. A `Reply::Error` is returned as an error.
    pub fn request(&mut self, command: &Command) -> Result<Reply> {
        debug!("Sending command: {:?}", command);
        self.writer.write_all(command.to_line()?.as_bytes())?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(PulseError::Format("server closed the control connection".to_string()));
        }
        match serde_json::from_str::<Reply>(line.trim())? {
            Reply::Error { message } => Err(PulseError::Format(message)),
            reply => Ok(reply),
        }
    }

    pub fn start_ping_thread(
        socket: Arc<UdpSocket>,
        target_addr: String,
        shutdown: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        info!("Ping thread started. Target: {}", target_addr);
        thread::spawn(move || {
            let interval = Duration::from_millis(INTERVAL_MS);
            while !shutdown.load(Ordering::Relaxed) {
                match socket.send_to(PING, &target_addr) {
                    Ok(_) => debug!("PING sent to {}", target_addr),
                    Err(ref e) if e.kind() == ErrorKind::ConnectionReset => {}
                    Err(e) => error!("Failed to send PING: {}", e),
                }
                thread::sleep(interval);
            }
            info!("Ping thread stopping...");
        })
    }
}

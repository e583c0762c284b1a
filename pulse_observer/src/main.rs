//! Pulse Observer: a small CLI that subscribes to a pulse server and prints the
//! ingestion and health events it broadcasts. It sends a `subscribe` command over
//! the TCP control channel, optionally joins per-source groups, keeps the
//! subscription alive with periodic `PING`s and listens for events on UDP.
//!
//! Usage example (CLI):
//! ```bash
//! pulse_observer --server-ip 192.168.0.10 --listen-port 55555
//! pulse_observer --list-sources
//! pulse_observer --check-health
//! ```
#![warn(missing_docs)]
mod args;
mod sender;

use crate::args::Args;
use crate::sender::CommandSender;
use clap::Parser;
use log::{debug, error, info, warn};
use pulse_common::net::{COMMAND_PORT, DATA_PORT, addr};
use pulse_common::{Command, Event, PulseError, Reply, Result};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

/// Runs a blocking loop that receives `Event`s from the given UDP `socket` and logs
/// them until `shutdown` is raised.
fn start_receiver_loop(socket: Arc<UdpSocket>, shutdown: Arc<AtomicBool>) -> Result<()> {
    info!("Event receiver running on: {}", socket.local_addr()?);
    let mut buf = [0u8; 4096];

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(size) => match Event::from_json_bytes(&buf[..size]) {
                Ok(event) => print_event(&event),
                Err(_) => debug!("Received non-event message: {}", String::from_utf8_lossy(&buf[..size])),
            },
            Err(e) => {
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                    continue;
                }
                error!("Receive data error: {}", e);
                return Err(e.into());
            }
        }
    }
    info!("Receiver loop stopping...");
    Ok(())
}

fn print_event(event: &Event) {
    match event {
        Event::IngestionUpdate(s) => info!(
            "INGESTION: rate={} total={} ok={} failed={} at {}",
            s.rate, s.total_records, s.success_count, s.error_count, s.timestamp
        ),
        Event::HealthUpdate(h) => info!(
            "HEALTH: {} is {} (cpu {}%, mem {}%, {} ms)",
            h.component, h.status, h.metrics.cpu_usage, h.metrics.memory_usage, h.metrics.response_time_ms
        ),
    }
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let server_ip = args.server_ip.trim().replace('"', "");
    let mut control = CommandSender::connect(&addr(&server_ip, COMMAND_PORT))?;

    if args.list_sources {
        if let Reply::Sources { sources } = control.request(&Command::ListSources)? {
            for s in sources {
                println!("{}  {:<20} {:<12} every {}s  {}", s.id, s.name, s.kind, s.poll_interval_seconds, s.url);
            }
        }
        return Ok(());
    }
    if args.check_health {
        if let Reply::Health { components } = control.request(&Command::CheckHealth)? {
            for c in components {
                println!(
                    "{:<16} {:<10} cpu {:>3}%  mem {:>3}%  {:>4} ms",
                    c.component, c.status, c.metrics.cpu_usage, c.metrics.memory_usage, c.metrics.response_time_ms
                );
            }
        }
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down observer...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| PulseError::Config(format!("failed to install Ctrl+C handler: {}", e)))?;
    }

    let mut listen_port = args.listen_port;
    if listen_port == DATA_PORT {
        warn!(
            "--listen-port={} matches the server DATA_PORT. A free local port will be selected.",
            listen_port
        );
        listen_port = 0;
    }
    let socket = Arc::new(UdpSocket::bind(addr("0.0.0.0", listen_port))?);
    socket.set_read_timeout(Some(Duration::from_secs(1)))?;
    let port = socket.local_addr()?.port();
    info!("UDP observer listening on port {}", port);

    if let Reply::Subscribed { observer_id } = control.request(&Command::Subscribe { port })? {
        info!("Subscribed as observer {}", observer_id);
    }
    for source_id in args.sources {
        match control.request(&Command::Join { port, source_id }) {
            Ok(_) => info!("Joined source {}", source_id),
            Err(e) => error!("Failed to join source {}: {}", source_id, e),
        }
    }

    let pinger = CommandSender::start_ping_thread(
        Arc::clone(&socket),
        addr(&server_ip, DATA_PORT),
        Arc::clone(&shutdown),
    );

    info!("Observer is running. Press Ctrl+C to exit.");
    let result = start_receiver_loop(socket, Arc::clone(&shutdown));
    shutdown.store(true, Ordering::SeqCst);

    if let Err(e) = control.request(&Command::Unsubscribe { port }) {
        warn!("Unsubscribe failed: {}", e);
    }
    let _ = pinger.join();
    result
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

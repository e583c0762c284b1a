//! Pulse ingestion and broadcast server.
//!
//! Wires the library together:
//!
//! - `Scheduler` runs the live ingestion trigger, the synthetic trigger in demo mode
//!   and the health trigger. Each firing runs one `Coordinator` tick or health check.
//! - `CommandReceiver` accepts observer control connections on `COMMAND_PORT`.
//! - `ObserverRegistry` streams broadcast events to subscribed observers over UDP from
//!   `DATA_PORT`; `UdpPingListener` and the expiry monitor keep that set alive.
//!
//! Ctrl+C stops the triggers, waits for in-flight ticks up to the shutdown timeout,
//! then closes the sockets and detaches every observer.
#![warn(missing_docs)]
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info, warn};
use pulse_common::net::{COMMAND_PORT, DATA_PORT, OBSERVER_TIMEOUT_SECS};
use pulse_common::{PulseError, Result};
use pulse_server::adapter::Adapters;
use pulse_server::adapter::fetch::HttpFetcher;
use pulse_server::args::Args;
use pulse_server::config::{Settings, import_sources};
use pulse_server::control::ControlSurface;
use pulse_server::coordinator::{Coordinator, IngestMode, Pipeline};
use pulse_server::health::{HealthTracker, RateTracker};
use pulse_server::model::keepalive::KeepAliveMonitor;
use pulse_server::model::price_walk::PriceWalk;
use pulse_server::observer::ObserverRegistry;
use pulse_server::publisher::Publisher;
use pulse_server::receiver::CommandReceiver;
use pulse_server::scheduler::{Scheduler, Trigger};
use pulse_server::seeder::{DemoSeeder, prime_walk};
use pulse_server::storage::{MemoryStore, Storage};
use pulse_server::udp_listener::{EXPIRY_CHECK_INTERVAL, UdpPingListener, start_expiry_monitor};

fn main() -> Result<()> {
    init_logger();
    let settings = Settings::from(Args::parse());
    settings.validate()?;
    run(settings)
}

fn run(settings: Settings) -> Result<()> {
    info!(
        "Starting in {} mode",
        if settings.demo { "demo" } else { "live" }
    );
    info!(
        "Retry options (count {}, delay {:?}) are accepted but not applied; failed pulls wait for the next tick",
        settings.retry_count, settings.retry_delay
    );

    let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());
    let walk = Arc::new(PriceWalk::from_seed(settings.seed));

    if settings.demo {
        let mut seeder = DemoSeeder::new(settings.seed);
        seeder.seed_sources(store.as_ref())?;
        seeder.seed_history(store.as_ref(), Utc::now())?;
        prime_walk(&walk, store.as_ref())?;
    }
    if let Some(path) = &settings.sources {
        import_sources(path, store.as_ref())?;
    }

    let fetcher = Arc::new(HttpFetcher::new(settings.request_timeout)?);
    let publisher = Arc::new(Publisher::new(settings.observer_buffer));
    let pipeline = Pipeline {
        store: Arc::clone(&store),
        adapters: Arc::new(Adapters::new(fetcher, Arc::clone(&walk))),
        rates: Arc::new(RateTracker::new()),
        health: Arc::new(HealthTracker::new(Arc::clone(&store), settings.demo, settings.seed)),
        publisher: Arc::clone(&publisher),
    };

    let data_socket = Arc::new(UdpSocket::bind(SocketAddr::new(settings.bind_ip, DATA_PORT))?);
    data_socket.set_read_timeout(Some(Duration::from_millis(500)))?;
    info!("UDP socket created on: {}", data_socket.local_addr()?);
    let observers = Arc::new(ObserverRegistry::new(
        Arc::clone(&publisher),
        Arc::clone(&data_socket),
        KeepAliveMonitor::new(Duration::from_secs(OBSERVER_TIMEOUT_SECS)),
    ));

    let (stop_tx, stop_rx) = unbounded::<()>();
    let ping_listener = UdpPingListener::start(data_socket, Arc::clone(&observers), stop_rx.clone())?;
    let expiry_monitor = start_expiry_monitor(Arc::clone(&observers), EXPIRY_CHECK_INTERVAL, stop_rx)?;

    let surface = Arc::new(ControlSurface::new(
        Arc::clone(&store),
        Arc::clone(&pipeline.health),
        Arc::clone(&publisher),
        Arc::clone(&observers),
    ));
    let receiver = CommandReceiver::new(&SocketAddr::new(settings.bind_ip, COMMAND_PORT).to_string())?;
    let command_addr = receiver.local_addr()?;
    let receiver_stop = Arc::new(AtomicBool::new(false));
    let receiver_shutdown = Arc::clone(&receiver_stop);
    let receiver_thread = thread::spawn(move || {
        if let Err(e) = receiver.accept_loop(surface, receiver_shutdown) {
            error!("Receiver loop failed: {}", e);
        }
    });

    let scheduler = start_triggers(&settings, &pipeline)?;

    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down server...");
        let _ = signal_tx.try_send(());
    })
    .map_err(|e| PulseError::Config(format!("failed to install Ctrl+C handler: {}", e)))?;

    info!("Server is running. Press Ctrl+C to exit.");
    let _ = signal_rx.recv();

    if !scheduler.stop() {
        warn!("Exiting with ingestion work still in flight");
    }

    receiver_stop.store(true, Ordering::SeqCst);
    let _ = TcpStream::connect(wake_addr(command_addr));
    drop(stop_tx);
    observers.detach_all()?;

    for (name, handle) in [
        ("receiver", receiver_thread),
        ("ping listener", ping_listener),
        ("keep-alive monitor", expiry_monitor),
    ] {
        if handle.join().is_err() {
            error!("The {} thread panicked", name);
        }
    }
    info!(
        "Server stopped after {} ingested record(s)",
        pipeline.rates.total()
    );
    Ok(())
}

fn start_triggers(settings: &Settings, pipeline: &Pipeline) -> Result<Scheduler> {
    let mut scheduler = Scheduler::new(settings.shutdown_timeout);

    let live = Coordinator::new(IngestMode::Live, pipeline.clone());
    scheduler.every(
        Trigger::new("live", settings.poll_interval).allow_overlap(settings.allow_overlap),
        move || {
            live.run_tick();
        },
    )?;

    if settings.demo {
        let mut synthetic = Coordinator::new(IngestMode::Synthetic, pipeline.clone())
            .with_batch(settings.batch_min, settings.batch_max);
        if let Some(seed) = settings.seed {
            synthetic = synthetic.with_seed(seed);
        }
        scheduler.every(
            Trigger::new("synthetic", settings.synthetic_interval).allow_overlap(settings.allow_overlap),
            move || {
                synthetic.run_tick();
            },
        )?;
    }

    let health = Arc::clone(&pipeline.health);
    let publisher = Arc::clone(&pipeline.publisher);
    scheduler.every(
        Trigger::new("health", settings.health_interval).allow_overlap(settings.allow_overlap),
        move || match health.check_health() {
            Ok(record) => {
                if let Err(e) = publisher.publish_health_update(&record) {
                    error!("Failed to publish health update: {}", e);
                }
            }
            Err(e) => error!("Scheduled health check failed: {}", e),
        },
    )?;

    Ok(scheduler)
}

/// Address that reaches the command listener from this host.
fn wake_addr(bound: SocketAddr) -> SocketAddr {
    if bound.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
    } else {
        bound
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

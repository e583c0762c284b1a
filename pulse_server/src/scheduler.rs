//! Periodic triggers driving the pipeline.
//!
//! Every trigger owns a thread that fires its job immediately and then on each tick
//! of a `crossbeam_channel::tick` timer, multiplexed with the shared stop channel via
//! `select!`. Each firing runs the job on a fresh worker thread, so a slow job never
//! delays the timer.
//!
//! Overlap: by default a trigger skips a firing while its previous job is still in
//! flight (logged at `warn`). Triggers registered with `allow_overlap` start every
//! firing regardless, so jobs of the same trigger may run concurrently.
//!
//! Shutdown: `stop` ends all trigger loops, then waits up to the shutdown timeout for
//! in-flight jobs to finish. Jobs are never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use log::{debug, error, info, warn};
use pulse_common::{PulseError, Result};

type Job = Arc<dyn Fn() + Send + Sync>;

/// Count of running jobs with a wait-until-zero primitive.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count += 1;
        }
    }

    fn exit(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.idle.notify_all();
            }
        }
    }

    fn current(&self) -> usize {
        self.count.lock().map(|c| *c).unwrap_or(0)
    }

    /// Returns true when everything drained before `timeout`.
    fn wait_idle(&self, timeout: Duration) -> bool {
        let Ok(count) = self.count.lock() else {
            return false;
        };
        match self.idle.wait_timeout_while(count, timeout, |c| *c > 0) {
            Ok((_, result)) => !result.timed_out(),
            Err(_) => false,
        }
    }
}

/// Releases the running flag and the in-flight slot even if the job panics.
struct FiringGuard {
    running: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
}

impl Drop for FiringGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.in_flight.exit();
    }
}

/// Options of one periodic trigger.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub interval: Duration,
    pub allow_overlap: bool,
}

impl Trigger {
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            allow_overlap: false,
        }
    }

    pub fn allow_overlap(mut self, allow: bool) -> Self {
        self.allow_overlap = allow;
        self
    }
}

/// Owner of all trigger threads.
pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    triggers: Vec<JoinHandle<()>>,
    in_flight: Arc<InFlight>,
    shutdown_timeout: Duration,
}

impl Scheduler {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (stop_tx, stop_rx) = unbounded();
        Self {
            stop_tx: Some(stop_tx),
            stop_rx,
            triggers: Vec::new(),
            in_flight: Arc::new(InFlight::default()),
            shutdown_timeout,
        }
    }

    /// Register a trigger firing `job` now and every `trigger.interval`.
    pub fn every<F>(&mut self, trigger: Trigger, job: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if trigger.interval.is_zero() {
            return Err(PulseError::Config(format!(
                "trigger '{}' needs a non-zero interval",
                trigger.name
            )));
        }
        let job: Job = Arc::new(job);
        let stop_rx = self.stop_rx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let name = trigger.name.clone();

        let handle = thread::Builder::new()
            .name(format!("trigger-{}", name))
            .spawn(move || run_trigger(trigger, job, stop_rx, in_flight))?;
        info!("Trigger '{}' scheduled", name);
        self.triggers.push(handle);
        Ok(())
    }

    /// Stop issuing firings and let in-flight jobs drain.
    /// Returns false when jobs were still running at the shutdown timeout.
    pub fn stop(mut self) -> bool {
        drop(self.stop_tx.take());
        for handle in self.triggers.drain(..) {
            if handle.join().is_err() {
                error!("A trigger thread panicked");
            }
        }
        let drained = self.in_flight.wait_idle(self.shutdown_timeout);
        if drained {
            info!("Scheduler stopped, all jobs drained");
        } else {
            warn!(
                "Scheduler stopped with {} job(s) still running after {:?}",
                self.in_flight.current(),
                self.shutdown_timeout
            );
        }
        drained
    }
}

fn run_trigger(trigger: Trigger, job: Job, stop_rx: Receiver<()>, in_flight: Arc<InFlight>) {
    let running = Arc::new(AtomicBool::new(false));
    let ticker = tick(trigger.interval);

    loop {
        fire(&trigger, &job, &running, &in_flight);
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {},
        }
    }
    debug!("Trigger '{}' stopped", trigger.name);
}

fn fire(trigger: &Trigger, job: &Job, running: &Arc<AtomicBool>, in_flight: &Arc<InFlight>) {
    let already_running = running.swap(true, Ordering::SeqCst);
    if already_running && !trigger.allow_overlap {
        warn!(
            "Trigger '{}': previous run still in progress, skipping this firing",
            trigger.name
        );
        return;
    }

    in_flight.enter();
    let guard = FiringGuard {
        running: Arc::clone(running),
        in_flight: Arc::clone(in_flight),
    };
    let job = Arc::clone(job);
    let spawned = thread::Builder::new()
        .name(format!("job-{}", trigger.name))
        .spawn(move || {
            let _guard = guard;
            job();
        });
    if let Err(e) = spawned {
        error!("Trigger '{}': failed to start job: {}", trigger.name, e);
    }
}

//! Keep-alive tracking for subscribed observers.
//!
//! Observers announce themselves with `PING` datagrams on the data port. The monitor
//! stores the last time each observer address was heard from; `expired` removes and
//! returns every observer silent for longer than the timeout so the caller can detach
//! it from the publisher. An observer that pings again after expiry is tracked afresh.
//!
//! Time is measured with `Instant`, which is monotonic. The monitor itself is not
//! synchronized; share it behind a `Mutex`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Last-heard bookkeeping per observer address.
pub struct KeepAliveMonitor {
    last_seen: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl KeepAliveMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    /// Record that `addr` is alive now.
    pub fn touch(&mut self, addr: SocketAddr) {
        self.last_seen.insert(addr, Instant::now());
    }

    /// Stop tracking `addr` (explicit unsubscribe).
    pub fn forget(&mut self, addr: &SocketAddr) {
        self.last_seen.remove(addr);
    }

    /// Remove and return every observer silent for longer than the timeout.
    pub fn expired(&mut self) -> Vec<SocketAddr> {
        let now = Instant::now();
        let timeout = self.timeout;
        let mut expired = Vec::new();

        self.last_seen.retain(|addr, seen| {
            if now.duration_since(*seen) > timeout {
                expired.push(*addr);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn is_alive(&self, addr: &SocketAddr) -> bool {
        self.last_seen
            .get(addr)
            .is_some_and(|seen| seen.elapsed() <= self.timeout)
    }
}

//! Shared networking constants and helpers used by server and observer.

/// TCP port for the control channel (observer -> server).
pub const COMMAND_PORT: u16 = 7070;
/// UDP port for event delivery and keep-alive pings (server <-> observer).
pub const DATA_PORT: u16 = 7071;
/// Keep-alive datagram sent by observers.
pub const PING: &[u8] = b"PING";
/// Seconds without a ping after which an observer is detached.
pub const OBSERVER_TIMEOUT_SECS: u64 = 5;

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

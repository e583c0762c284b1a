//! In-memory state owned by the server.
//!
//! - `price_walk`: per-symbol random walk used by the synthetic path.
//! - `keepalive`: last-heard tracker that detaches silent observers.

pub mod keepalive;
pub mod price_walk;

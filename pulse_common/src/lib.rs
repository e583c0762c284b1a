//!
//! Common types and utilities shared by the pulse server and observer.
//!
//! This crate aggregates:
//! - `error`: unified error type `PulseError` used across the workspace.
//! - `result`: handy `Result<T, PulseError>` alias.
//! - `model`: data sources, ingested records, health records and tick summaries.
//! - `event`: broadcast events pushed to observers.
//! - `command`: control commands and replies exchanged over TCP.
//! - `symbols`: the synthetic symbol universe and its seed prices.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod event;
pub mod model;
pub mod net;
pub mod result;
pub mod symbols;

pub use command::{Command, Reply};
pub use error::PulseError;
pub use event::{Event, HealthUpdate};
pub use result::Result;

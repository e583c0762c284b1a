//! Pulse ingestion server library.
//!
//! Periodic triggers (`scheduler`) run ingestion ticks (`coordinator`) that pull data
//! sources through `adapter`s, persist records via the `storage` port, update the
//! throughput and `health` trackers and broadcast the results through the `publisher`.
//! Observers reach the server over a TCP control channel (`receiver`, `control`) and
//! receive events over UDP (`observer`, `udp_listener`).
pub mod adapter;
pub mod args;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod health;
pub mod model;
pub mod observer;
pub mod publisher;
pub mod receiver;
pub mod scheduler;
pub mod seeder;
pub mod storage;
pub mod udp_listener;

//! depwatch daemon library.
//!
//! Exposes the daemon's modules for integration testing.
//! In production, `depwatch-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod summary;
pub mod watcher;

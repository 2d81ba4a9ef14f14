//! Shared E2E test helpers.
//!
//! Provides a configuration builder rooted in temporary directories and
//! fixtures for manifests and the vulnerability database.

pub mod config;
pub mod fixtures;

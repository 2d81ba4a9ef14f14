//! Scenario test modules.
//!
//! - `single_flight` -- concurrent triggers, exactly one pipeline runs
//! - `cancellation` -- canceled or closed scans never publish
//! - `failures` -- failed stages publish nothing and stay per scanner
//! - `triggers` -- configuration/file/manual triggers and skip rules
//! - `registry` -- detection, idempotent refresh, nested npm roots
//! - `maven_flow` -- end-to-end Maven project against the local database

mod cancellation;
mod failures;
mod maven_flow;
mod registry;
mod single_flight;
mod triggers;

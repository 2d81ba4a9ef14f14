//! E2E integration tests for depwatch-daemon.
//!
//! These tests drive the daemon against real project directories in
//! temporary workspaces, using the local JSON vulnerability database.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (config builder, workspace fixtures)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p depwatch-daemon --test e2e
//! ```

mod helpers;

//! E2E integration tests for depwatch-scanner.
//!
//! These tests drive the scanner registry and scan pipelines against temporary
//! workspaces, using mock resolvers/backends/stores where the real collaborators
//! would make the scenario nondeterministic.
//!
//! # Test Structure
//!
//! - `helpers/` -- Mock collaborators, workspace fixtures, context builder
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p depwatch-scanner --test e2e
//! ```

mod helpers;
mod scenarios;

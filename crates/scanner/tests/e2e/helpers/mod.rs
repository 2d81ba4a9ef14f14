//! Shared test utilities for scanner E2E tests.

pub mod env;
pub mod workspace;

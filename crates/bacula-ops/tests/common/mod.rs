//! Shared test utilities for bacula-ops integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temporary host root
//! - Builder patterns for unit states and relation data

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{CallLog, HostOptions, TestHarness};

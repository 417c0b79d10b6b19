//! Test utilities for the vectorbench crates.
//!
//! This crate provides in-memory stand-ins for the collaborators of the workload crate, plus a
//! logging initializer for tests. See the modules for all available utilities.

pub mod client;
pub mod tracing;

//! Command line frontend for the vectorbench workload generator.
//!
//! This builds on top of [`vectorbench_workload`] and adds layered configuration, logging, an
//! HTTP client for provisioning tenant indices, and a reference driver that writes generated
//! request parameters as JSON lines.

pub mod cli;
pub mod config;
pub mod generate;
pub mod http;
pub mod observability;

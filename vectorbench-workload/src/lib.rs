//! Workload parameters for vector search load tests.
//!
//! This crate generates synthetic bulk indexing payloads and nearest-neighbor queries for a
//! benchmark driver. Generation is split across parallel workers through
//! [`ParamSource::partition`]; the multi-tenant sources give every worker a deterministic tenant
//! so that workers never need to coordinate.
//!
//! The [`Registry`] exposes the sources and the tenant index [provisioning](provision) runner by
//! name. Nothing in this crate installs a logging subscriber, it only emits `tracing` events for
//! the host to collect.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod options;
pub mod params;
pub mod partition;
pub mod payload;
pub mod provision;
pub mod registry;

pub use crate::error::{ClientError, ProvisionError, Result, WorkloadError};
pub use crate::options::Options;
pub use crate::params::{BoxedParamSource, Emission, ParamSource, RequestDescriptor, emissions};
pub use crate::partition::{TenantId, tenant_id};
pub use crate::provision::{IndexClient, RequestContext, RunnerResponse, create_tenant_indices};
pub use crate::registry::{Registry, register};

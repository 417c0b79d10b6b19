//! Error types of the workload library.
//!
//! [`WorkloadError`] covers option parsing and registry lookups, [`ClientError`] is what an index
//! client reports, and [`ProvisionError`] wraps both for the provisioning routine.

use thiserror::Error;

/// Errors raised while constructing parameter sources or resolving registry entries.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// An option was present but had the wrong shape or type.
    #[error("malformed workload options: {0}")]
    Options(#[from] serde_json::Error),

    /// An option parsed correctly but its value is out of range.
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption {
        /// The option key as it appears in the configuration.
        name: &'static str,
        /// Human readable description of the constraint that was violated.
        reason: &'static str,
    },

    /// No parameter source is registered under the requested name.
    #[error("unknown parameter source `{0}`")]
    UnknownParamSource(String),

    /// No runner is registered under the requested name.
    #[error("unknown runner `{0}`")]
    UnknownRunner(String),
}

/// A convenience alias that defaults our [`WorkloadError`] type.
pub type Result<T, E = WorkloadError> = std::result::Result<T, E>;

/// Errors reported by an [`IndexClient`](crate::provision::IndexClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The index does not exist on the target cluster.
    #[error("index `{0}` not found")]
    NotFound(String),

    /// The target cluster answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status {
        /// HTTP status code returned by the cluster.
        status: u16,
        /// Response body, usually a JSON error document.
        body: String,
    },

    /// Transport level failure, such as a refused connection or a timeout.
    #[error("transport error: {context}")]
    Transport {
        /// What the client was doing when the failure happened.
        context: String,
        /// The underlying transport error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors that abort the index provisioning routine.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The setup options could not be parsed or validated.
    #[error(transparent)]
    Options(#[from] WorkloadError),

    /// Deleting a tenant index failed for a reason other than it being absent.
    #[error("failed to delete index `{index}`")]
    Delete {
        /// Name of the tenant index being torn down.
        index: String,
        /// The error reported by the index client.
        #[source]
        cause: ClientError,
    },

    /// Creating a tenant index failed.
    #[error("failed to create index `{index}`")]
    Create {
        /// Name of the tenant index being created.
        index: String,
        /// The error reported by the index client.
        #[source]
        cause: ClientError,
    },
}

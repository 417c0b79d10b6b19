//! One-shot provisioning of the tenant indices.
//!
//! Before the load phase, [`create_tenant_indices`] drops and recreates `num_tenants` indices named
//! `{index_prefix}_{0..num_tenants}`. Tenants are processed one after another in index order.
//! There is no retry: the first failing call aborts the routine, which leaves the tenants before
//! it freshly created and the ones after it untouched.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{ClientError, ProvisionError};
use crate::options::{FromOptions, Options, SetupOptions};
use crate::partition::{TenantId, tenant_index_name};

/// Registry name of the provisioning runner.
pub const CREATE_INDICES_RUNNER: &str = "multi-tenant-create-indices";

/// Index administration calls against the search engine.
#[async_trait::async_trait]
pub trait IndexClient: fmt::Debug + Send + Sync {
    /// Deletes an index, failing with [`ClientError::NotFound`] if it does not exist.
    async fn delete_index(&self, index: &str) -> Result<(), ClientError>;

    /// Creates an index with the given settings and mappings.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), ClientError>;
}

/// Request tracking provided by the host, bracketing each external call.
pub trait RequestContext: Send {
    /// Marks the start of a tracked request.
    fn on_request_start(&mut self);

    /// Marks the end of a tracked request.
    fn on_request_end(&mut self);
}

/// A [`RequestContext`] that tracks nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopContext;

impl RequestContext for NoopContext {
    fn on_request_start(&mut self) {}

    fn on_request_end(&mut self) {}
}

/// Result reported to the driver once all tenants are provisioned.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RunnerResponse {
    /// Always `true`; failures are reported as errors instead.
    pub success: bool,
    /// Number of operations this call accounts for.
    pub weight: u32,
    /// Unit of `weight`.
    pub unit: &'static str,
}

impl RunnerResponse {
    fn ops(weight: u32) -> Self {
        Self {
            success: true,
            weight,
            unit: "ops",
        }
    }
}

/// Settings and mappings applied to every tenant index.
#[derive(Clone, Debug)]
pub struct IndexTemplate {
    options: SetupOptions,
}

impl IndexTemplate {
    /// Builds the template from parsed setup options.
    pub fn new(options: SetupOptions) -> Self {
        Self { options }
    }

    /// Renders the index creation body.
    ///
    /// Optional knobs that are not configured are left out entirely, so the engine's own defaults
    /// stay in effect.
    pub fn body(&self) -> Value {
        let options = &self.options;

        let mut index = Map::new();
        index.insert("knn".into(), json!(true));
        index.insert(
            "number_of_shards".into(),
            json!(options.target_index_primary_shards),
        );
        index.insert(
            "number_of_replicas".into(),
            json!(options.target_index_replica_shards),
        );
        index.insert("refresh_interval".into(), options.refresh_interval.clone());
        if options.derived_source_enabled {
            index.insert("knn.derived_source.enabled".into(), json!(true));
        }
        if let Some(threshold) = &options.approximate_graph_build_threshold {
            index.insert("knn.advanced.approximate_threshold".into(), threshold.clone());
        }

        let mut properties = Map::new();
        properties.insert(
            options.field.clone(),
            json!({
                "type": "knn_vector",
                "dimension": options.dims,
                "mode": options.mode,
                "compression_level": options.compression_level,
                "method": {
                    "name": "hnsw",
                    "space_type": options.target_index_space_type,
                    "engine": "faiss",
                    "parameters": {
                        "ef_construction": options.hnsw_ef_construction,
                        "ef_search": options.hnsw_ef_search,
                    },
                },
            }),
        );

        json!({
            "settings": { "index": index },
            "mappings": { "properties": properties },
        })
    }
}

/// Drops and recreates every tenant index.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn create_tenant_indices(
    client: &dyn IndexClient,
    context: &mut dyn RequestContext,
    options: &Options,
) -> Result<RunnerResponse, ProvisionError> {
    let setup = SetupOptions::from_options(options)?;
    let num_tenants = setup.num_tenants;
    let prefix = setup.index_prefix.clone();
    let body = IndexTemplate::new(setup).body();

    tracing::info!(num_tenants, %prefix, "provisioning tenant indices");
    for tenant in (0..num_tenants).map(TenantId) {
        let index = tenant_index_name(&prefix, tenant);

        context.on_request_start();
        match client.delete_index(&index).await {
            Ok(()) => tracing::debug!(%index, "deleted existing index"),
            Err(ClientError::NotFound(_)) => tracing::debug!(%index, "no existing index"),
            Err(cause) => return Err(ProvisionError::Delete { index, cause }),
        }
        if let Err(cause) = client.create_index(&index, &body).await {
            return Err(ProvisionError::Create { index, cause });
        }
        context.on_request_end();

        tracing::debug!(%index, "created index");
    }

    Ok(RunnerResponse::ops(1))
}

//! Typed views over the flat option mapping handed to every parameter source.
//!
//! A single [`Options`] mapping is shared by all sources of a benchmark, so each view only picks
//! the keys it understands and ignores the rest. Missing keys fall back to the defaults listed on
//! the individual fields.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{Result, WorkloadError};

/// The raw, flat option mapping as supplied by the benchmark configuration.
pub type Options = Map<String, Value>;

/// Default field holding the generated vectors.
pub const DEFAULT_FIELD: &str = "target_field";
/// Default index for the single-index sources.
pub const DEFAULT_INDEX_NAME: &str = "target_index";
/// Default prefix for tenant index names.
pub const DEFAULT_INDEX_PREFIX: &str = "tenant_index";

/// A typed view that can be parsed and validated from [`Options`].
pub trait FromOptions: DeserializeOwned {
    /// Checks value ranges after parsing.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Parses the view from the raw mapping and validates it.
    fn from_options(options: &Options) -> Result<Self> {
        let parsed: Self = serde_json::from_value(Value::Object(options.clone()))?;
        parsed.validate()?;
        Ok(parsed)
    }
}

fn positive(name: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(WorkloadError::InvalidOption {
            name,
            reason: "must be a positive integer",
        });
    }
    Ok(())
}

/// Reads a name as a string, accepting numbers and booleans as well.
///
/// YAML and environment variables turn unquoted values like `2024` into numbers.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "invalid type: expected a string, found {other}"
        ))),
    }
}

/// Options of the `random-vector-bulk-param-source`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BulkOptions {
    /// Number of documents per bulk request. Defaults to `100`.
    #[serde(rename = "bulk-size")]
    pub bulk_size: usize,
    /// Target index. Defaults to `target_index`.
    #[serde(deserialize_with = "scalar_string")]
    pub index_name: String,
    /// Vector field name. Defaults to `target_field`.
    #[serde(deserialize_with = "scalar_string")]
    pub field: String,
    /// Vector dimensionality. Defaults to `768`.
    pub dims: usize,
    /// Upper bound (inclusive) of the random `partition_id` tag. Defaults to `1000`.
    pub partitions: u32,
    /// Optional base seed for reproducible payloads.
    pub seed: Option<u64>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            bulk_size: 100,
            index_name: DEFAULT_INDEX_NAME.to_owned(),
            field: DEFAULT_FIELD.to_owned(),
            dims: 768,
            partitions: 1000,
            seed: None,
        }
    }
}

impl FromOptions for BulkOptions {
    fn validate(&self) -> Result<()> {
        positive("bulk-size", self.bulk_size as u64)?;
        positive("dims", self.dims as u64)
    }
}

/// Options of the `random-vector-search-param-source`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchOptions {
    /// Target index. Defaults to `target_index`.
    #[serde(deserialize_with = "scalar_string")]
    pub index_name: String,
    /// Vector field name. Defaults to `target_field`.
    #[serde(deserialize_with = "scalar_string")]
    pub field: String,
    /// Query vector dimensionality. Defaults to `768`.
    pub dims: usize,
    /// Number of neighbors to request, also used as the result size. Defaults to `100`.
    pub k: u32,
    /// Whether the request cache may be used. Defaults to `false`.
    pub cache: bool,
    /// Body fragment merged on top of the generated query.
    pub body: Map<String, Value>,
    /// Whether the driver should collect detailed results. Defaults to `false`.
    #[serde(rename = "detailed-results")]
    pub detailed_results: bool,
    /// Optional base seed for reproducible queries.
    pub seed: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_owned(),
            field: DEFAULT_FIELD.to_owned(),
            dims: 768,
            k: 100,
            cache: false,
            body: Map::new(),
            detailed_results: false,
            seed: None,
        }
    }
}

impl FromOptions for SearchOptions {
    fn validate(&self) -> Result<()> {
        positive("dims", self.dims as u64)?;
        positive("k", self.k.into())
    }
}

/// Options of the `multi-tenant-bulk-param-source`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TenantBulkOptions {
    /// Number of tenant indices. Defaults to `32`.
    pub num_tenants: usize,
    /// Tenant index name prefix. Defaults to `tenant_index`.
    #[serde(deserialize_with = "scalar_string")]
    pub index_prefix: String,
    /// Number of documents per bulk request. Defaults to `100`.
    #[serde(rename = "bulk-size")]
    pub bulk_size: usize,
    /// Vector field name. Defaults to `target_field`.
    #[serde(deserialize_with = "scalar_string")]
    pub field: String,
    /// Vector dimensionality. Defaults to `256`.
    pub dims: usize,
    /// Number of vectors a single worker sends to its tenant. Defaults to `600000`.
    pub vectors_per_tenant: u64,
    /// Optional base seed for reproducible payloads.
    pub seed: Option<u64>,
}

impl Default for TenantBulkOptions {
    fn default() -> Self {
        Self {
            num_tenants: 32,
            index_prefix: DEFAULT_INDEX_PREFIX.to_owned(),
            bulk_size: 100,
            field: DEFAULT_FIELD.to_owned(),
            dims: 256,
            vectors_per_tenant: 600_000,
            seed: None,
        }
    }
}

impl FromOptions for TenantBulkOptions {
    fn validate(&self) -> Result<()> {
        positive("num_tenants", self.num_tenants as u64)?;
        positive("bulk-size", self.bulk_size as u64)?;
        positive("dims", self.dims as u64)
    }
}

/// Options of the `multi-tenant-search-param-source`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TenantSearchOptions {
    /// Number of tenant indices. Defaults to `32`.
    pub num_tenants: usize,
    /// Tenant index name prefix. Defaults to `tenant_index`.
    #[serde(deserialize_with = "scalar_string")]
    pub index_prefix: String,
    /// Vector field name. Defaults to `target_field`.
    #[serde(deserialize_with = "scalar_string")]
    pub field: String,
    /// Query vector dimensionality. Defaults to `256`.
    pub dims: usize,
    /// Number of neighbors to request. Defaults to `100`.
    pub k: u32,
    /// Optional base seed for reproducible queries.
    pub seed: Option<u64>,
}

impl Default for TenantSearchOptions {
    fn default() -> Self {
        Self {
            num_tenants: 32,
            index_prefix: DEFAULT_INDEX_PREFIX.to_owned(),
            field: DEFAULT_FIELD.to_owned(),
            dims: 256,
            k: 100,
            seed: None,
        }
    }
}

impl FromOptions for TenantSearchOptions {
    fn validate(&self) -> Result<()> {
        positive("num_tenants", self.num_tenants as u64)?;
        positive("dims", self.dims as u64)?;
        positive("k", self.k.into())
    }
}

/// Options consumed by the tenant index provisioning routine.
///
/// Index settings held as [`Value`] are copied into the index body as given, so `-1` for the
/// refresh interval reaches the engine as a number.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SetupOptions {
    /// Number of tenant indices to (re)create. Defaults to `32`.
    pub num_tenants: usize,
    /// Tenant index name prefix. Defaults to `tenant_index`.
    #[serde(deserialize_with = "scalar_string")]
    pub index_prefix: String,
    /// Vector field name. Defaults to `target_field`.
    #[serde(deserialize_with = "scalar_string")]
    pub field: String,
    /// Vector dimensionality. Defaults to `256`.
    pub dims: usize,
    /// Primary shards per tenant index. Defaults to `6`.
    pub target_index_primary_shards: u32,
    /// Replica shards per tenant index. Defaults to `2`.
    pub target_index_replica_shards: u32,
    /// Index refresh interval. Defaults to `5s`.
    pub refresh_interval: Value,
    /// Vector storage mode. Defaults to `on_disk`.
    pub mode: Value,
    /// Vector compression level. Defaults to `32x`.
    pub compression_level: Value,
    /// Similarity function of the HNSW graph. Defaults to `innerproduct`.
    pub target_index_space_type: Value,
    /// HNSW construction beam width. Defaults to `512`.
    pub hnsw_ef_construction: u32,
    /// HNSW search beam width. Defaults to `100`.
    pub hnsw_ef_search: u32,
    /// Enables derived source for the vector field. Defaults to `false`.
    pub derived_source_enabled: bool,
    /// Segment size threshold before graphs are built. Omitted from the index when unset.
    pub approximate_graph_build_threshold: Option<Value>,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            num_tenants: 32,
            index_prefix: DEFAULT_INDEX_PREFIX.to_owned(),
            field: DEFAULT_FIELD.to_owned(),
            dims: 256,
            target_index_primary_shards: 6,
            target_index_replica_shards: 2,
            refresh_interval: "5s".into(),
            mode: "on_disk".into(),
            compression_level: "32x".into(),
            target_index_space_type: "innerproduct".into(),
            hnsw_ef_construction: 512,
            hnsw_ef_search: 100,
            derived_source_enabled: false,
            approximate_graph_build_threshold: None,
        }
    }
}

impl FromOptions for SetupOptions {
    fn validate(&self) -> Result<()> {
        positive("num_tenants", self.num_tenants as u64)?;
        positive("dims", self.dims as u64)?;
        positive("target_index_primary_shards", self.target_index_primary_shards.into())
    }
}

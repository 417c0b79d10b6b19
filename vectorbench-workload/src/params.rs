//! Partition-aware parameter sources.
//!
//! A driver creates one source per worker, binds it to that worker with
//! [`ParamSource::partition`] and then calls [`ParamSource::params`] until it returns
//! [`Emission::Exhausted`]. Sources are owned by exactly one worker and never shared, so they keep
//! their running state without synchronization.
//!
//! | Source | Tenant-aware | Terminates |
//! |---|---|---|
//! | [`RandomBulkParamSource`] | no | never |
//! | [`RandomSearchParamSource`] | no | never |
//! | [`TenantBulkParamSource`] | yes | after `vectors_per_tenant` documents |
//! | [`TenantSearchParamSource`] | yes | never |
//! | [`TenantSetupParamSource`] | no | never |

use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::options::{
    BulkOptions, FromOptions, Options, SearchOptions, TenantBulkOptions, TenantSearchOptions,
};
use crate::partition::{TenantId, tenant_id, tenant_index_name};
use crate::payload::{
    BulkAction, BulkRecord, Document, knn_query, merge_body, random_vector, serialize_records,
};

/// A type-erased [`ParamSource`] instance.
pub type BoxedParamSource = Box<dyn ParamSource>;

/// A stateful generator yielding the parameters of one request per call.
pub trait ParamSource: fmt::Debug + Send {
    /// The name this source is registered under, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Binds this instance to one worker out of `worker_count`.
    ///
    /// Call this at most once per instance, before the first call to [`params`](Self::params).
    fn partition(self: Box<Self>, worker_index: usize, worker_count: usize) -> BoxedParamSource;

    /// Produces the next request, or signals that this worker is done.
    fn params(&mut self) -> Emission;
}

/// The outcome of a single [`ParamSource::params`] call.
#[derive(Clone, Debug)]
pub enum Emission {
    /// The next request to issue.
    Emitted(RequestDescriptor),
    /// The source has nothing left to emit. This is final, not an error.
    Exhausted,
}

impl Emission {
    /// Returns `true` if the source is exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Emission::Exhausted)
    }

    /// Returns the emitted request, if any.
    pub fn into_descriptor(self) -> Option<RequestDescriptor> {
        match self {
            Emission::Emitted(descriptor) => Some(descriptor),
            Emission::Exhausted => None,
        }
    }
}

/// Adapts a source into an iterator that ends once the source is exhausted.
pub fn emissions(source: &mut dyn ParamSource) -> impl Iterator<Item = RequestDescriptor> + '_ {
    std::iter::from_fn(move || source.params().into_descriptor())
}

/// Parameters of a single request, handed to the request execution layer.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum RequestDescriptor {
    /// A bulk write.
    Bulk(BulkRequest),
    /// A single nearest-neighbor search.
    Search(SearchRequest),
    /// The raw options, passed through to the provisioning runner.
    Setup(Options),
}

/// A batch of generated documents for one bulk request.
#[derive(Clone, Debug, Serialize)]
pub struct BulkRequest {
    /// Header and document pairs, serialized as a flat alternating list.
    #[serde(rename = "body", serialize_with = "serialize_records")]
    pub records: Vec<BulkRecord>,
    /// Number of documents in this batch.
    #[serde(rename = "bulk-size")]
    pub bulk_size: usize,
    /// Always `true`: every document is preceded by its action header.
    #[serde(rename = "action-metadata-present")]
    pub action_metadata_present: bool,
    /// Unit used by the driver to account for throughput.
    pub unit: &'static str,
    /// The target index.
    pub index: String,
    /// Legacy mapping type, always empty.
    #[serde(rename = "type")]
    pub doc_type: &'static str,
}

impl BulkRequest {
    fn new(index: String, records: Vec<BulkRecord>) -> Self {
        Self {
            bulk_size: records.len(),
            records,
            action_metadata_present: true,
            unit: "docs",
            index,
            doc_type: "",
        }
    }
}

/// A single nearest-neighbor search request.
#[derive(Clone, Debug, Serialize)]
pub struct SearchRequest {
    /// The target index.
    pub index: String,
    /// Whether the request cache may serve this query.
    pub cache: bool,
    /// Number of hits to return.
    pub size: u32,
    /// The query body.
    pub body: Map<String, Value>,
    /// Whether the driver records per-hit details for this request.
    #[serde(rename = "detailed-results")]
    pub detailed_results: bool,
}

/// Creates the random stream for one worker.
///
/// With a base seed every worker gets its own reproducible stream, otherwise the stream is seeded
/// from the operating system.
fn worker_rng(seed: Option<u64>, worker_index: usize) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(worker_index as u64)),
        None => SmallRng::from_os_rng(),
    }
}

fn log_assignment(
    source: &'static str,
    worker_index: usize,
    worker_count: usize,
    tenant_count: usize,
    tenant: TenantId,
) {
    tracing::debug!(source, worker_index, worker_count, %tenant, "assigned tenant");

    // Only the first worker reports, all of them would see the same picture.
    if worker_index != 0 {
        return;
    }
    if worker_count < tenant_count {
        tracing::warn!(
            source,
            worker_count,
            tenant_count,
            "fewer workers than tenants, some tenants receive no traffic"
        );
    } else if worker_count % tenant_count != 0 {
        tracing::warn!(
            source,
            worker_count,
            tenant_count,
            "worker count is not a multiple of the tenant count, tenant load is uneven"
        );
    }
}

/// Streams bulk batches of random vectors into a single index.
#[derive(Debug)]
pub struct RandomBulkParamSource {
    options: BulkOptions,
    rng: SmallRng,
}

impl RandomBulkParamSource {
    /// Registry name of this source.
    pub const NAME: &'static str = "random-vector-bulk-param-source";

    /// Creates the source from raw options.
    pub fn new(options: &Options) -> Result<Self> {
        let options = BulkOptions::from_options(options)?;
        tracing::debug!(?options, "created {}", Self::NAME);
        Ok(Self {
            rng: worker_rng(options.seed, 0),
            options,
        })
    }
}

impl ParamSource for RandomBulkParamSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn partition(mut self: Box<Self>, worker_index: usize, _worker_count: usize) -> BoxedParamSource {
        if self.options.seed.is_some() {
            self.rng = worker_rng(self.options.seed, worker_index);
        }
        self
    }

    fn params(&mut self) -> Emission {
        let options = &self.options;
        let records = (0..options.bulk_size)
            .map(|_| BulkRecord {
                action: BulkAction::Create,
                index: options.index_name.clone(),
                document: Document {
                    partition_id: Some(self.rng.random_range(0..=options.partitions)),
                    field: options.field.clone(),
                    vector: random_vector(&mut self.rng, options.dims),
                },
            })
            .collect();

        let request = BulkRequest::new(options.index_name.clone(), records);
        Emission::Emitted(RequestDescriptor::Bulk(request))
    }
}

/// Issues random nearest-neighbor queries against a single index.
#[derive(Debug)]
pub struct RandomSearchParamSource {
    options: SearchOptions,
    rng: SmallRng,
}

impl RandomSearchParamSource {
    /// Registry name of this source.
    pub const NAME: &'static str = "random-vector-search-param-source";

    /// Creates the source from raw options.
    pub fn new(options: &Options) -> Result<Self> {
        let options = SearchOptions::from_options(options)?;
        tracing::debug!(?options, "created {}", Self::NAME);
        Ok(Self {
            rng: worker_rng(options.seed, 0),
            options,
        })
    }
}

impl ParamSource for RandomSearchParamSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn partition(mut self: Box<Self>, worker_index: usize, _worker_count: usize) -> BoxedParamSource {
        if self.options.seed.is_some() {
            self.rng = worker_rng(self.options.seed, worker_index);
        }
        self
    }

    fn params(&mut self) -> Emission {
        let options = &self.options;
        let vector = random_vector(&mut self.rng, options.dims);
        let mut body = knn_query(&options.field, vector, options.k);
        merge_body(&mut body, &options.body);

        Emission::Emitted(RequestDescriptor::Search(SearchRequest {
            index: options.index_name.clone(),
            cache: options.cache,
            size: options.k,
            body,
            detailed_results: options.detailed_results,
        }))
    }
}

/// Fills the index of the worker's tenant until its per-tenant volume is reached.
#[derive(Debug)]
pub struct TenantBulkParamSource {
    options: TenantBulkOptions,
    rng: SmallRng,
    tenant: TenantId,
    index_name: String,
    vectors_sent: u64,
}

impl TenantBulkParamSource {
    /// Registry name of this source.
    pub const NAME: &'static str = "multi-tenant-bulk-param-source";

    /// Creates the source from raw options. Until partitioned, it targets tenant `0`.
    pub fn new(options: &Options) -> Result<Self> {
        let options = TenantBulkOptions::from_options(options)?;
        tracing::debug!(?options, "created {}", Self::NAME);
        let tenant = TenantId::default();
        Ok(Self {
            rng: worker_rng(options.seed, 0),
            index_name: tenant_index_name(&options.index_prefix, tenant),
            tenant,
            vectors_sent: 0,
            options,
        })
    }

    /// The tenant this instance writes to.
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// Number of documents emitted so far.
    pub fn vectors_sent(&self) -> u64 {
        self.vectors_sent
    }
}

impl ParamSource for TenantBulkParamSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn partition(mut self: Box<Self>, worker_index: usize, worker_count: usize) -> BoxedParamSource {
        let tenant_count = self.options.num_tenants;
        self.tenant = tenant_id(worker_index, tenant_count);
        self.index_name = tenant_index_name(&self.options.index_prefix, self.tenant);
        self.rng = worker_rng(self.options.seed, worker_index);
        log_assignment(Self::NAME, worker_index, worker_count, tenant_count, self.tenant);
        self
    }

    fn params(&mut self) -> Emission {
        let remaining = self
            .options
            .vectors_per_tenant
            .saturating_sub(self.vectors_sent);
        if remaining == 0 {
            return Emission::Exhausted;
        }

        // The last batch shrinks so the tenant never receives more than its volume.
        let batch = remaining.min(self.options.bulk_size as u64) as usize;
        let options = &self.options;
        let records = (0..batch)
            .map(|_| BulkRecord {
                action: BulkAction::Index,
                index: self.index_name.clone(),
                document: Document {
                    partition_id: None,
                    field: options.field.clone(),
                    vector: random_vector(&mut self.rng, options.dims),
                },
            })
            .collect();

        self.vectors_sent += batch as u64;
        if self.vectors_sent >= options.vectors_per_tenant {
            tracing::debug!(
                tenant = %self.tenant,
                vectors_sent = self.vectors_sent,
                "tenant volume reached"
            );
        }

        let request = BulkRequest::new(self.index_name.clone(), records);
        Emission::Emitted(RequestDescriptor::Bulk(request))
    }
}

/// Issues random nearest-neighbor queries against the index of the worker's tenant.
///
/// The request cache is always bypassed and detailed results are always requested.
#[derive(Debug)]
pub struct TenantSearchParamSource {
    options: TenantSearchOptions,
    rng: SmallRng,
    tenant: TenantId,
    index_name: String,
}

impl TenantSearchParamSource {
    /// Registry name of this source.
    pub const NAME: &'static str = "multi-tenant-search-param-source";

    /// Creates the source from raw options. Until partitioned, it targets tenant `0`.
    pub fn new(options: &Options) -> Result<Self> {
        let options = TenantSearchOptions::from_options(options)?;
        tracing::debug!(?options, "created {}", Self::NAME);
        let tenant = TenantId::default();
        Ok(Self {
            rng: worker_rng(options.seed, 0),
            index_name: tenant_index_name(&options.index_prefix, tenant),
            tenant,
            options,
        })
    }

    /// The tenant this instance queries.
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }
}

impl ParamSource for TenantSearchParamSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn partition(mut self: Box<Self>, worker_index: usize, worker_count: usize) -> BoxedParamSource {
        let tenant_count = self.options.num_tenants;
        self.tenant = tenant_id(worker_index, tenant_count);
        self.index_name = tenant_index_name(&self.options.index_prefix, self.tenant);
        self.rng = worker_rng(self.options.seed, worker_index);
        log_assignment(Self::NAME, worker_index, worker_count, tenant_count, self.tenant);
        self
    }

    fn params(&mut self) -> Emission {
        let vector = random_vector(&mut self.rng, self.options.dims);

        Emission::Emitted(RequestDescriptor::Search(SearchRequest {
            index: self.index_name.clone(),
            cache: false,
            size: self.options.k,
            body: knn_query(&self.options.field, vector, self.options.k),
            detailed_results: true,
        }))
    }
}

/// Passes the raw options through to the tenant provisioning runner.
#[derive(Debug)]
pub struct TenantSetupParamSource {
    options: Options,
}

impl TenantSetupParamSource {
    /// Registry name of this source.
    pub const NAME: &'static str = "multi-tenant-setup-param-source";

    /// Creates the source, keeping the options as they are.
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            options: options.clone(),
        })
    }
}

impl ParamSource for TenantSetupParamSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn partition(self: Box<Self>, _worker_index: usize, _worker_count: usize) -> BoxedParamSource {
        self
    }

    fn params(&mut self) -> Emission {
        Emission::Emitted(RequestDescriptor::Setup(self.options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn options(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn bulk(emission: Emission) -> BulkRequest {
        match emission {
            Emission::Emitted(RequestDescriptor::Bulk(request)) => request,
            other => panic!("expected a bulk request, got {other:?}"),
        }
    }

    fn search(emission: Emission) -> SearchRequest {
        match emission {
            Emission::Emitted(RequestDescriptor::Search(request)) => request,
            other => panic!("expected a search request, got {other:?}"),
        }
    }

    #[test]
    fn random_bulk_matches_output_contract() {
        let source = RandomBulkParamSource::new(&options(json!({
            "bulk-size": 5,
            "dims": 4,
            "partitions": 3,
            "index_name": "vectors",
            "field": "emb",
        })))
        .unwrap();
        let mut source = Box::new(source).partition(0, 1);

        let request = bulk(source.params());
        assert_eq!(request.records.len(), 5);
        for record in &request.records {
            assert_eq!(record.action, BulkAction::Create);
            assert_eq!(record.index, "vectors");
            assert!(record.document.partition_id.unwrap() <= 3);
            assert_eq!(record.document.vector.len(), 4);
        }

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["bulk-size"], json!(5));
        assert_eq!(value["action-metadata-present"], json!(true));
        assert_eq!(value["unit"], json!("docs"));
        assert_eq!(value["index"], json!("vectors"));
        assert_eq!(value["type"], json!(""));

        let body = value["body"].as_array().unwrap();
        assert_eq!(body.len(), 10);
        for pair in body.chunks(2) {
            assert_eq!(pair[0], json!({"create": {"_index": "vectors"}}));
            assert_eq!(pair[1]["emb"].as_array().unwrap().len(), 4);
            assert!(pair[1]["partition_id"].is_u64());
        }
    }

    #[test]
    fn random_bulk_never_exhausts() {
        let source = RandomBulkParamSource::new(&options(json!({"bulk-size": 1, "dims": 1})));
        let mut source = Box::new(source.unwrap()).partition(3, 4);
        for _ in 0..1000 {
            assert!(!source.params().is_exhausted());
        }
    }

    #[test]
    fn search_override_keeps_generated_query() {
        let source = RandomSearchParamSource::new(&options(json!({
            "dims": 8,
            "k": 10,
            "field": "emb",
            "body": {"explain": true},
            "cache": true,
        })))
        .unwrap();
        let mut source = Box::new(source).partition(0, 1);

        let request = search(source.params());
        assert_eq!(request.index, DEFAULT_INDEX);
        assert!(request.cache);
        assert_eq!(request.size, 10);
        assert!(!request.detailed_results);
        assert_eq!(request.body["explain"], json!(true));

        let knn = &request.body["query"]["knn"]["emb"];
        assert_eq!(knn["k"], json!(10));
        assert_eq!(knn["vector"].as_array().unwrap().len(), 8);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["detailed-results"], json!(false));
    }

    const DEFAULT_INDEX: &str = crate::options::DEFAULT_INDEX_NAME;

    #[test]
    fn tenant_bulk_stops_at_volume() {
        let source = TenantBulkParamSource::new(&options(json!({
            "vectors_per_tenant": 600,
            "bulk-size": 100,
            "dims": 2,
        })))
        .unwrap();
        let mut source = Box::new(source).partition(5, 8);

        for _ in 0..6 {
            let request = bulk(source.params());
            assert_eq!(request.bulk_size, 100);
            assert_eq!(request.records.len(), 100);
        }
        assert!(source.params().is_exhausted());
        for _ in 0..10 {
            assert!(source.params().is_exhausted());
        }
    }

    #[test]
    fn tenant_bulk_clamps_last_batch() {
        let mut source = TenantBulkParamSource::new(&options(json!({
            "vectors_per_tenant": 250,
            "bulk-size": 100,
            "dims": 2,
        })))
        .unwrap();

        let sizes: Vec<_> = emissions(&mut source)
            .map(|descriptor| match descriptor {
                RequestDescriptor::Bulk(request) => request.bulk_size,
                other => panic!("unexpected {other:?}"),
            })
            .collect();

        assert_eq!(sizes, [100, 100, 50]);
        assert_eq!(source.vectors_sent(), 250);
    }

    #[test]
    fn tenant_bulk_with_zero_volume_is_exhausted() {
        let mut source =
            TenantBulkParamSource::new(&options(json!({"vectors_per_tenant": 0}))).unwrap();
        assert!(source.params().is_exhausted());
    }

    #[test]
    fn tenant_bulk_targets_assigned_tenant() {
        let source = TenantBulkParamSource::new(&options(json!({
            "num_tenants": 4,
            "index_prefix": "tenant",
            "bulk-size": 3,
            "dims": 2,
            "field": "emb",
        })))
        .unwrap();
        let mut source = Box::new(source).partition(6, 8);

        let value = serde_json::to_value(bulk(source.params())).unwrap();
        assert_eq!(value["index"], json!("tenant_2"));

        let body = value["body"].as_array().unwrap();
        assert_eq!(body.len(), 6);
        for pair in body.chunks(2) {
            assert_eq!(pair[0], json!({"index": {"_index": "tenant_2"}}));
            assert!(pair[1].get("partition_id").is_none());
            assert_eq!(pair[1]["emb"].as_array().unwrap().len(), 2);
        }
    }

    #[test]
    fn tenant_search_forces_flags() {
        let source = TenantSearchParamSource::new(&options(json!({
            "num_tenants": 3,
            "cache": true,
            "detailed-results": false,
            "k": 7,
        })))
        .unwrap();
        let mut source = Box::new(source).partition(4, 6);

        let request = search(source.params());
        assert_eq!(request.index, "tenant_index_1");
        assert!(!request.cache);
        assert!(request.detailed_results);
        assert_eq!(request.size, 7);
        let knn = &request.body["query"]["knn"]["target_field"];
        assert_eq!(knn["vector"].as_array().unwrap().len(), 256);
    }

    #[test]
    fn seeded_workers_are_reproducible_and_distinct() {
        let raw = options(json!({"seed": 42, "dims": 4, "num_tenants": 2}));
        let first = |worker| {
            let source = TenantSearchParamSource::new(&raw).unwrap();
            let mut source = Box::new(source).partition(worker, 4);
            search(source.params()).body
        };

        assert_eq!(first(1), first(1));
        assert_ne!(first(1), first(3));
    }

    #[test]
    fn setup_passes_options_through() {
        let raw = options(json!({"num_tenants": 3, "custom": "value"}));
        let source = TenantSetupParamSource::new(&raw).unwrap();
        let mut source = Box::new(source).partition(2, 4);

        for _ in 0..2 {
            match source.params() {
                Emission::Emitted(RequestDescriptor::Setup(options)) => assert_eq!(options, raw),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}

//! String-keyed lookup of parameter sources and runners.

use std::collections::BTreeMap;

use futures_util::future::BoxFuture;

use crate::error::{ProvisionError, Result, WorkloadError};
use crate::options::Options;
use crate::params::{
    BoxedParamSource, ParamSource, RandomBulkParamSource, RandomSearchParamSource,
    TenantBulkParamSource, TenantSearchParamSource, TenantSetupParamSource,
};
use crate::provision::{
    CREATE_INDICES_RUNNER, IndexClient, RequestContext, RunnerResponse, create_tenant_indices,
};

/// Builds a fresh parameter source from raw options.
pub type ParamSourceFactory = fn(&Options) -> Result<BoxedParamSource>;

/// A request execution routine run by the driver with the options of its operation.
pub type Runner = for<'a> fn(
    &'a dyn IndexClient,
    &'a mut dyn RequestContext,
    &'a Options,
) -> BoxFuture<'a, Result<RunnerResponse, ProvisionError>>;

/// Named parameter sources and runners available to a benchmark.
#[derive(Debug, Default)]
pub struct Registry {
    param_sources: BTreeMap<&'static str, ParamSourceFactory>,
    runners: BTreeMap<&'static str, Runner>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with all sources and runners of this crate installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register(&mut registry);
        registry
    }

    /// Registers a parameter source factory, replacing any previous one with the same name.
    pub fn register_param_source(&mut self, name: &'static str, factory: ParamSourceFactory) {
        self.param_sources.insert(name, factory);
    }

    /// Registers a runner, replacing any previous one with the same name.
    pub fn register_runner(&mut self, name: &'static str, runner: Runner) {
        self.runners.insert(name, runner);
    }

    /// Builds a new instance of the named parameter source.
    pub fn param_source(&self, name: &str, options: &Options) -> Result<BoxedParamSource> {
        let factory = self
            .param_sources
            .get(name)
            .ok_or_else(|| WorkloadError::UnknownParamSource(name.to_owned()))?;
        factory(options)
    }

    /// Looks up the named runner.
    pub fn runner(&self, name: &str) -> Result<Runner> {
        self.runners
            .get(name)
            .copied()
            .ok_or_else(|| WorkloadError::UnknownRunner(name.to_owned()))
    }

    /// Names of all registered parameter sources, in sorted order.
    pub fn param_source_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.param_sources.keys().copied()
    }

    /// Names of all registered runners, in sorted order.
    pub fn runner_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.runners.keys().copied()
    }
}

fn boxed<S: ParamSource + 'static>(source: Result<S>) -> Result<BoxedParamSource> {
    Ok(Box::new(source?))
}

fn create_indices<'a>(
    client: &'a dyn IndexClient,
    context: &'a mut dyn RequestContext,
    options: &'a Options,
) -> BoxFuture<'a, Result<RunnerResponse, ProvisionError>> {
    Box::pin(create_tenant_indices(client, context, options))
}

/// Installs the five parameter sources and the index provisioning runner.
pub fn register(registry: &mut Registry) {
    registry.register_param_source(RandomBulkParamSource::NAME, |options| {
        boxed(RandomBulkParamSource::new(options))
    });
    registry.register_param_source(RandomSearchParamSource::NAME, |options| {
        boxed(RandomSearchParamSource::new(options))
    });
    registry.register_param_source(TenantBulkParamSource::NAME, |options| {
        boxed(TenantBulkParamSource::new(options))
    });
    registry.register_param_source(TenantSearchParamSource::NAME, |options| {
        boxed(TenantSearchParamSource::new(options))
    });
    registry.register_param_source(TenantSetupParamSource::NAME, |options| {
        boxed(TenantSetupParamSource::new(options))
    });
    registry.register_runner(CREATE_INDICES_RUNNER, create_indices);
}

//! Maps workers onto tenants.
//!
//! Every worker resolves its tenant on its own from `(worker_index, tenant_count)`. No
//! coordination between workers is needed: any `tenant_count` consecutive worker indices cover
//! every tenant exactly once.

use std::fmt;

/// Identity of a tenant, in `0..tenant_count`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TenantId(pub usize);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves the tenant owned by the given worker.
///
/// # Panics
///
/// Panics if `tenant_count` is zero. Parameter sources validate this at construction.
pub fn tenant_id(worker_index: usize, tenant_count: usize) -> TenantId {
    TenantId(worker_index % tenant_count)
}

/// Name of the index backing a tenant, `{prefix}_{tenant}`.
pub fn tenant_index_name(prefix: &str, tenant: TenantId) -> String {
    format!("{prefix}_{tenant}")
}

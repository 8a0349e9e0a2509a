//! Tenant providers: where the current tenant id comes from.

use std::sync::Arc;

use super::context::TenantId;
use super::model::TenantTable;
use crate::error::QueryResult;

/// Yields the tenant id for the active unit of work.
pub trait TenantProvider: Send + Sync {
    /// Resolve the current tenant id.
    fn tenant_id(&self) -> QueryResult<TenantId>;
}

impl<F> TenantProvider for F
where
    F: Fn() -> QueryResult<TenantId> + Send + Sync,
{
    fn tenant_id(&self) -> QueryResult<TenantId> {
        self()
    }
}

/// A provider that always returns the same tenant.
#[derive(Debug, Clone, Copy)]
pub struct StaticProvider {
    id: TenantId,
}

impl StaticProvider {
    /// Create a provider for a fixed tenant.
    pub fn new(id: impl Into<TenantId>) -> Self {
        Self { id: id.into() }
    }
}

impl TenantProvider for StaticProvider {
    fn tenant_id(&self) -> QueryResult<TenantId> {
        Ok(self.id)
    }
}

/// A provider that maps the request host to a tenant.
///
/// Unknown hosts resolve to [`TenantId::unknown`], which matches no rows.
#[derive(Debug, Clone)]
pub struct HostProvider {
    host: String,
    tenants: Arc<TenantTable>,
}

impl HostProvider {
    /// Create a provider for a request host.
    pub fn new(host: impl Into<String>, tenants: Arc<TenantTable>) -> Self {
        Self {
            host: host.into(),
            tenants,
        }
    }

    /// The host this provider resolves.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl TenantProvider for HostProvider {
    fn tenant_id(&self) -> QueryResult<TenantId> {
        let id = self.tenants.tenant_id_for_host(&self.host);
        if id.is_unknown() {
            tracing::warn!(host = %self.host, "no tenant registered for host");
        }
        Ok(id)
    }
}

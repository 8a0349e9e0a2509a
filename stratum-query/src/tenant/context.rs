//! Tenant identity and the per-unit-of-work tenant context.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::provider::TenantProvider;
use crate::error::QueryResult;
use crate::filter::FilterValue;

/// A unique identifier for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TenantId(i32);

impl TenantId {
    /// Create a new tenant ID.
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// The id used when no tenant matches (e.g. an unknown host).
    pub const fn unknown() -> Self {
        Self(0)
    }

    /// Get the raw integer id.
    pub const fn get(&self) -> i32 {
        self.0
    }

    /// Whether this is the unknown-tenant id.
    pub const fn is_unknown(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for TenantId {
    fn from(i: i32) -> Self {
        Self::new(i)
    }
}

impl From<TenantId> for FilterValue {
    fn from(id: TenantId) -> Self {
        FilterValue::Int(id.0 as i64)
    }
}

/// Context for the current tenant.
///
/// Wraps a [`TenantProvider`] and resolves the id at most once; every later call
/// returns the cached id. One context belongs to one schema instance, so the
/// filter captured at model-build time and the id reported here always agree.
#[derive(Clone)]
pub struct TenantContext {
    provider: Arc<dyn TenantProvider>,
    resolved: Arc<OnceLock<TenantId>>,
}

impl TenantContext {
    /// Create a context backed by a provider.
    pub fn new<P: TenantProvider + 'static>(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Create a context from a shared provider.
    pub fn from_arc(provider: Arc<dyn TenantProvider>) -> Self {
        Self {
            provider,
            resolved: Arc::new(OnceLock::new()),
        }
    }

    /// Create a context for a fixed tenant id.
    pub fn fixed(id: impl Into<TenantId>) -> Self {
        Self::new(super::provider::StaticProvider::new(id))
    }

    /// Resolve the current tenant id, consulting the provider only the first time.
    pub fn tenant_id(&self) -> QueryResult<TenantId> {
        if let Some(id) = self.resolved.get() {
            return Ok(*id);
        }
        let id = self.provider.tenant_id()?;
        tracing::debug!(tenant_id = %id, "resolved tenant for unit of work");
        Ok(*self.resolved.get_or_init(|| id))
    }

    /// Whether the id has already been resolved.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("resolved", &self.resolved.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl TenantProvider for CountingProvider {
        fn tenant_id(&self) -> QueryResult<TenantId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TenantId::new(7))
        }
    }

    struct FailingProvider;

    impl TenantProvider for FailingProvider {
        fn tenant_id(&self) -> QueryResult<TenantId> {
            Err(QueryError::tenant_not_resolved("no request host"))
        }
    }

    #[test]
    fn test_tenant_id() {
        let id: TenantId = 3.into();
        assert_eq!(id.get(), 3);
        assert_eq!(id.to_string(), "3");
        assert!(TenantId::unknown().is_unknown());
        assert_eq!(FilterValue::from(id), FilterValue::Int(3));
    }

    #[test]
    fn test_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = TenantContext::new(CountingProvider { calls: calls.clone() });
        assert!(!ctx.is_resolved());

        assert_eq!(ctx.tenant_id().unwrap(), TenantId::new(7));
        assert_eq!(ctx.tenant_id().unwrap(), TenantId::new(7));
        assert_eq!(ctx.clone().tenant_id().unwrap(), TenantId::new(7));

        assert!(ctx.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let ctx = TenantContext::new(FailingProvider);
        assert!(ctx.tenant_id().is_err());
        assert!(!ctx.is_resolved());
    }
}

//! Multi-tenant support.
//!
//! All tenants share tables; each row carries a `TenantId` column. The current
//! tenant is resolved once per schema instance through a [`TenantContext`] and
//! captured into the standing query filter of every view mapping (see
//! [`crate::model::ModelConfigurator`]).
//!
//! ```rust
//! use std::sync::Arc;
//! use stratum_query::tenant::{HostProvider, TenantContext, TenantId, TenantTable};
//!
//! let tenants = Arc::new(TenantTable::with_defaults());
//! let ctx = TenantContext::new(HostProvider::new("localhost:44307", tenants));
//! assert_eq!(ctx.tenant_id().unwrap(), TenantId::new(1));
//! ```

mod context;
mod model;
mod provider;

pub use context::{TenantContext, TenantId};
pub use model::{DEFAULT_TENANT_NAME, TENANT_ENTITY, Tenant, TenantTable};
pub use provider::{HostProvider, StaticProvider, TenantProvider};

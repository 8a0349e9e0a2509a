//! # stratum-query
//!
//! Tenant-scoped view mapping and stored-routine statement composition.
//!
//! This crate provides:
//! - An explicit registry of view entities and database functions
//! - A one-time model configurator that maps views with a standing tenant filter
//! - Filtered view queries that cannot escape that filter
//! - SQL composition for stored procedures, scalar functions, and table functions
//! - An async executor seam for dispatching composed commands
//!
//! ## Tenant-scoped views
//!
//! ```rust
//! use std::borrow::Cow;
//! use std::sync::Arc;
//! use stratum_query::prelude::*;
//!
//! #[derive(Default)]
//! struct InvoiceView;
//!
//! impl ViewEntity for InvoiceView {
//!     fn view_name(&self) -> Cow<'static, str> {
//!         "vw_Invoices".into()
//!     }
//! }
//!
//! let registry = Arc::new(EntityRegistry::new().view::<InvoiceView>());
//! let configurator = ModelConfigurator::new(registry, TenantContext::fixed(2));
//!
//! let mut builder = ModelBuilder::new();
//! configurator.on_model_creating(&mut builder)?;
//! let model = builder.build()?;
//!
//! let (sql, params) = model.query("InvoiceView")?.take(10).build_sql();
//! assert_eq!(sql, "SELECT TOP (10) * FROM vw_Invoices WHERE TenantId = @P1");
//! assert_eq!(params, vec![FilterValue::Int(2)]);
//! # Ok::<(), QueryError>(())
//! ```
//!
//! ## Stored routines
//!
//! ```rust
//! use stratum_query::prelude::*;
//!
//! let stmt = compose_without_model(InvocationKind::ScalarFunction, "Fn1");
//! assert_eq!(stmt.sql, "SELECT Fn1()");
//!
//! let params = [SqlParameter::input("@A", 1), SqlParameter::input("B", 2)];
//! assert_eq!(
//!     compose_sql(InvocationKind::TableFunction, "Fn2", &params),
//!     "SELECT * FROM Fn2( @A, @B)"
//! );
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod logging;
pub mod model;
pub mod procedure;
pub mod sql;
pub mod tenant;

pub use config::{DatabaseConfig, DebugConfig, StratumConfig, TenancyConfig};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult};
pub use executor::{CommandExecutor, StoredRoutines};
pub use filter::{Filter, FilterValue, Row};
pub use logging::{LogFormat, LogSettings, init as init_logging, init_from_config, is_debug_enabled};
pub use model::{
    ConnectionOptions, DbFunctionSignature, EntityQuery, EntityRegistry, InitState, MappingModel,
    ModelBuilder, ModelConfigurator, ViewEntity,
};
pub use procedure::{
    ComposedStatement, DbCommand, InvocationKind, ParameterAttribute, ParameterDirection,
    ParameterModel, SqlParameter, attach_parameters, compose, compose_sql, compose_without_model,
};
pub use sql::DatabaseType;
pub use tenant::{HostProvider, StaticProvider, Tenant, TenantContext, TenantId, TenantProvider, TenantTable};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::{CommandExecutor, StoredRoutines};
    pub use crate::filter::{Filter, FilterValue, Row};
    pub use crate::model::{
        DbFunctionSignature, EntityRegistry, InitState, MappingModel, ModelBuilder,
        ModelConfigurator, ViewEntity,
    };
    pub use crate::procedure::{
        ComposedStatement, DbCommand, InvocationKind, ParameterAttribute, ParameterDirection,
        ParameterModel, SqlParameter, attach_parameters, compose, compose_sql,
        compose_without_model,
    };
    pub use crate::tenant::{TenantContext, TenantId, TenantProvider};
}

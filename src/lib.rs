//! # Stratum
//!
//! Tenant-scoped view mapping and stored-routine composition for SQL databases.
//!
//! Stratum provides:
//! - One-time model configuration that maps read-only views under a tenant filter
//! - View queries that always carry that filter
//! - SQL composition for stored procedures, scalar functions, and table functions
//! - `stratum.toml` configuration and `tracing`-based logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratum::prelude::*;
//!
//! let config = StratumConfig::from_file("stratum.toml")?;
//! stratum::init_from_config(&config.debug);
//!
//! let registry = Arc::new(EntityRegistry::new().view::<OrderSummary>());
//! let configurator = config.configurator(registry, config.default_tenant()?);
//!
//! let mut builder = config.model_builder();
//! configurator.on_model_creating(&mut builder)?;
//! let model = builder.build()?;
//!
//! let routines = StoredRoutines::new(executor);
//! let rows = routines.query_table_function("GetOrders", Some(&args)).await?;
//! ```

pub use stratum_query::*;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use stratum_query::prelude::*;
    pub use stratum_query::{StratumConfig, TenantTable};
}

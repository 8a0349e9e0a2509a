//! Tenant-scoping model configurator.
//!
//! Hooks into schema construction twice: once to configure the connection and once
//! to configure the mapping model. Each hook runs at most once per [`InitState`].
//!
//! ```rust
//! use std::borrow::Cow;
//! use std::sync::Arc;
//! use stratum_query::model::{EntityRegistry, ModelBuilder, ModelConfigurator, ViewEntity};
//! use stratum_query::tenant::TenantContext;
//!
//! #[derive(Default)]
//! struct OrderSummary;
//!
//! impl ViewEntity for OrderSummary {
//!     fn view_name(&self) -> Cow<'static, str> {
//!         "vw_OrderSummary".into()
//!     }
//! }
//!
//! let registry = Arc::new(EntityRegistry::new().view::<OrderSummary>());
//! let configurator = ModelConfigurator::new(registry, TenantContext::fixed(1));
//!
//! let mut builder = ModelBuilder::new();
//! assert!(configurator.on_model_creating(&mut builder).unwrap());
//! assert!(!configurator.on_model_creating(&mut builder).unwrap());
//!
//! let model = builder.build().unwrap();
//! let (sql, _) = model.query("OrderSummary").unwrap().build_sql();
//! assert_eq!(sql, "SELECT * FROM vw_OrderSummary WHERE TenantId = @P1");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::builder::ModelBuilder;
use super::registry::EntityRegistry;
use crate::config::{DatabaseConfig, TenancyConfig};
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::sql::DatabaseType;
use crate::tenant::{TENANT_ENTITY, Tenant, TenantContext, TenantId};

/// One-time initialization flags for a schema instance.
///
/// Share one `InitState` between every configurator that must not repeat work.
#[derive(Debug, Default)]
pub struct InitState {
    configuring: AtomicBool,
    model_creating: AtomicBool,
}

impl InitState {
    /// Create fresh flags.
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(flag: &AtomicBool) -> bool {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the connection-configuration step. Only the first caller gets `true`.
    pub fn claim_configuring(&self) -> bool {
        Self::claim(&self.configuring)
    }

    /// Claim the model-creation step. Only the first caller gets `true`.
    pub fn claim_model_creating(&self) -> bool {
        Self::claim(&self.model_creating)
    }

    /// Whether connection configuration has run.
    pub fn is_configured(&self) -> bool {
        self.configuring.load(Ordering::Acquire)
    }

    /// Whether model creation has run.
    pub fn is_model_created(&self) -> bool {
        self.model_creating.load(Ordering::Acquire)
    }
}

/// Connection settings handed to the configure-connection hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Database dialect.
    pub provider: Option<DatabaseType>,
    /// Connection string.
    pub connection_string: Option<String>,
}

impl ConnectionOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: DatabaseType) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the connection string.
    pub fn with_connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection_string = Some(url.into());
        self
    }
}

/// The standing filter for a tenant: `column == tenant_id`.
pub fn tenant_filter(column: &str, tenant_id: TenantId) -> Filter {
    Filter::equals(column, tenant_id)
}

/// Configures the mapping model for one tenant-scoped schema instance.
#[derive(Debug, Clone)]
pub struct ModelConfigurator {
    registry: Arc<EntityRegistry>,
    tenant: TenantContext,
    state: Arc<InitState>,
    tenancy: TenancyConfig,
    database: DatabaseConfig,
}

impl ModelConfigurator {
    /// Create a configurator with its own initialization state.
    pub fn new(registry: Arc<EntityRegistry>, tenant: TenantContext) -> Self {
        Self {
            registry,
            tenant,
            state: Arc::new(InitState::new()),
            tenancy: TenancyConfig::default(),
            database: DatabaseConfig::default(),
        }
    }

    /// Use shared initialization state.
    pub fn with_state(mut self, state: Arc<InitState>) -> Self {
        self.state = state;
        self
    }

    /// Use tenancy settings.
    pub fn with_tenancy(mut self, tenancy: TenancyConfig) -> Self {
        self.tenancy = tenancy;
        self
    }

    /// Use database settings for the connection hook.
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    /// The initialization state.
    pub fn state(&self) -> &Arc<InitState> {
        &self.state
    }

    /// The tenant context this schema instance is bound to.
    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    /// Configure-connection hook.
    ///
    /// Fills unset options from the database settings. Returns `false` without
    /// touching `options` when the hook already ran.
    pub fn on_configuring(&self, options: &mut ConnectionOptions) -> bool {
        if !self.state.claim_configuring() {
            debug!("connection already configured; skipping");
            return false;
        }

        if options.provider.is_none() {
            options.provider = Some(self.database.provider);
        }
        if options.connection_string.is_none() {
            options.connection_string = self.database.url.clone();
        }

        debug!(provider = ?options.provider, "connection configured");
        true
    }

    /// Configure-model hook.
    ///
    /// Seeds the tenant table, maps every registered view with the tenant filter, and
    /// binds every registrable function. Returns `Ok(false)` when the hook already
    /// ran. Errors are fatal: the model must not be used after a failure.
    pub fn on_model_creating(&self, builder: &mut ModelBuilder) -> QueryResult<bool> {
        if !self.state.claim_model_creating() {
            debug!("model already created; skipping");
            return Ok(false);
        }

        self.check_reserved_entities()?;

        if self.tenancy.seed_defaults {
            builder
                .entity(TENANT_ENTITY)
                .has_key("Id")
                .has_data(Tenant::defaults().iter().map(Tenant::to_row));
        }

        self.configure_views_and_functions(builder)?;
        Ok(true)
    }

    fn check_reserved_entities(&self) -> QueryResult<()> {
        if !self.tenancy.seed_defaults {
            return Ok(());
        }
        match self.registry.views().iter().find(|v| v.entity() == TENANT_ENTITY) {
            Some(view) => Err(QueryError::configuration(format!(
                "view entity '{}' collides with the seeded tenant table",
                view.entity()
            ))
            .with_entity(view.entity())
            .with_suggestion("Rename the view entity or disable tenancy.seed_defaults")),
            None => Ok(()),
        }
    }

    fn configure_views_and_functions(&self, builder: &mut ModelBuilder) -> QueryResult<()> {
        let views = self.registry.views();
        let functions: Vec<_> = self
            .registry
            .functions()
            .iter()
            .filter(|f| {
                if !f.is_registrable() {
                    debug!(function = %f, "skipping function on instantiable container");
                }
                f.is_registrable()
            })
            .collect();

        if views.is_empty() && functions.is_empty() {
            debug!("no views or database functions registered");
            return Ok(());
        }

        self.registry.validate()?;

        if !views.is_empty() {
            let tenant_id = self.tenant.tenant_id()?;
            let scope = tenant_filter(&self.tenancy.column, tenant_id);

            for view in views {
                let instance = view.instantiate().map_err(|e| {
                    QueryError::configuration(format!(
                        "cannot instantiate view entity '{}'",
                        view.entity()
                    ))
                    .with_entity(view.entity())
                    .with_source(e)
                })?;

                let view_name = instance.view_name();
                debug!(
                    entity = view.entity(),
                    view = %view_name,
                    tenant_id = %tenant_id,
                    "mapping view"
                );

                builder
                    .entity(view.entity())
                    .has_no_key()
                    .to_view(view_name)
                    .scope_to_tenant(scope.clone());
            }
        }

        for function in &functions {
            builder.has_db_function((*function).clone());
        }

        info!(
            views = views.len(),
            functions = functions.len(),
            "tenant-scoped model configured"
        );
        Ok(())
    }
}

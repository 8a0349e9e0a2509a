//! Configuration file parsing for `stratum.toml`.
//!
//! ```toml
//! [database]
//! provider = "mssql"
//! url = "${DATABASE_URL}"
//!
//! [tenancy]
//! column = "TenantId"
//! default_tenant_id = 1
//! seed_defaults = true
//!
//! [debug]
//! enabled = false
//! log_level = "info"
//! log_format = "compact"
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::executor::{CommandExecutor, StoredRoutines};
use crate::logging::LogFormat;
use crate::model::{EntityRegistry, ModelBuilder, ModelConfigurator};
use crate::sql::DatabaseType;
use crate::tenant::TenantContext;

/// Main configuration structure for `stratum.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StratumConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Tenant scoping.
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,
}

impl StratumConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("cannot read {}", path.display())).with_source(e)
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}` references.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> QueryResult<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self = toml::from_str(&expanded).map_err(|e| {
            QueryError::configuration("invalid stratum.toml").with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> QueryResult<()> {
        if self.tenancy.column.trim().is_empty() {
            return Err(QueryError::configuration("tenancy.column must not be empty")
                .with_field("tenancy.column"));
        }
        if let Some(id) = self.tenancy.default_tenant_id {
            if id <= 0 {
                return Err(QueryError::configuration(format!(
                    "tenancy.default_tenant_id must be positive, got {}",
                    id
                ))
                .with_field("tenancy.default_tenant_id"));
            }
        }
        Ok(())
    }

    /// Get the database URL.
    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }

    /// A tenant context bound to the configured default tenant.
    pub fn default_tenant(&self) -> QueryResult<TenantContext> {
        self.tenancy
            .default_tenant_id
            .map(TenantContext::fixed)
            .ok_or_else(|| QueryError::missing_configuration("tenancy.default_tenant_id"))
    }

    /// A model builder for the configured dialect.
    pub fn model_builder(&self) -> ModelBuilder {
        ModelBuilder::new().with_db_type(self.database.provider)
    }

    /// Stored routine dispatch for the configured dialect.
    pub fn stored_routines<E: CommandExecutor>(&self, executor: E) -> StoredRoutines<E> {
        StoredRoutines::new(executor).with_db_type(self.database.provider)
    }

    /// A configurator using these settings.
    pub fn configurator(
        &self,
        registry: Arc<EntityRegistry>,
        tenant: TenantContext,
    ) -> ModelConfigurator {
        ModelConfigurator::new(registry, tenant)
            .with_tenancy(self.tenancy.clone())
            .with_database(self.database.clone())
    }
}

/// Database configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database dialect.
    #[serde(default)]
    pub provider: DatabaseType,

    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,
}

/// Tenant scoping configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TenancyConfig {
    /// Column the tenant filter compares against.
    #[serde(default = "default_tenant_column")]
    pub column: String,

    /// Tenant used when no provider is supplied.
    #[serde(default)]
    pub default_tenant_id: Option<i32>,

    /// Seed the default tenant rows at model creation.
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            column: default_tenant_column(),
            default_tenant_id: None,
            seed_defaults: true,
        }
    }
}

fn default_tenant_column() -> String {
    "TenantId".to_string()
}

fn default_true() -> bool {
    true
}

/// Debug/logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Enable debug logging.
    #[serde(default)]
    pub enabled: bool,

    /// Log level override.
    #[serde(default)]
    pub log_level: Option<String>,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Replace `${VAR}` with the variable's value. Unset variables are left as written.
fn expand_env_vars(content: &str) -> QueryResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| QueryError::internal("env var pattern").with_source(e))?;

    Ok(re
        .replace_all(content, |caps: &regex_lite::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned())
}

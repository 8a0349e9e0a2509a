//! Error types for model configuration and statement composition.
//!
//! Every fallible operation in this crate returns [`QueryResult`]. Errors carry:
//! - An error code for programmatic handling
//! - Context about what was being configured or composed
//! - Optional suggestions and help text
//!
//! # Error Codes
//!
//! Error codes follow a pattern: P{category}{number}
//! - 1xxx: Query errors (unknown entity)
//! - 5xxx: Execution errors (parameters, driver failures)
//! - 7xxx: Configuration errors
//! - 8xxx: Tenant errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use stratum_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::configuration("view factory failed");
//! assert_eq!(err.code, ErrorCode::InvalidConfiguration);
//! assert_eq!(err.code.code(), "P7001");
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for stratum operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Query errors (1xxx)
    /// Entity is not mapped in the model (P1006).
    UnknownEntity = 1006,

    // Execution errors (5xxx)
    /// Invalid parameter (P5003).
    InvalidParameter = 5003,
    /// General database error (P5005).
    DatabaseError = 5005,

    // Configuration errors (7xxx)
    /// Invalid configuration (P7001).
    InvalidConfiguration = 7001,
    /// Missing configuration (P7002).
    MissingConfiguration = 7002,

    // Tenant errors (8xxx)
    /// The current tenant could not be resolved (P8001).
    TenantNotResolved = 8001,

    // Internal errors (9xxx)
    /// Internal error (P9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "P1006").
    pub fn code(&self) -> String {
        format!("P{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownEntity => "Entity is not mapped",
            Self::InvalidParameter => "Invalid parameter",
            Self::DatabaseError => "Database error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::MissingConfiguration => "Missing configuration",
            Self::TenantNotResolved => "Tenant could not be resolved",
            Self::Internal => "Internal error",
        }
    }

    /// Whether errors with this code are raised while building the model.
    ///
    /// These abort schema initialization rather than a single query.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration | Self::MissingConfiguration | Self::TenantNotResolved
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity or view involved.
    pub entity: Option<String>,
    /// The parameter or column involved.
    pub field: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while configuring the model or composing statements.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an error for an entity that was never mapped.
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::UnknownEntity,
            format!("Entity '{}' is not mapped in the model", entity),
        )
        .with_entity(&entity)
        .with_suggestion(format!("Register '{}' in the EntityRegistry before building", entity))
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid input for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create a configuration error.
    ///
    /// Configuration errors are unrecoverable: they abort model creation.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Model configuration failed: {}", message.into()),
        )
        .with_help("Model configuration runs once at startup; fix the registration and restart")
    }

    /// Create a missing configuration error.
    pub fn missing_configuration(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::MissingConfiguration,
            format!("Missing configuration value '{}'", key),
        )
        .with_field(&key)
    }

    /// Create a tenant resolution error.
    pub fn tenant_not_resolved(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TenantNotResolved, message.into())
            .with_suggestion("Check the tenant provider attached to this schema instance")
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
            .with_suggestion("Check the database logs for more details")
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidConfiguration | ErrorCode::MissingConfiguration
        )
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  → Entity: {}\n", entity));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref sql) = self.context.sql {
            output.push_str(&format!("  → SQL: {}\n", sql));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UnknownEntity.code(), "P1006");
        assert_eq!(ErrorCode::InvalidParameter.code(), "P5003");
        assert_eq!(ErrorCode::InvalidConfiguration.code(), "P7001");
        assert_eq!(ErrorCode::TenantNotResolved.code(), "P8001");
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err = QueryError::configuration("factory for 'OrderSummary' failed");
        assert!(err.is_configuration_error());
        assert!(err.code.is_startup_fatal());
        assert!(err.message.contains("OrderSummary"));
        assert!(err.context.help.is_some());
    }

    #[test]
    fn test_unknown_entity() {
        let err = QueryError::unknown_entity("Invoices");
        assert_eq!(err.code, ErrorCode::UnknownEntity);
        assert_eq!(err.context.entity.as_deref(), Some("Invoices"));
        assert!(!err.code.is_startup_fatal());
    }

    #[test]
    fn test_display() {
        let err = QueryError::invalid_input("model", "expected a struct");
        assert_eq!(err.to_string(), "[P5003] Invalid input for model: expected a struct");
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::unknown_entity("Invoices").with_context("Building view query");

        let output = err.display_full();
        assert!(output.contains("P1006"));
        assert!(output.contains("While: Building view query"));
        assert!(output.contains("Suggestions"));
    }

    #[test]
    fn test_error_macro() {
        let err = query_error!(
            ErrorCode::InvalidParameter,
            "Parameter name is empty",
            with_field = "name",
            with_suggestion = "Give every parameter a name"
        );

        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert_eq!(err.context.field, Some("name".to_string()));
        assert_eq!(err.context.suggestions.len(), 1);
    }
}

//! Dispatching composed routine invocations to a database driver.

use std::sync::Arc;

use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::filter::{FilterValue, Row};
use crate::procedure::{
    DbCommand, InvocationKind, ParameterModel, SqlParameter, attach_parameters, compose,
    compose_sql,
};
use crate::sql::DatabaseType;

/// Runs commands against a database.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and return the number of affected rows.
    async fn execute(&self, command: &DbCommand) -> QueryResult<u64>;

    /// Execute a command and return its rows.
    async fn query(&self, command: &DbCommand) -> QueryResult<Vec<Row>>;
}

#[async_trait::async_trait]
impl<E: CommandExecutor + ?Sized> CommandExecutor for Arc<E> {
    async fn execute(&self, command: &DbCommand) -> QueryResult<u64> {
        (**self).execute(command).await
    }

    async fn query(&self, command: &DbCommand) -> QueryResult<Vec<Row>> {
        (**self).query(command).await
    }
}

/// Invokes stored procedures and database functions through an executor.
///
/// Procedure invocations are refused up front on dialects without stored
/// procedures.
///
/// ```rust,ignore
/// let routines = StoredRoutines::new(executor);
/// let rows = routines
///     .query_table_function("GetOrders", Some(&OrdersArgs { customer_id: 7 }))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct StoredRoutines<E: CommandExecutor> {
    executor: E,
    db_type: DatabaseType,
}

impl<E: CommandExecutor> StoredRoutines<E> {
    /// Wrap an executor for the default dialect.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            db_type: DatabaseType::default(),
        }
    }

    /// Set the database dialect.
    pub fn with_db_type(mut self, db_type: DatabaseType) -> Self {
        self.db_type = db_type;
        self
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The database dialect.
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    fn check_kind(&self, kind: InvocationKind) -> QueryResult<()> {
        if kind == InvocationKind::Procedure && !self.db_type.supports_procedures() {
            return Err(QueryError::invalid_input(
                "invocation kind",
                format!("{:?} does not support stored procedures", self.db_type),
            )
            .with_suggestion("Call a function instead, or target a dialect with procedures"));
        }
        Ok(())
    }

    /// Build the command for an invocation.
    pub fn command<M: ParameterModel + ?Sized>(
        &self,
        kind: InvocationKind,
        name: &str,
        model: Option<&M>,
    ) -> QueryResult<DbCommand> {
        self.check_kind(kind)?;
        Ok(DbCommand::from(compose(kind, name, model)?))
    }

    /// Execute a stored procedure. Returns the number of affected rows.
    pub async fn execute_procedure<M: ParameterModel + ?Sized>(
        &self,
        name: &str,
        model: Option<&M>,
    ) -> QueryResult<u64> {
        let command = self.command(InvocationKind::Procedure, name, model)?;
        self.executor
            .execute(&command)
            .await
            .map_err(|e| e.with_context(format!("execute procedure {}", name)))
    }

    /// Query a table-valued function.
    pub async fn query_table_function<M: ParameterModel + ?Sized>(
        &self,
        name: &str,
        model: Option<&M>,
    ) -> QueryResult<Vec<Row>> {
        let command = self.command(InvocationKind::TableFunction, name, model)?;
        self.executor
            .query(&command)
            .await
            .map_err(|e| e.with_context(format!("query table function {}", name)))
    }

    /// Query a scalar function.
    ///
    /// Returns the first column of the first row, or null when no row comes back.
    pub async fn query_scalar_function<M: ParameterModel + ?Sized>(
        &self,
        name: &str,
        model: Option<&M>,
    ) -> QueryResult<FilterValue> {
        let command = self.command(InvocationKind::ScalarFunction, name, model)?;
        let rows = self
            .executor
            .query(&command)
            .await
            .map_err(|e| e.with_context(format!("query scalar function {}", name)))?;

        if rows.len() > 1 {
            return Err(QueryError::database(format!(
                "scalar function {} returned {} rows",
                name,
                rows.len()
            ))
            .with_sql(&command.sql));
        }

        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .unwrap_or_default())
    }

    /// Execute an invocation with pre-built parameters.
    pub async fn execute_sql(
        &self,
        kind: InvocationKind,
        name: &str,
        parameters: Vec<SqlParameter>,
    ) -> QueryResult<u64> {
        let command = self.raw_command(kind, name, parameters)?;
        self.executor.execute(&command).await
    }

    /// Query an invocation with pre-built parameters.
    pub async fn query_sql(
        &self,
        kind: InvocationKind,
        name: &str,
        parameters: Vec<SqlParameter>,
    ) -> QueryResult<Vec<Row>> {
        let command = self.raw_command(kind, name, parameters)?;
        self.executor.query(&command).await
    }

    fn raw_command(
        &self,
        kind: InvocationKind,
        name: &str,
        parameters: Vec<SqlParameter>,
    ) -> QueryResult<DbCommand> {
        self.check_kind(kind)?;
        let mut command = DbCommand::new(compose_sql(kind, name, &parameters));
        attach_parameters(&mut command, parameters);
        debug!(sql = %command.sql, params = command.parameters.len(), "built raw routine command");
        Ok(command)
    }
}

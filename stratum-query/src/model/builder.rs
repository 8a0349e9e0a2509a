//! The mapping builder and the immutable model it produces.

use indexmap::IndexMap;

use super::registry::DbFunctionSignature;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterValue, Row};
use crate::sql::DatabaseType;

/// Mapping of a single entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMapping {
    /// Entity name.
    pub name: String,
    /// Primary key column, if any.
    pub key: Option<String>,
    /// Whether the entity was declared key-less.
    pub keyless: bool,
    /// View the entity reads from; `None` means a table named after the entity.
    pub view: Option<String>,
    /// Tenant scope set by the model configurator. Always intersected and never
    /// replaced by [`EntityTypeBuilder::has_query_filter`].
    pub tenant_filter: Filter,
    /// Standing filter intersected with every query against this entity.
    pub query_filter: Filter,
    /// Seed rows inserted at schema creation.
    pub seed: Vec<Row>,
}

impl EntityMapping {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Whether the entity is mapped to a view (and therefore read-only).
    pub fn is_view(&self) -> bool {
        self.view.is_some()
    }

    /// Whether the mapping carries a tenant scope.
    pub fn is_tenant_scoped(&self) -> bool {
        !self.tenant_filter.is_none()
    }

    /// Tenant scope and standing filter combined.
    pub fn standing_filter(&self) -> Filter {
        self.tenant_filter.clone().and_then(self.query_filter.clone())
    }

    /// The relation queries select from.
    pub fn source(&self) -> &str {
        self.view.as_deref().unwrap_or(&self.name)
    }
}

/// Collects entity mappings and function bindings while the model is built.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    db_type: DatabaseType,
    entities: IndexMap<String, EntityMapping>,
    functions: IndexMap<String, DbFunctionSignature>,
}

impl ModelBuilder {
    /// Create a builder for the default dialect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dialect used to render view queries.
    pub fn with_db_type(mut self, db_type: DatabaseType) -> Self {
        self.db_type = db_type;
        self
    }

    /// Get or add the mapping for an entity.
    pub fn entity(&mut self, name: &str) -> EntityTypeBuilder<'_> {
        let mapping = self
            .entities
            .entry(name.to_string())
            .or_insert_with(|| EntityMapping::new(name));
        EntityTypeBuilder { mapping }
    }

    /// Bind a database function.
    pub fn has_db_function(&mut self, signature: DbFunctionSignature) -> &mut Self {
        tracing::debug!(function = %signature, "registering database function");
        self.functions.insert(signature.qualified_name(), signature);
        self
    }

    /// Number of mapped entities so far.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Validate and freeze the model.
    pub fn build(self) -> QueryResult<MappingModel> {
        for mapping in self.entities.values() {
            if !mapping.seed.is_empty() && mapping.key.is_none() {
                return Err(QueryError::configuration(format!(
                    "entity '{}' has seed data but no key",
                    mapping.name
                ))
                .with_entity(&mapping.name));
            }
            if mapping.keyless && mapping.key.is_some() {
                return Err(QueryError::configuration(format!(
                    "entity '{}' is declared both key-less and keyed",
                    mapping.name
                ))
                .with_entity(&mapping.name));
            }
        }

        Ok(MappingModel {
            db_type: self.db_type,
            entities: self.entities,
            functions: self.functions,
        })
    }
}

/// Fluent configuration of one entity.
pub struct EntityTypeBuilder<'a> {
    mapping: &'a mut EntityMapping,
}

impl EntityTypeBuilder<'_> {
    /// Declare the entity key-less.
    pub fn has_no_key(self) -> Self {
        self.mapping.keyless = true;
        self.mapping.key = None;
        self
    }

    /// Set the primary key column.
    pub fn has_key(self, column: impl Into<String>) -> Self {
        self.mapping.key = Some(column.into());
        self.mapping.keyless = false;
        self
    }

    /// Map the entity to a database view.
    pub fn to_view(self, view: impl Into<String>) -> Self {
        self.mapping.view = Some(view.into());
        self
    }

    /// Attach the standing query filter, replacing any previous one.
    ///
    /// The tenant scope is kept apart and stays in force.
    pub fn has_query_filter(self, filter: Filter) -> Self {
        if !self.mapping.query_filter.is_none() {
            tracing::debug!(entity = %self.mapping.name, "replacing standing query filter");
        }
        self.mapping.query_filter = filter;
        self
    }

    /// Scope the entity to a tenant. Once set, the scope cannot be cleared.
    pub(crate) fn scope_to_tenant(self, filter: Filter) -> Self {
        if self.mapping.is_tenant_scoped() && self.mapping.tenant_filter != filter {
            tracing::warn!(entity = %self.mapping.name, "tenant scope already set; keeping both");
            let current = std::mem::take(&mut self.mapping.tenant_filter);
            self.mapping.tenant_filter = current.and_then(filter);
        } else {
            self.mapping.tenant_filter = filter;
        }
        self
    }

    /// Add seed rows.
    pub fn has_data(self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.mapping.seed.extend(rows);
        self
    }

    /// The mapping as configured so far.
    pub fn mapping(&self) -> &EntityMapping {
        &*self.mapping
    }
}

/// The built, immutable model.
///
/// Every query obtained from [`MappingModel::query`] carries the entity's standing
/// filter; there is no way to obtain a query without it.
#[derive(Debug, Clone)]
pub struct MappingModel {
    db_type: DatabaseType,
    entities: IndexMap<String, EntityMapping>,
    functions: IndexMap<String, DbFunctionSignature>,
}

impl MappingModel {
    /// The dialect queries render for.
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Look up an entity mapping.
    pub fn entity(&self, name: &str) -> Option<&EntityMapping> {
        self.entities.get(name)
    }

    /// All entity mappings, in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMapping> {
        self.entities.values()
    }

    /// Entity mappings backed by views.
    pub fn views(&self) -> impl Iterator<Item = &EntityMapping> {
        self.entities.values().filter(|m| m.is_view())
    }

    /// Look up a function by `Container.Name`.
    pub fn function(&self, qualified_name: &str) -> Option<&DbFunctionSignature> {
        self.functions.get(qualified_name)
    }

    /// All bound functions.
    pub fn functions(&self) -> impl Iterator<Item = &DbFunctionSignature> {
        self.functions.values()
    }

    /// Seed rows of an entity.
    pub fn seed_data(&self, entity: &str) -> &[Row] {
        self.entities
            .get(entity)
            .map(|m| m.seed.as_slice())
            .unwrap_or_default()
    }

    /// Start a query against an entity.
    pub fn query(&self, entity: &str) -> QueryResult<EntityQuery<'_>> {
        let mapping = self
            .entities
            .get(entity)
            .ok_or_else(|| QueryError::unknown_entity(entity))?;
        Ok(EntityQuery {
            mapping,
            db_type: self.db_type,
            filter: Filter::None,
            take: None,
        })
    }
}

/// A read query against one entity, always scoped by its standing filter.
#[derive(Debug, Clone)]
pub struct EntityQuery<'m> {
    mapping: &'m EntityMapping,
    db_type: DatabaseType,
    filter: Filter,
    take: Option<u64>,
}

impl EntityQuery<'_> {
    /// Add a filter condition.
    pub fn r#where(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = std::mem::take(&mut self.filter).and_then(filter.into());
        self
    }

    /// Take a limited number of rows.
    pub fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }

    /// The tenant scope, the standing filter, and the caller's filter combined.
    pub fn effective_filter(&self) -> Filter {
        self.mapping.standing_filter().and_then(self.filter.clone())
    }

    /// Build the SQL query.
    pub fn build_sql(&self) -> (String, Vec<FilterValue>) {
        let filter = self.effective_filter();
        let (where_sql, params) = filter.to_sql(0, self.db_type);

        let mut sql = String::from("SELECT ");
        if let (Some(n), DatabaseType::MSSQL) = (self.take, self.db_type) {
            sql.push_str(&format!("TOP ({}) ", n));
        }
        sql.push_str("* FROM ");
        sql.push_str(self.mapping.source());

        if !filter.is_none() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if let Some(n) = self.take {
            if self.db_type != DatabaseType::MSSQL {
                sql.push_str(&format!(" LIMIT {}", n));
            }
        }

        tracing::debug!(entity = %self.mapping.name, sql = %sql, "built entity query");
        (sql, params)
    }

    /// Apply the query to in-memory rows.
    pub fn apply<'r>(&self, rows: impl IntoIterator<Item = &'r Row>) -> Vec<&'r Row> {
        let filter = self.effective_filter();
        let limit = self
            .take
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        rows.into_iter()
            .filter(|row| filter.matches(row))
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(tenant: i64, id: i64) -> Row {
        let mut r = Row::new();
        r.insert("Id".into(), FilterValue::Int(id));
        r.insert("TenantId".into(), FilterValue::Int(tenant));
        r
    }

    fn model() -> MappingModel {
        let mut builder = ModelBuilder::new();
        builder
            .entity("OrderSummary")
            .has_no_key()
            .to_view("vw_OrderSummary")
            .has_query_filter(Filter::equals("TenantId", 1));
        builder.entity("Customer").has_key("Id");
        builder.build().unwrap()
    }

    #[test]
    fn test_entity_builder() {
        let mut builder = ModelBuilder::new();
        let entity = builder.entity("V").has_no_key().to_view("vw_V");
        assert!(entity.mapping().keyless);
        assert_eq!(entity.mapping().source(), "vw_V");
        assert_eq!(builder.entity_count(), 1);

        // Same name returns the same mapping.
        builder.entity("V").has_query_filter(Filter::equals("A", 1));
        assert_eq!(builder.entity_count(), 1);
    }

    #[test]
    fn test_view_query_always_filtered() {
        let model = model();
        let (sql, params) = model.query("OrderSummary").unwrap().build_sql();
        assert_eq!(sql, "SELECT * FROM vw_OrderSummary WHERE TenantId = @P1");
        assert_eq!(params, vec![FilterValue::Int(1)]);
    }

    #[test]
    fn test_caller_filter_is_intersected() {
        let model = model();
        let (sql, params) = model
            .query("OrderSummary")
            .unwrap()
            .r#where(Filter::Gt("Id".into(), FilterValue::Int(10)))
            .take(5)
            .build_sql();
        assert_eq!(
            sql,
            "SELECT TOP (5) * FROM vw_OrderSummary WHERE (TenantId = @P1 AND Id > @P2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_or_filter_cannot_escape_tenant() {
        let model = model();
        let rows = vec![row(1, 1), row(2, 2)];
        let query = model
            .query("OrderSummary")
            .unwrap()
            .r#where(Filter::or([Filter::equals("Id", 2), Filter::equals("TenantId", 2)]));
        assert!(query.apply(&rows).is_empty());
    }

    #[test]
    fn test_apply_filters_rows() {
        let model = model();
        let rows = vec![row(1, 1), row(2, 2), row(1, 3)];
        let matched = model.query("OrderSummary").unwrap().apply(&rows);
        let ids: Vec<_> = matched.iter().map(|r| r["Id"].clone()).collect();
        assert_eq!(ids, vec![FilterValue::Int(1), FilterValue::Int(3)]);
    }

    #[test]
    fn test_apply_with_huge_take() {
        let model = model();
        let rows = vec![row(1, 1), row(2, 2), row(1, 3)];
        let query = model.query("OrderSummary").unwrap();
        assert_eq!(query.clone().take(u64::MAX).apply(&rows).len(), 2);
        assert_eq!(query.take(1).apply(&rows).len(), 1);
    }

    #[test]
    fn test_table_query_without_filter() {
        let model = model();
        let (sql, params) = model
            .query("Customer")
            .unwrap()
            .take(3)
            .build_sql();
        assert_eq!(sql, "SELECT TOP (3) * FROM Customer");
        assert!(params.is_empty());
    }

    #[test]
    fn test_limit_for_other_dialects() {
        let mut builder = ModelBuilder::new().with_db_type(DatabaseType::PostgreSQL);
        builder.entity("V").has_no_key().to_view("v").has_query_filter(Filter::equals("TenantId", 4));
        let model = builder.build().unwrap();
        let (sql, _) = model.query("V").unwrap().take(2).build_sql();
        assert_eq!(sql, "SELECT * FROM v WHERE TenantId = $1 LIMIT 2");
    }

    #[test]
    fn test_tenant_scope_survives_filter_replacement() {
        let mut builder = ModelBuilder::new();
        builder
            .entity("OrderSummary")
            .has_no_key()
            .to_view("vw_OrderSummary")
            .scope_to_tenant(Filter::equals("TenantId", 1));
        builder.entity("OrderSummary").has_query_filter(Filter::None);
        let model = builder.build().unwrap();

        let (sql, params) = model.query("OrderSummary").unwrap().build_sql();
        assert_eq!(sql, "SELECT * FROM vw_OrderSummary WHERE TenantId = @P1");
        assert_eq!(params, vec![FilterValue::Int(1)]);

        let rows = vec![row(1, 1), row(2, 2)];
        assert_eq!(model.query("OrderSummary").unwrap().apply(&rows).len(), 1);
    }

    #[test]
    fn test_tenant_scope_and_standing_filter_combine() {
        let mut builder = ModelBuilder::new();
        builder
            .entity("V")
            .to_view("v")
            .scope_to_tenant(Filter::equals("TenantId", 2))
            .has_query_filter(Filter::Gt("Id".into(), FilterValue::Int(0)));
        let model = builder.build().unwrap();
        let (sql, _) = model.query("V").unwrap().build_sql();
        assert_eq!(sql, "SELECT * FROM v WHERE (TenantId = @P1 AND Id > @P2)");
    }

    #[test]
    fn test_unknown_entity() {
        let err = model().query("Nope").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnknownEntity);
    }

    #[test]
    fn test_seed_requires_key() {
        let mut builder = ModelBuilder::new();
        builder.entity("Tenant").has_data([Row::new()]);
        assert!(builder.build().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_functions() {
        let mut builder = ModelBuilder::new();
        builder.has_db_function(DbFunctionSignature::new("Fns", "Total").param("int").returns("int"));
        let model = builder.build().unwrap();
        assert!(model.function("Fns.Total").is_some());
        assert_eq!(model.functions().count(), 1);
    }
}

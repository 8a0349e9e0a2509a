//! The `Tenant` entity, its seed rows, and an in-memory tenant table.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::context::TenantId;
use crate::filter::{FilterValue, Row};

/// Entity name the tenant rows are mapped under.
pub const TENANT_ENTITY: &str = "Tenant";

/// Display name of the seeded tenants.
pub const DEFAULT_TENANT_NAME: &str = "default tenant";

/// A tenant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tenant {
    /// Tenant id (primary key).
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Host identifier used to pick the tenant for a request.
    pub host: String,
}

impl Tenant {
    /// Create a tenant.
    pub fn new(id: i32, name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            host: host.into(),
        }
    }

    /// The tenant's id.
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.id)
    }

    /// The rows seeded when the schema is created.
    ///
    /// These values are part of the migration contract; do not change them.
    pub fn defaults() -> Vec<Tenant> {
        vec![
            Tenant::new(1, DEFAULT_TENANT_NAME, "localhost:44307"),
            Tenant::new(2, DEFAULT_TENANT_NAME, "localhost:41529"),
        ]
    }

    /// Convert to a column-ordered row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("Id".into(), FilterValue::from(self.id));
        row.insert("Name".into(), FilterValue::from(self.name.as_str()));
        row.insert("Host".into(), FilterValue::from(self.host.as_str()));
        row
    }
}

/// Tenant rows keyed by id.
#[derive(Debug, Default)]
pub struct TenantTable {
    rows: RwLock<IndexMap<i32, Tenant>>,
}

impl TenantTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the seeded default tenants.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        for tenant in Tenant::defaults() {
            table.upsert(tenant);
        }
        table
    }

    /// Insert or replace a tenant. Returns the previous row, if any.
    pub fn upsert(&self, tenant: Tenant) -> Option<Tenant> {
        self.rows.write().insert(tenant.id, tenant)
    }

    /// Remove a tenant by id.
    pub fn remove(&self, id: TenantId) -> Option<Tenant> {
        self.rows.write().shift_remove(&id.get())
    }

    /// Get a tenant by id.
    pub fn get(&self, id: TenantId) -> Option<Tenant> {
        self.rows.read().get(&id.get()).cloned()
    }

    /// Find the tenant id for a host; [`TenantId::unknown`] when none matches.
    pub fn tenant_id_for_host(&self, host: &str) -> TenantId {
        self.rows
            .read()
            .values()
            .find(|t| t.host == host)
            .map(Tenant::tenant_id)
            .unwrap_or_else(TenantId::unknown)
    }

    /// Number of tenants.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_seed_values() {
        let defaults = Tenant::defaults();
        assert_eq!(
            defaults,
            vec![
                Tenant::new(1, "default tenant", "localhost:44307"),
                Tenant::new(2, "default tenant", "localhost:41529"),
            ]
        );
    }

    #[test]
    fn test_to_row_column_order() {
        let row = Tenant::new(1, "a", "h").to_row();
        let columns: Vec<_> = row.keys().cloned().collect();
        assert_eq!(columns, vec!["Id", "Name", "Host"]);
        assert_eq!(row["Id"], FilterValue::Int(1));
    }

    #[test]
    fn test_serde_uses_column_names() {
        let json = serde_json::to_value(Tenant::new(1, "a", "h")).unwrap();
        assert_eq!(json, serde_json::json!({"Id": 1, "Name": "a", "Host": "h"}));
    }

    #[test]
    fn test_host_lookup() {
        let table = TenantTable::with_defaults();
        assert_eq!(table.len(), 2);
        assert_eq!(table.tenant_id_for_host("localhost:44307"), TenantId::new(1));
        assert_eq!(table.tenant_id_for_host("nope"), TenantId::unknown());

        table.upsert(Tenant::new(3, "acme", "acme.example"));
        assert_eq!(table.tenant_id_for_host("acme.example"), TenantId::new(3));

        table.remove(TenantId::new(3));
        assert!(table.get(TenantId::new(3)).is_none());
    }
}

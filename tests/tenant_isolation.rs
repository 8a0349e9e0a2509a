//! Integration tests for tenant-scoped view mapping.
//!
//! Each test builds one model per tenant, the way one schema instance is built per
//! unit of work, and checks that view queries only ever see that tenant's rows.

use std::borrow::Cow;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use stratum::prelude::*;
use stratum::{HostProvider, StaticProvider, TenantTable};

#[derive(Default)]
struct OrderSummary;

impl ViewEntity for OrderSummary {
    fn view_name(&self) -> Cow<'static, str> {
        Cow::Borrowed("vw_OrderSummary")
    }
}

#[derive(Default)]
struct InvoiceTotals;

impl ViewEntity for InvoiceTotals {
    fn view_name(&self) -> Cow<'static, str> {
        Cow::Borrowed("vw_InvoiceTotals")
    }
}

fn registry() -> Arc<EntityRegistry> {
    Arc::new(
        EntityRegistry::new()
            .view::<OrderSummary>()
            .view::<InvoiceTotals>()
            .function(
                DbFunctionSignature::new("SqlFunctions", "OrderTotal")
                    .param("int")
                    .returns("decimal"),
            ),
    )
}

fn build_for(tenant: TenantContext) -> MappingModel {
    let configurator = ModelConfigurator::new(registry(), tenant);
    let mut builder = ModelBuilder::new();
    assert!(configurator.on_model_creating(&mut builder).expect("configure"));
    builder.build().expect("build")
}

fn rows() -> Vec<Row> {
    [(1, 1), (2, 2), (3, 1), (4, 2), (5, 3)]
        .into_iter()
        .map(|(id, tenant): (i64, i64)| {
            let mut row = Row::new();
            row.insert("Id".into(), FilterValue::Int(id));
            row.insert("TenantId".into(), FilterValue::Int(tenant));
            row
        })
        .collect()
}

fn ids(matched: &[&Row]) -> Vec<i64> {
    matched.iter().filter_map(|r| r["Id"].as_int()).collect()
}

#[test]
fn test_each_tenant_sees_only_its_rows() {
    let data = rows();
    let t1 = build_for(TenantContext::fixed(1));
    let t2 = build_for(TenantContext::fixed(2));

    for view in ["OrderSummary", "InvoiceTotals"] {
        assert_eq!(ids(&t1.query(view).unwrap().apply(&data)), vec![1, 3]);
        assert_eq!(ids(&t2.query(view).unwrap().apply(&data)), vec![2, 4]);
    }
}

#[test]
fn test_caller_filter_cannot_widen_scope() {
    let data = rows();
    let t1 = build_for(TenantContext::fixed(1));

    let widened = t1
        .query("OrderSummary")
        .unwrap()
        .r#where(Filter::or([
            Filter::equals("TenantId", 2),
            Filter::equals("TenantId", 3),
        ]));
    assert!(widened.apply(&data).is_empty());

    let narrowed = t1
        .query("OrderSummary")
        .unwrap()
        .r#where(Filter::Gt("Id".into(), FilterValue::Int(1)));
    assert_eq!(ids(&narrowed.apply(&data)), vec![3]);
}

#[test]
fn test_later_query_filter_keeps_tenant_scope() {
    let data = rows();
    let configurator = ModelConfigurator::new(registry(), TenantContext::fixed(1));
    let mut builder = ModelBuilder::new();
    configurator.on_model_creating(&mut builder).expect("configure");
    builder.entity("OrderSummary").has_query_filter(Filter::None);
    let model = builder.build().expect("build");

    let query = model.query("OrderSummary").unwrap();
    let (sql, _) = query.build_sql();
    assert_eq!(sql, "SELECT * FROM vw_OrderSummary WHERE TenantId = @P1");
    assert_eq!(ids(&query.apply(&data)), vec![1, 3]);
}

#[test]
fn test_sql_carries_tenant_parameter() {
    let t2 = build_for(TenantContext::fixed(2));
    let (sql, params) = t2.query("InvoiceTotals").unwrap().build_sql();
    assert_eq!(sql, "SELECT * FROM vw_InvoiceTotals WHERE TenantId = @P1");
    assert_eq!(params, vec![FilterValue::Int(2)]);
}

#[test]
fn test_host_based_tenant_resolution() {
    let tenants = Arc::new(TenantTable::with_defaults());
    let data = rows();

    let second = build_for(TenantContext::new(HostProvider::new(
        "localhost:41529",
        tenants.clone(),
    )));
    assert_eq!(ids(&second.query("OrderSummary").unwrap().apply(&data)), vec![2, 4]);

    let unknown = build_for(TenantContext::new(HostProvider::new("evil.example", tenants)));
    assert!(unknown.query("OrderSummary").unwrap().apply(&data).is_empty());
}

#[test]
fn test_model_contents() {
    let model = build_for(TenantContext::new(StaticProvider::new(1)));

    let views: Vec<_> = model.views().map(|v| v.source().to_string()).collect();
    assert_eq!(views, vec!["vw_OrderSummary", "vw_InvoiceTotals"]);
    assert!(model.views().all(|v| v.keyless && v.key.is_none()));
    assert!(model.function("SqlFunctions.OrderTotal").is_some());

    let seeded: Vec<_> = model
        .seed_data("Tenant")
        .iter()
        .map(|r| r["Host"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(seeded, vec!["localhost:44307", "localhost:41529"]);
}

#[test]
fn test_hooks_run_once() {
    let configurator = ModelConfigurator::new(registry(), TenantContext::fixed(1));
    let mut builder = ModelBuilder::new();
    assert!(configurator.on_model_creating(&mut builder).unwrap());
    assert!(!configurator.on_model_creating(&mut builder).unwrap());

    let mut options = stratum::ConnectionOptions::new();
    assert!(configurator.on_configuring(&mut options));
    assert!(!configurator.on_configuring(&mut options));

    let model = builder.build().unwrap();
    assert_eq!(model.views().count(), 2);
    assert_eq!(model.seed_data("Tenant").len(), 2);
}

#[test]
fn test_concurrent_first_invocation_runs_once() {
    let configurator = ModelConfigurator::new(registry(), TenantContext::fixed(1));

    let results: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let configurator = &configurator;
                s.spawn(move || {
                    let mut builder = ModelBuilder::new();
                    configurator.on_model_creating(&mut builder).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|ran| **ran).count(), 1);
}

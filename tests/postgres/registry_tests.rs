//! Scoped registry behaviour against a migrated `PostgreSQL` database.

use crate::postgres::helpers::{TestDatabase, migrator, test_runtime};
use hybrid_registry::server_registry::{
    adapters::postgres::PostgresServerRegistry,
    domain::{Namespace, OrgId, ServerEndpoint},
    ports::ServerRegistryError,
    services::{
        RegisterServerRequest, ServerRegistryService, ServerRegistryServiceError,
        UpdateServerRequest,
    },
};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;
use std::sync::Arc;

type TestService = ServerRegistryService<PostgresServerRegistry, DefaultClock>;

fn migrated_service(database: &TestDatabase, pool_size: u32) -> TestService {
    let rt = test_runtime();
    let pool = database.pool(pool_size).expect("pool");
    rt.block_on(migrator(pool.clone()).apply_pending())
        .expect("migrations should apply");
    ServerRegistryService::new(
        Arc::new(PostgresServerRegistry::new(pool)),
        Arc::new(DefaultClock),
    )
}

fn request(name: &str) -> RegisterServerRequest {
    RegisterServerRequest::new(
        name,
        ServerEndpoint::http("https://tools.example.com").expect("valid endpoint"),
    )
}

fn conflict_namespace(error: &ServerRegistryServiceError) -> Option<Namespace> {
    match error {
        ServerRegistryServiceError::Repository(ServerRegistryError::Conflict {
            namespace, ..
        }) => Some(*namespace),
        _ => None,
    }
}

#[rstest]
fn tenant_entry_shadows_global_entry(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "registry_shadow").expect("db");
    let service = migrated_service(&database, 2);
    let rt = test_runtime();
    let t1 = OrgId::new();
    let t2 = OrgId::new();

    let global = rt
        .block_on(service.register(request("search")))
        .expect("global registration");
    let private = rt
        .block_on(service.register(request("search").owned_by(t1).with_global(false)))
        .expect("tenant registration");

    let for_t1 = rt
        .block_on(service.resolve("search", Some(t1)))
        .expect("t1 resolves");
    let for_t2 = rt
        .block_on(service.resolve("search", Some(t2)))
        .expect("t2 resolves");

    assert_eq!(for_t1.id(), private.id());
    assert_eq!(for_t2.id(), global.id());
    assert_eq!(for_t1.endpoint(), private.endpoint());
}

#[rstest]
fn duplicate_names_conflict_per_namespace(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "registry_conflict").expect("db");
    let service = migrated_service(&database, 2);
    let rt = test_runtime();
    let tenant = OrgId::new();

    rt.block_on(service.register(request("search")))
        .expect("global registration");
    rt.block_on(service.register(request("search").owned_by(tenant)))
        .expect("tenant registration");

    let global_dup = rt
        .block_on(service.register(request("search")))
        .expect_err("global duplicate");
    let tenant_dup = rt
        .block_on(service.register(request("search").owned_by(tenant)))
        .expect_err("tenant duplicate");
    let shared_dup = rt
        .block_on(service.register(request("search").owned_by(OrgId::new()).with_global(true)))
        .expect_err("shared entry collides globally");

    assert_eq!(conflict_namespace(&global_dup), Some(Namespace::Global));
    assert_eq!(conflict_namespace(&tenant_dup), Some(Namespace::Tenant(tenant)));
    assert_eq!(conflict_namespace(&shared_dup), Some(Namespace::Global));
}

#[rstest]
fn update_validates_new_state_and_rejects_unknown_ids(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "registry_update").expect("db");
    let service = migrated_service(&database, 2);
    let rt = test_runtime();
    let tenant = OrgId::new();

    rt.block_on(service.register(request("search")))
        .expect("global registration");
    let private = rt
        .block_on(service.register(request("search").owned_by(tenant)))
        .expect("tenant registration");

    let publish = rt
        .block_on(service.update(private.id(), UpdateServerRequest::new().set_global(true)))
        .expect_err("publishing collides with the global entry");
    assert_eq!(conflict_namespace(&publish), Some(Namespace::Global));

    let renamed = rt
        .block_on(service.update(
            private.id(),
            UpdateServerRequest::new().rename("search_v2").set_global(true),
        ))
        .expect("rename and publish");
    assert!(renamed.is_global());
    assert_eq!(renamed.org_id(), Some(tenant));

    rt.block_on(service.remove(renamed.id())).expect("removal");
    let missing = rt.block_on(service.update(renamed.id(), UpdateServerRequest::new().set_global(false)));
    assert!(matches!(
        missing,
        Err(ServerRegistryServiceError::NotFound(id)) if id == renamed.id()
    ));
}

#[rstest]
fn list_by_scope_orders_owned_before_global(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "registry_list").expect("db");
    let service = migrated_service(&database, 2);
    let rt = test_runtime();
    let tenant = OrgId::new();

    let global = rt
        .block_on(service.register(request("search")))
        .expect("global registration");
    let private = rt
        .block_on(service.register(request("search").owned_by(tenant)))
        .expect("tenant registration");
    rt.block_on(service.register(request("alpha").owned_by(OrgId::new())))
        .expect("foreign registration");

    let listed = rt
        .block_on(service.list_by_scope(Some(tenant)))
        .expect("listing");
    let ids = listed.iter().map(|server| server.id()).collect::<Vec<_>>();

    assert_eq!(ids, vec![private.id(), global.id()]);
}

#[rstest]
fn concurrent_duplicate_registrations_admit_exactly_one(
    shared_test_cluster: &'static TestCluster,
) {
    let database = TestDatabase::create(shared_test_cluster, "registry_race").expect("db");
    let service = Arc::new(migrated_service(&database, 4));
    let rt = test_runtime();

    let outcomes = rt.block_on(async {
        let handles = (0..8)
            .map(|_| {
                let shared = Arc::clone(&service);
                tokio::spawn(async move { shared.register(request("search")).await })
            })
            .collect::<Vec<_>>();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.expect("task should not panic"));
        }
        results
    });

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .filter(|error| conflict_namespace(error) == Some(Namespace::Global))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
}

#[rstest]
fn concurrent_updates_of_different_fields_all_persist(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "registry_update_race").expect("db");
    let service = Arc::new(migrated_service(&database, 4));
    let rt = test_runtime();
    let tenant = OrgId::new();
    let created = rt
        .block_on(service.register(request("search").owned_by(tenant)))
        .expect("tenant registration");
    let created_id = created.id();

    for round in 0..5 {
        let name = format!("search_{round}");
        let endpoint = ServerEndpoint::http(format!("https://tools-{round}.example.com"))
            .expect("valid endpoint");
        let outcomes = rt.block_on(async {
            let renamer = Arc::clone(&service);
            let rename = UpdateServerRequest::new().rename(name.clone());
            let rename_task =
                tokio::spawn(async move { renamer.update(created_id, rename).await });
            let replacer = Arc::clone(&service);
            let replace = UpdateServerRequest::new().replace_endpoint(endpoint.clone());
            let replace_task =
                tokio::spawn(async move { replacer.update(created_id, replace).await });
            (
                rename_task.await.expect("task should not panic"),
                replace_task.await.expect("task should not panic"),
            )
        });
        outcomes.0.expect("rename should succeed");
        outcomes.1.expect("endpoint replacement should succeed");

        let stored = rt
            .block_on(service.find_by_id(created.id()))
            .expect("lookup")
            .expect("registration should exist");
        assert_eq!(stored.name().as_str(), name);
        assert_eq!(stored.endpoint(), &endpoint);
        assert_eq!(stored.org_id(), Some(tenant));
    }
}

//! Transactional migrations against an embedded `PostgreSQL` database.

use crate::postgres::helpers::{TestDatabase, migrator, test_runtime};
use diesel::connection::SimpleConnection;
use hybrid_registry::schema_migration::{
    adapters::postgres::PostgresSchemaStore,
    domain::{
        ColumnDefinition, ColumnType, IndexDefinition, Migration, MigrationCatalog,
        MigrationVersion, SchemaChange, TableDefinition,
    },
    ports::SchemaStoreError,
    services::{MigrationOutcome, MigrationStatus, SchemaMigrationError, SchemaMigrator},
};
use hybrid_registry::server_registry::{
    adapters::postgres::PostgresServerRegistry,
    domain::{OrgId, ServerEndpoint},
    services::{RegisterServerRequest, ServerRegistryService},
};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;
use std::sync::Arc;

const V1: MigrationVersion = MigrationVersion::CREATE_MCP_SERVERS;
const V2: MigrationVersion = MigrationVersion::HYBRID_TENANCY;

const LEGACY_INSERT: &str = "INSERT INTO mcp_servers (id, name, endpoint, created_at, updated_at) \
     VALUES ('6f1c1c1e-8d1a-4a53-9b44-1d2b6a0c9e01', 'search', \
     '{\"kind\":\"stdio\",\"command\":\"search-server\",\"args\":[]}', now(), now())";

fn applied_flags(status: &[MigrationStatus]) -> Vec<bool> {
    status.iter().map(MigrationStatus::is_applied).collect()
}

#[rstest]
fn apply_pending_is_idempotent(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "migrate_idempotent").expect("db");
    let migrator = migrator(database.pool(1).expect("pool"));
    let rt = test_runtime();

    let first = rt.block_on(migrator.apply_pending()).expect("first run");
    let second = rt.block_on(migrator.apply_pending()).expect("second run");
    let repeated = rt.block_on(migrator.apply(V2)).expect("explicit re-apply");

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(repeated, MigrationOutcome::AlreadyApplied(V2));
    let status = rt.block_on(migrator.status()).expect("status");
    assert_eq!(applied_flags(&status), vec![true, true]);
}

#[rstest]
fn concurrent_migrators_on_fresh_database_both_succeed(
    shared_test_cluster: &'static TestCluster,
) {
    let database = TestDatabase::create(shared_test_cluster, "migrate_concurrent").expect("db");
    let first = migrator(database.pool(1).expect("pool"));
    let second = migrator(database.pool(1).expect("pool"));
    let rt = test_runtime();

    let (first_run, second_run) = rt.block_on(async {
        let first_task = tokio::spawn(async move { first.apply_pending().await });
        let second_task = tokio::spawn(async move { second.apply_pending().await });
        (
            first_task.await.expect("task should not panic"),
            second_task.await.expect("task should not panic"),
        )
    });
    let first_applied = first_run.expect("first migrator should succeed");
    let second_applied = second_run.expect("second migrator should succeed");

    assert_eq!(first_applied.len() + second_applied.len(), 2);
    let status = rt
        .block_on(migrator(database.pool(1).expect("pool")).status())
        .expect("status");
    assert_eq!(applied_flags(&status), vec![true, true]);
}

#[rstest]
fn legacy_rows_become_global_entries(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "migrate_backfill").expect("db");
    let pool = database.pool(1).expect("pool");
    let migrator = migrator(pool.clone());
    let rt = test_runtime();

    rt.block_on(migrator.apply(V1)).expect("apply v1");
    database
        .connect()
        .expect("connection")
        .batch_execute(LEGACY_INSERT)
        .expect("legacy insert");
    rt.block_on(migrator.apply(V2)).expect("apply v2");

    let service = ServerRegistryService::new(
        Arc::new(PostgresServerRegistry::new(pool)),
        Arc::new(DefaultClock),
    );
    let resolved = rt
        .block_on(service.resolve("search", Some(OrgId::new())))
        .expect("legacy entry resolves for any tenant");
    assert!(resolved.is_global());
    assert_eq!(resolved.org_id(), None);
}

#[rstest]
fn rollback_restores_flat_schema(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "migrate_rollback").expect("db");
    let migrator = migrator(database.pool(1).expect("pool"));
    let rt = test_runtime();

    rt.block_on(migrator.apply_pending()).expect("apply all");
    rt.block_on(migrator.rollback(V2)).expect("rollback v2");

    let mut conn = database.connect().expect("connection");
    assert!(conn.batch_execute("SELECT org_id FROM mcp_servers").is_err());
    conn.batch_execute(LEGACY_INSERT).expect("legacy insert");
    let duplicate = conn.batch_execute(
        "INSERT INTO mcp_servers (id, name, endpoint, created_at, updated_at) \
         VALUES (gen_random_uuid(), 'search', '{}', now(), now())",
    );
    assert!(duplicate.is_err(), "flat unique name index should be back");
    let status = rt.block_on(migrator.status()).expect("status");
    assert_eq!(applied_flags(&status), vec![true, false]);
}

#[rstest]
fn rollback_blocked_by_tenant_names_changes_nothing(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "migrate_blocked").expect("db");
    let pool = database.pool(1).expect("pool");
    let migrator = migrator(pool.clone());
    let rt = test_runtime();
    rt.block_on(migrator.apply_pending()).expect("apply all");

    let service = ServerRegistryService::new(
        Arc::new(PostgresServerRegistry::new(pool)),
        Arc::new(DefaultClock),
    );
    for _ in 0..2 {
        rt.block_on(service.register(
            RegisterServerRequest::new(
                "search",
                ServerEndpoint::stdio("search-server").expect("valid endpoint"),
            )
            .owned_by(OrgId::new()),
        ))
        .expect("tenant registration");
    }

    let result = rt.block_on(migrator.rollback(V2));

    assert!(matches!(
        result,
        Err(SchemaMigrationError::Store(SchemaStoreError::ChangeRejected { version, .. }))
            if version == V2
    ));
    let status = rt.block_on(migrator.status()).expect("status");
    assert_eq!(applied_flags(&status), vec![true, true]);
    let listed = rt.block_on(service.list_all()).expect("registry still readable");
    assert_eq!(listed.len(), 2);
}

#[rstest]
fn failing_statement_rolls_back_earlier_changes(shared_test_cluster: &'static TestCluster) {
    let database = TestDatabase::create(shared_test_cluster, "migrate_atomic").expect("db");
    let first = MigrationVersion::new(1).expect("valid version");
    let second = MigrationVersion::new(2).expect("valid version");
    let catalog = MigrationCatalog::new(vec![
        Migration::new(first, "create_items").with_change(SchemaChange::CreateTable(
            TableDefinition {
                name: String::from("items"),
                columns: vec![ColumnDefinition::required("id", ColumnType::Uuid)],
                primary_key: vec![String::from("id")],
            },
        )),
        Migration::new(second, "broken")
            .requires(first)
            .with_change(SchemaChange::AddColumn {
                table: String::from("items"),
                column: ColumnDefinition::optional("label", ColumnType::Varchar(20)),
            })
            .with_change(SchemaChange::CreateIndex(IndexDefinition {
                name: String::from("idx_items_missing"),
                table: String::from("items"),
                columns: vec![String::from("missing")],
                unique: false,
                predicate: None,
            })),
    ])
    .expect("catalogue should validate");
    let migrator = SchemaMigrator::with_catalog(
        Arc::new(PostgresSchemaStore::new(database.pool(1).expect("pool"))),
        Arc::new(DefaultClock),
        catalog,
    );
    let rt = test_runtime();

    rt.block_on(migrator.apply(first)).expect("first migration");
    let result = rt.block_on(migrator.apply(second));

    assert!(matches!(
        result,
        Err(SchemaMigrationError::Store(SchemaStoreError::ChangeRejected { .. }))
    ));
    let mut conn = database.connect().expect("connection");
    assert!(conn.batch_execute("SELECT label FROM items").is_err());
    let status = rt.block_on(migrator.status()).expect("status");
    assert_eq!(applied_flags(&status), vec![true, false]);
}

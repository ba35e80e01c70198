//! Built-in schema history against the in-memory schema store.

use hybrid_registry::schema_migration::{
    adapters::memory::InMemorySchemaStore,
    domain::{MCP_SERVERS_TABLE, MigrationVersion},
    services::{SchemaMigrationError, SchemaMigrator},
};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;

struct MigrationContext {
    store: Arc<InMemorySchemaStore>,
    migrator: SchemaMigrator<InMemorySchemaStore, DefaultClock>,
}

#[fixture]
fn context() -> MigrationContext {
    let store = Arc::new(InMemorySchemaStore::new());
    let migrator = SchemaMigrator::new(Arc::clone(&store), Arc::new(DefaultClock));
    MigrationContext { store, migrator }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_lists_catalogue_in_version_order(context: MigrationContext) {
    let before = context.migrator.status().await.expect("status");
    let names = before
        .iter()
        .map(|entry| entry.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["create_mcp_servers", "hybrid_tenancy"]);
    assert!(before.iter().all(|entry| !entry.is_applied()));

    context.migrator.apply_pending().await.expect("apply all");

    let after = context.migrator.status().await.expect("status");
    assert!(after.iter().all(|entry| entry.is_applied()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn full_rollback_and_reapply_round_trip(context: MigrationContext) {
    context.migrator.apply_pending().await.expect("apply all");
    let migrated = context
        .store
        .table(MCP_SERVERS_TABLE)
        .expect("store readable")
        .expect("table exists");

    context
        .migrator
        .rollback(MigrationVersion::HYBRID_TENANCY)
        .await
        .expect("rollback v2");
    context
        .migrator
        .rollback(MigrationVersion::CREATE_MCP_SERVERS)
        .await
        .expect("rollback v1");
    assert!(
        context
            .store
            .table_names()
            .expect("store readable")
            .is_empty()
    );

    context.migrator.apply_pending().await.expect("re-apply all");
    let reapplied = context
        .store
        .table(MCP_SERVERS_TABLE)
        .expect("store readable")
        .expect("table exists");
    assert_eq!(reapplied, migrated);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_rollback_reports_not_applied(context: MigrationContext) {
    context.migrator.apply_pending().await.expect("apply all");
    context
        .migrator
        .rollback(MigrationVersion::HYBRID_TENANCY)
        .await
        .expect("first rollback");

    let result = context
        .migrator
        .rollback(MigrationVersion::HYBRID_TENANCY)
        .await;

    assert!(matches!(
        result,
        Err(SchemaMigrationError::NotApplied(version)) if version == MigrationVersion::HYBRID_TENANCY
    ));
}

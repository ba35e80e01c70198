//! Shared helpers for `PostgreSQL` integration tests.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use hybrid_registry::schema_migration::{
    adapters::postgres::PostgresSchemaStore, services::SchemaMigrator,
};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::TestCluster;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Boxed error used by fallible helpers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pool type shared by registry and schema adapters.
pub type TestPool = Pool<ConnectionManager<PgConnection>>;

/// Empty template database every test database is cloned from.
pub const TEMPLATE_DB: &str = "hybrid_registry_test_template";

/// Creates a tokio runtime for async operations in tests.
pub fn test_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create test runtime")
}

/// Ensures the template database exists and accepts connections.
pub fn ensure_template(cluster: &TestCluster) -> Result<(), BoxError> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            PgConnection::establish(&url).map_err(|e| eyre::eyre!("{e}"))?;
            Ok(())
        })
        .map_err(|e| Box::new(e) as BoxError)?;
    Ok(())
}

/// Test database that is dropped when the guard goes out of scope.
pub struct TestDatabase {
    cluster: &'static TestCluster,
    name: String,
}

impl TestDatabase {
    /// Creates a fresh database from the empty template.
    pub fn create(cluster: &'static TestCluster, prefix: &str) -> Result<Self, BoxError> {
        ensure_template(cluster)?;
        let name = format!("{prefix}_{}", uuid::Uuid::new_v4().simple());
        cluster
            .create_database_from_template(name.as_str(), TEMPLATE_DB)
            .map_err(|e| Box::new(e) as BoxError)?;
        Ok(Self { cluster, name })
    }

    /// Returns the connection URL for this database.
    pub fn url(&self) -> String {
        self.cluster.connection().database_url(&self.name)
    }

    /// Builds a connection pool with `max_size` connections.
    pub fn pool(&self, max_size: u32) -> Result<TestPool, BoxError> {
        let manager = ConnectionManager::<PgConnection>::new(self.url());
        Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| Box::new(e) as BoxError)
    }

    /// Opens a standalone connection.
    pub fn connect(&self) -> Result<PgConnection, BoxError> {
        PgConnection::establish(&self.url()).map_err(|e| Box::new(e) as BoxError)
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Err(e) = self.cluster.drop_database(self.name.as_str()) {
            eprintln!("Warning: failed to drop test database {}: {e}", self.name);
        }
    }
}

/// Builds a migrator over the built-in catalogue for `pool`.
pub fn migrator(pool: TestPool) -> SchemaMigrator<PostgresSchemaStore, DefaultClock> {
    SchemaMigrator::new(
        Arc::new(PostgresSchemaStore::new(pool)),
        Arc::new(DefaultClock),
    )
}

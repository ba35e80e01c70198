//! `PostgreSQL` schema store running each migration in one transaction.

use super::{
    ddl,
    models::{NewSchemaVersionRow, SchemaVersionRow},
    schema::schema_versions,
};
use crate::schema_migration::{
    domain::{AppliedMigration, Migration, MigrationVersion, SchemaChange},
    ports::{SchemaStore, SchemaStoreError, SchemaStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;
use diesel::sql_types::BigInt;
use tracing::debug;

/// `PostgreSQL` connection pool type for the schema store.
pub type SchemaPgPool = Pool<ConnectionManager<PgConnection>>;

const CREATE_TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_versions (\
     version INTEGER PRIMARY KEY, \
     name VARCHAR(100) NOT NULL, \
     applied_at TIMESTAMPTZ NOT NULL)";

/// Transaction-scoped advisory lock key shared by every schema store.
const MIGRATION_LOCK_KEY: i64 = 7_236_828_371_523_011_442;

/// `PostgreSQL`-backed schema store.
///
/// Structural changes and the tracking row are written in one transaction.
/// Every transaction first takes a transaction-scoped advisory lock and only
/// then creates the tracking table if it is missing, so concurrent migrators
/// on a fresh database run one after another and a second migrator observes
/// the first one's outcome.
#[derive(Debug, Clone)]
pub struct PostgresSchemaStore {
    pool: SchemaPgPool,
}

impl PostgresSchemaStore {
    /// Creates a store from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: SchemaPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, operation: F) -> SchemaStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> SchemaStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(SchemaStoreError::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(SchemaStoreError::persistence)?
    }
}

/// Failure inside a migration transaction.
enum TransactionFailure {
    Store(SchemaStoreError),
    Database(DieselError),
}

impl From<DieselError> for TransactionFailure {
    fn from(err: DieselError) -> Self {
        Self::Database(err)
    }
}

impl From<SchemaStoreError> for TransactionFailure {
    fn from(err: SchemaStoreError) -> Self {
        Self::Store(err)
    }
}

impl From<TransactionFailure> for SchemaStoreError {
    fn from(failure: TransactionFailure) -> Self {
        match failure {
            TransactionFailure::Store(err) => err,
            TransactionFailure::Database(err) => Self::persistence(err),
        }
    }
}

fn to_db_version(version: MigrationVersion) -> SchemaStoreResult<i32> {
    i32::try_from(version.value()).map_err(SchemaStoreError::persistence)
}

fn row_to_record(row: SchemaVersionRow) -> SchemaStoreResult<AppliedMigration> {
    let raw = u32::try_from(row.version).map_err(SchemaStoreError::invalid_persisted_data)?;
    let version = MigrationVersion::new(raw).map_err(SchemaStoreError::invalid_persisted_data)?;
    Ok(AppliedMigration {
        version,
        name: row.name,
        applied_at: row.applied_at,
    })
}

/// Serializes the transaction against other schema stores and ensures the
/// tracking table exists.
fn prepare_tracking(conn: &mut PgConnection) -> Result<(), TransactionFailure> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(MIGRATION_LOCK_KEY)
        .execute(conn)?;
    conn.batch_execute(CREATE_TRACKING_TABLE)?;
    Ok(())
}

fn is_recorded(
    conn: &mut PgConnection,
    version: MigrationVersion,
) -> Result<bool, TransactionFailure> {
    let db_version = to_db_version(version)?;
    let found = schema_versions::table
        .find(db_version)
        .select(schema_versions::version)
        .first::<i32>(conn)
        .optional()?;
    Ok(found.is_some())
}

fn run_changes(
    conn: &mut PgConnection,
    version: MigrationVersion,
    changes: &[SchemaChange],
) -> Result<(), TransactionFailure> {
    for change in changes {
        let statement = ddl::render(change);
        debug!(version = %version, statement = %statement, "executing schema change");
        conn.batch_execute(&statement)
            .map_err(|err| SchemaStoreError::ChangeRejected {
                version,
                change: change.describe(),
                reason: err.to_string(),
            })?;
    }
    Ok(())
}

#[async_trait]
impl SchemaStore for PostgresSchemaStore {
    async fn applied(&self) -> SchemaStoreResult<Vec<AppliedMigration>> {
        self.run_blocking(|conn| {
            let rows = conn
                .transaction::<_, TransactionFailure, _>(|tx_conn| {
                    prepare_tracking(tx_conn)?;
                    let loaded = schema_versions::table
                        .order(schema_versions::version.asc())
                        .select(SchemaVersionRow::as_select())
                        .load::<SchemaVersionRow>(tx_conn)?;
                    Ok(loaded)
                })
                .map_err(SchemaStoreError::from)?;
            rows.into_iter().map(row_to_record).collect()
        })
        .await
    }

    async fn apply(
        &self,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> SchemaStoreResult<AppliedMigration> {
        let owned = migration.clone();
        self.run_blocking(move |conn| {
            let version = owned.version();
            conn.transaction::<_, TransactionFailure, _>(|tx_conn| {
                prepare_tracking(tx_conn)?;
                if is_recorded(tx_conn, version)? {
                    return Err(SchemaStoreError::AlreadyRecorded(version).into());
                }
                if let Some(missing) = owned.prerequisite()
                    && !is_recorded(tx_conn, missing)?
                {
                    return Err(SchemaStoreError::PrerequisiteMissing { version, missing }.into());
                }

                run_changes(tx_conn, version, owned.up_changes())?;

                let record = AppliedMigration::of(&owned, applied_at);
                diesel::insert_into(schema_versions::table)
                    .values(&NewSchemaVersionRow {
                        version: to_db_version(version)?,
                        name: &record.name,
                        applied_at: record.applied_at,
                    })
                    .execute(tx_conn)?;
                Ok(record)
            })
            .map_err(SchemaStoreError::from)
        })
        .await
    }

    async fn revert(&self, migration: &Migration) -> SchemaStoreResult<()> {
        let owned = migration.clone();
        self.run_blocking(move |conn| {
            let version = owned.version();
            conn.transaction::<_, TransactionFailure, _>(|tx_conn| {
                prepare_tracking(tx_conn)?;
                if !is_recorded(tx_conn, version)? {
                    return Err(SchemaStoreError::NotRecorded(version).into());
                }

                run_changes(tx_conn, version, &owned.down_changes())?;

                diesel::delete(schema_versions::table.find(to_db_version(version)?))
                    .execute(tx_conn)?;
                Ok(())
            })
            .map_err(SchemaStoreError::from)
        })
        .await
    }
}

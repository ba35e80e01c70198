//! Schema store port: applies and reverts migrations atomically.

use crate::schema_migration::domain::{AppliedMigration, Migration, MigrationVersion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for schema store operations.
pub type SchemaStoreResult<T> = Result<T, SchemaStoreError>;

/// Storage and execution of migrations.
///
/// Each of [`SchemaStore::apply`] and [`SchemaStore::revert`] is one unit of
/// work: either every change and the tracking update are committed, or none
/// are. Implementations re-check the tracking state inside that unit so
/// concurrent migrators cannot both apply the same version.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Returns applied migrations ordered by version.
    async fn applied(&self) -> SchemaStoreResult<Vec<AppliedMigration>>;

    /// Runs the forward changes of `migration` and records it.
    async fn apply(
        &self,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> SchemaStoreResult<AppliedMigration>;

    /// Runs the inverse changes of `migration` and removes its record.
    async fn revert(&self, migration: &Migration) -> SchemaStoreResult<()>;
}

/// Errors returned by schema store implementations.
#[derive(Debug, Clone, Error)]
pub enum SchemaStoreError {
    /// The version is already recorded as applied.
    #[error("migration {0} is already recorded")]
    AlreadyRecorded(MigrationVersion),

    /// The version is not recorded as applied.
    #[error("migration {0} is not recorded")]
    NotRecorded(MigrationVersion),

    /// The prerequisite of a migration is not recorded.
    #[error("migration {version} requires {missing}, which is not recorded")]
    PrerequisiteMissing {
        /// Migration being applied.
        version: MigrationVersion,
        /// Prerequisite not recorded.
        missing: MigrationVersion,
    },

    /// A change could not be executed; the unit of work was rolled back.
    #[error("migration {version} failed to {change}: {reason}")]
    ChangeRejected {
        /// Migration being applied or reverted.
        version: MigrationVersion,
        /// Description of the failing change.
        change: String,
        /// Cause reported by the store.
        reason: String,
    },

    /// Stored tracking data could not be interpreted.
    #[error("invalid persisted migration data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Generic persistence failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SchemaStoreError {
    /// Wraps invalid persisted data errors.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps persistence errors.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

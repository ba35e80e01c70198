//! Service applying and rolling back catalogued migrations.

use crate::schema_migration::{
    domain::{AppliedMigration, Migration, MigrationCatalog, MigrationVersion},
    ports::{SchemaStore, SchemaStoreError},
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Outcome of a successful apply request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The migration ran and was recorded.
    Applied(AppliedMigration),
    /// The migration had already been applied; nothing changed.
    AlreadyApplied(MigrationVersion),
}

/// A catalogued migration and its applied record, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Catalogued version.
    pub version: MigrationVersion,
    /// Catalogued name.
    pub name: String,
    /// Tracking record when applied.
    pub applied: Option<AppliedMigration>,
}

impl MigrationStatus {
    /// Returns whether the migration is applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.applied.is_some()
    }
}

/// Errors returned by [`SchemaMigrator`].
#[derive(Debug, Error)]
pub enum SchemaMigrationError {
    /// The version is not in the catalogue.
    #[error("unknown migration version {0}")]
    UnknownVersion(MigrationVersion),

    /// The prerequisite of the migration is not applied.
    #[error("migration {version} requires migration {missing} to be applied first")]
    Ordering {
        /// Requested version.
        version: MigrationVersion,
        /// Prerequisite that is not applied.
        missing: MigrationVersion,
    },

    /// The version to roll back is not applied.
    #[error("migration {0} is not applied")]
    NotApplied(MigrationVersion),

    /// An applied migration depends on the version being rolled back.
    #[error("migration {version} cannot be rolled back while migration {dependent} is applied")]
    DependentVersion {
        /// Version requested for rollback.
        version: MigrationVersion,
        /// Applied version that requires it.
        dependent: MigrationVersion,
    },

    /// The schema store failed; the unit of work was rolled back.
    #[error(transparent)]
    Store(#[from] SchemaStoreError),
}

/// Result type for migrator operations.
pub type SchemaMigrationResult<T> = Result<T, SchemaMigrationError>;

/// Applies, rolls back and reports catalogued migrations against a store.
///
/// Callers must quiesce registry writers while a migration runs.
#[derive(Clone)]
pub struct SchemaMigrator<S, C>
where
    S: SchemaStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    catalog: MigrationCatalog,
}

impl<S, C> SchemaMigrator<S, C>
where
    S: SchemaStore,
    C: Clock + Send + Sync,
{
    /// Creates a migrator over the built-in registry catalogue.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self::with_catalog(store, clock, MigrationCatalog::builtin())
    }

    /// Creates a migrator over a custom catalogue.
    #[must_use]
    pub const fn with_catalog(store: Arc<S>, clock: Arc<C>, catalog: MigrationCatalog) -> Self {
        Self {
            store,
            clock,
            catalog,
        }
    }

    /// Returns the catalogue this migrator runs.
    #[must_use]
    pub const fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    fn migration(&self, version: MigrationVersion) -> SchemaMigrationResult<&Migration> {
        self.catalog
            .get(version)
            .ok_or(SchemaMigrationError::UnknownVersion(version))
    }

    async fn applied_versions(
        &self,
    ) -> SchemaMigrationResult<BTreeMap<MigrationVersion, AppliedMigration>> {
        Ok(self
            .store
            .applied()
            .await?
            .into_iter()
            .map(|record| (record.version, record))
            .collect())
    }

    /// Applies one migration.
    ///
    /// Applying an already-applied version is a no-op reported as
    /// [`MigrationOutcome::AlreadyApplied`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaMigrationError::UnknownVersion`] for versions outside
    /// the catalogue, [`SchemaMigrationError::Ordering`] when the prerequisite
    /// is not applied, and [`SchemaMigrationError::Store`] when a change
    /// fails, in which case nothing was changed.
    pub async fn apply(&self, version: MigrationVersion) -> SchemaMigrationResult<MigrationOutcome> {
        let migration = self.migration(version)?;
        let applied = self.applied_versions().await?;
        if applied.contains_key(&version) {
            debug!(version = %version, "migration already applied");
            return Ok(MigrationOutcome::AlreadyApplied(version));
        }
        if let Some(missing) = migration.prerequisite()
            && !applied.contains_key(&missing)
        {
            return Err(SchemaMigrationError::Ordering { version, missing });
        }

        match self.store.apply(migration, self.clock.utc()).await {
            Ok(record) => {
                info!(version = %version, name = %record.name, "applied migration");
                Ok(MigrationOutcome::Applied(record))
            }
            Err(SchemaStoreError::AlreadyRecorded(_)) => {
                debug!(version = %version, "migration applied concurrently");
                Ok(MigrationOutcome::AlreadyApplied(version))
            }
            Err(SchemaStoreError::PrerequisiteMissing { missing, .. }) => {
                Err(SchemaMigrationError::Ordering { version, missing })
            }
            Err(err) => {
                warn!(version = %version, error = %err, "migration failed and was rolled back");
                Err(err.into())
            }
        }
    }

    /// Rolls back one migration.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaMigrationError::UnknownVersion`] for versions outside
    /// the catalogue, [`SchemaMigrationError::NotApplied`] when the version is
    /// not applied, [`SchemaMigrationError::DependentVersion`] while a
    /// migration requiring it is applied, and [`SchemaMigrationError::Store`]
    /// when an inverse change fails, in which case nothing was changed.
    pub async fn rollback(&self, version: MigrationVersion) -> SchemaMigrationResult<()> {
        let migration = self.migration(version)?;
        let applied = self.applied_versions().await?;
        if !applied.contains_key(&version) {
            return Err(SchemaMigrationError::NotApplied(version));
        }
        if let Some(dependent) = self
            .catalog
            .dependents_of(version)
            .into_iter()
            .find(|candidate| applied.contains_key(candidate))
        {
            return Err(SchemaMigrationError::DependentVersion { version, dependent });
        }

        match self.store.revert(migration).await {
            Ok(()) => {
                info!(version = %version, name = %migration.name(), "rolled back migration");
                Ok(())
            }
            Err(SchemaStoreError::NotRecorded(_)) => Err(SchemaMigrationError::NotApplied(version)),
            Err(err) => {
                warn!(version = %version, error = %err, "rollback failed and was undone");
                Err(err.into())
            }
        }
    }

    /// Applies every catalogued migration that is not yet applied, in order.
    ///
    /// Stops at the first failure; earlier migrations stay applied.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`SchemaMigrator::apply`].
    pub async fn apply_pending(&self) -> SchemaMigrationResult<Vec<AppliedMigration>> {
        let applied = self.applied_versions().await?;
        let mut newly_applied = Vec::new();
        for migration in self.catalog.iter() {
            if applied.contains_key(&migration.version()) {
                continue;
            }
            if let MigrationOutcome::Applied(record) = self.apply(migration.version()).await? {
                newly_applied.push(record);
            }
        }
        if newly_applied.is_empty() {
            debug!("schema is up to date");
        }
        Ok(newly_applied)
    }

    /// Reports every catalogued migration with its applied record.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaMigrationError::Store`] when tracking data cannot be
    /// read.
    pub async fn status(&self) -> SchemaMigrationResult<Vec<MigrationStatus>> {
        let mut applied = self.applied_versions().await?;
        Ok(self
            .catalog
            .iter()
            .map(|migration| MigrationStatus {
                version: migration.version(),
                name: migration.name().to_owned(),
                applied: applied.remove(&migration.version()),
            })
            .collect())
    }
}

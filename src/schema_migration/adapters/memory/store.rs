//! In-memory schema store with all-or-nothing migration units.

use super::catalogue::{Catalogue, CatalogueError, Row, TableSnapshot};
use crate::schema_migration::{
    domain::{AppliedMigration, Migration, MigrationVersion, SchemaChange},
    ports::{SchemaStore, SchemaStoreError, SchemaStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Thread-safe in-memory schema store.
///
/// A migration runs against a copy of the catalogue that replaces the live
/// one only after every change succeeded.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
    state: Arc<RwLock<SchemaState>>,
}

#[derive(Debug, Clone, Default)]
struct SchemaState {
    catalogue: Catalogue,
    applied: BTreeMap<MigrationVersion, AppliedMigration>,
}

impl SchemaState {
    fn run(
        &mut self,
        version: MigrationVersion,
        changes: &[SchemaChange],
    ) -> SchemaStoreResult<()> {
        for change in changes {
            self.catalogue
                .apply(change)
                .map_err(|err| SchemaStoreError::ChangeRejected {
                    version,
                    change: change.describe(),
                    reason: err.to_string(),
                })?;
        }
        Ok(())
    }
}

impl InMemorySchemaStore {
    /// Creates an empty store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row, enforcing the table's current constraints.
    ///
    /// Columns missing from `row` take their default or `NULL`.
    ///
    /// # Errors
    ///
    /// Returns [`InsertRowError::Rejected`] when the table or a column is
    /// unknown or a constraint is violated; the table is left unchanged.
    pub fn insert_row(&self, table: &str, row: Row) -> Result<(), InsertRowError> {
        let mut state = self.write_state()?;
        state.catalogue.insert_row(table, row)?;
        Ok(())
    }

    /// Returns a copy of a table, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaStoreError::Persistence`] when the lock is poisoned.
    pub fn table(&self, table: &str) -> SchemaStoreResult<Option<TableSnapshot>> {
        Ok(self.read_state()?.catalogue.snapshot(table))
    }

    /// Returns the names of existing tables in order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaStoreError::Persistence`] when the lock is poisoned.
    pub fn table_names(&self) -> SchemaStoreResult<Vec<String>> {
        Ok(self.read_state()?.catalogue.table_names())
    }

    fn read_state(&self) -> SchemaStoreResult<RwLockReadGuard<'_, SchemaState>> {
        self.state
            .read()
            .map_err(|err| SchemaStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> SchemaStoreResult<RwLockWriteGuard<'_, SchemaState>> {
        self.state
            .write()
            .map_err(|err| SchemaStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

/// Errors returned by [`InMemorySchemaStore::insert_row`].
#[derive(Debug, Error)]
pub enum InsertRowError {
    /// The row was rejected by the catalogue.
    #[error(transparent)]
    Rejected(#[from] CatalogueError),
    /// The store could not be accessed.
    #[error(transparent)]
    Store(#[from] SchemaStoreError),
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    async fn applied(&self) -> SchemaStoreResult<Vec<AppliedMigration>> {
        Ok(self.read_state()?.applied.values().cloned().collect())
    }

    async fn apply(
        &self,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> SchemaStoreResult<AppliedMigration> {
        let version = migration.version();
        let mut state = self.write_state()?;
        if state.applied.contains_key(&version) {
            return Err(SchemaStoreError::AlreadyRecorded(version));
        }
        if let Some(missing) = migration.prerequisite()
            && !state.applied.contains_key(&missing)
        {
            return Err(SchemaStoreError::PrerequisiteMissing { version, missing });
        }

        let mut draft = state.clone();
        draft.run(version, migration.up_changes())?;
        let record = AppliedMigration::of(migration, applied_at);
        draft.applied.insert(version, record.clone());
        *state = draft;
        Ok(record)
    }

    async fn revert(&self, migration: &Migration) -> SchemaStoreResult<()> {
        let version = migration.version();
        let mut state = self.write_state()?;
        if !state.applied.contains_key(&version) {
            return Err(SchemaStoreError::NotRecorded(version));
        }

        let mut draft = state.clone();
        draft.run(version, &migration.down_changes())?;
        draft.applied.remove(&version);
        *state = draft;
        Ok(())
    }
}

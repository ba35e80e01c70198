//! Migration definitions and applied-version records.

use super::{MigrationVersion, SchemaChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A numbered, reversible unit of schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    version: MigrationVersion,
    name: String,
    requires: Option<MigrationVersion>,
    changes: Vec<SchemaChange>,
}

impl Migration {
    /// Creates a migration without prerequisites or changes.
    #[must_use]
    pub fn new(version: MigrationVersion, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            requires: None,
            changes: Vec::new(),
        }
    }

    /// Declares the version that must be applied first.
    #[must_use]
    pub const fn requires(mut self, version: MigrationVersion) -> Self {
        self.requires = Some(version);
        self
    }

    /// Appends a forward change.
    #[must_use]
    pub fn with_change(mut self, change: SchemaChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Returns the migration version.
    #[must_use]
    pub const fn version(&self) -> MigrationVersion {
        self.version
    }

    /// Returns the migration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the prerequisite version, if any.
    #[must_use]
    pub const fn prerequisite(&self) -> Option<MigrationVersion> {
        self.requires
    }

    /// Returns the forward changes in application order.
    #[must_use]
    pub fn up_changes(&self) -> &[SchemaChange] {
        &self.changes
    }

    /// Returns the inverse changes in application order.
    #[must_use]
    pub fn down_changes(&self) -> Vec<SchemaChange> {
        self.changes
            .iter()
            .rev()
            .filter_map(SchemaChange::inverse)
            .collect()
    }
}

/// Tracking record for an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Applied version.
    pub version: MigrationVersion,
    /// Migration name at the time it was applied.
    pub name: String,
    /// When the migration committed.
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    /// Creates the tracking record for `migration`.
    #[must_use]
    pub fn of(migration: &Migration, applied_at: DateTime<Utc>) -> Self {
        Self {
            version: migration.version(),
            name: migration.name().to_owned(),
            applied_at,
        }
    }
}

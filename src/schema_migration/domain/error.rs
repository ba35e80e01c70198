//! Error types for migration catalogue validation.

use super::MigrationVersion;
use thiserror::Error;

/// Errors returned while assembling a migration catalogue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaMigrationDomainError {
    /// Migration versions start at 1.
    #[error("migration version must be greater than zero")]
    ZeroVersion,

    /// The migration name is empty.
    #[error("migration {0} has an empty name")]
    EmptyName(MigrationVersion),

    /// Two migrations share a version.
    #[error("migration version {0} is declared more than once")]
    DuplicateVersion(MigrationVersion),

    /// A migration requires a version that is not in the catalogue.
    #[error("migration {version} requires unknown version {requires}")]
    UnknownPrerequisite {
        /// Declaring migration.
        version: MigrationVersion,
        /// Missing prerequisite.
        requires: MigrationVersion,
    },

    /// A migration requires itself or a later version.
    #[error("migration {version} cannot require version {requires}, which is not earlier")]
    ForwardPrerequisite {
        /// Declaring migration.
        version: MigrationVersion,
        /// Offending prerequisite.
        requires: MigrationVersion,
    },
}

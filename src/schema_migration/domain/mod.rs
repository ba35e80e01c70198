//! Domain model for versioned schema migrations.

mod catalog;
mod change;
mod error;
mod migration;
mod version;

pub use catalog::{
    FLAT_NAME_INDEX, GLOBAL_NAME_INDEX, MCP_SERVERS_TABLE, MigrationCatalog, ORG_NAME_INDEX,
    ORG_SCOPE_INDEX, SCOPE_CHECK,
};
pub use change::{
    CheckConstraint, ColumnDefinition, ColumnType, IndexDefinition, Literal, RowPredicate,
    SchemaChange, TableDefinition,
};
pub use error::SchemaMigrationDomainError;
pub use migration::{AppliedMigration, Migration};
pub use version::MigrationVersion;

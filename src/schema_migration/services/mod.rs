//! Application services for schema migrations.

mod migrator;

pub use migrator::{
    MigrationOutcome, MigrationStatus, SchemaMigrationError, SchemaMigrationResult,
    SchemaMigrator,
};

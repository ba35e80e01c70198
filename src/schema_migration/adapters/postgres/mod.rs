//! `PostgreSQL` adapter for schema migrations.
//!
//! Changes are rendered as DDL and executed in the same transaction that
//! records the version in `schema_versions`.

mod ddl;
mod models;
mod schema;
mod store;

pub use store::{PostgresSchemaStore, SchemaPgPool};

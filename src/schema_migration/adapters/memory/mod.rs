//! In-memory schema store used by tests and tooling.

mod catalogue;
mod store;

pub use catalogue::{CatalogueError, Row, TableSnapshot};
pub use store::{InMemorySchemaStore, InsertRowError};

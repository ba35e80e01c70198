//! Port contracts for schema migration persistence.

mod store;

pub use store::{SchemaStore, SchemaStoreError, SchemaStoreResult};

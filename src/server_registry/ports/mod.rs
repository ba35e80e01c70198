//! Port contracts for the scoped server registry.

mod repository;

pub use repository::{ServerRegistryError, ServerRegistryRepository, ServerRegistryResult};

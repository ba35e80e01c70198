//! Versioned, reversible schema migrations for the server registry.
//!
//! Each migration is declared as data and applied by a [`ports::SchemaStore`]
//! as one all-or-nothing unit together with its tracking record. The built-in
//! catalogue moves the registry from a flat, globally unique name space to
//! hybrid global and per-organization namespaces.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

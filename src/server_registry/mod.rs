//! Scoped registry of external tool servers.
//!
//! Registrations live in two independently enforced namespaces: the global
//! namespace and one namespace per organization. Dispatchers resolve a name
//! for a caller's organization, preferring that organization's own entry over
//! a global one. The module follows hexagonal architecture:
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

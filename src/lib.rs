//! Hybrid registry of external tool servers.
//!
//! Tool servers are registered either globally, visible to every
//! organization, or under an owning organization, optionally shared globally.
//! Names are unique within the global namespace and within each
//! organization's namespace, and a caller's own registration shadows a
//! global one of the same name.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`server_registry`]: Scoped registration, resolution and listing
//! - [`schema_migration`]: Versioned, reversible migrations of the registry
//!   schema
//! - [`config`]: Environment-driven runtime configuration

pub mod config;
pub mod schema_migration;
pub mod server_registry;

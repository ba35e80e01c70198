//! Domain model for scoped external server registrations.
//!
//! The server registry domain models registration identity, the hybrid
//! global/tenant visibility scope, the opaque connection payload, and the
//! resolution precedence between tenant-owned and global entries.
//! Infrastructure concerns remain outside this boundary.

mod endpoint;
mod error;
mod ids;
mod resolution;
mod scope;
mod server;

pub use endpoint::ServerEndpoint;
pub use error::ServerRegistryDomainError;
pub use ids::{OrgId, ServerId, ServerName};
pub use resolution::{resolve_candidate, sort_for_presentation};
pub use scope::{Namespace, RegistrationScope};
pub use server::{OwnerChange, PersistedServerData, ServerChanges, ServerRegistration};

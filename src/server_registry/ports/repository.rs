//! Repository port for scoped server registry persistence and resolution.

use crate::server_registry::domain::{
    Namespace, OrgId, ServerChanges, ServerId, ServerName, ServerRegistration,
    ServerRegistryDomainError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for server registry operations.
pub type ServerRegistryResult<T> = Result<T, ServerRegistryError>;

/// Persistence contract for server registrations.
///
/// Implementations must make each write a single atomic unit: the namespace
/// checks and the write either both happen or neither does, and two racing
/// writers can never both commit the same name into the same namespace.
#[async_trait]
pub trait ServerRegistryRepository: Send + Sync {
    /// Stores a new registration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryError::Conflict`] naming the colliding
    /// namespace, or [`ServerRegistryError::DuplicateServer`] when the ID
    /// already exists.
    async fn insert(&self, server: &ServerRegistration) -> ServerRegistryResult<()>;

    /// Applies `changes` to the stored registration and returns the new state.
    ///
    /// The read, the namespace re-check (ignoring the registration itself)
    /// and the write form one critical section, so concurrent updates of
    /// different fields all take effect.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryError::NotFound`] when the registration does
    /// not exist, [`ServerRegistryError::Rejected`] when the changes produce
    /// an invalid registration, or [`ServerRegistryError::Conflict`] when the
    /// new state collides with another registration.
    async fn update(
        &self,
        server_id: ServerId,
        changes: &ServerChanges,
        updated_at: DateTime<Utc>,
    ) -> ServerRegistryResult<ServerRegistration>;

    /// Deletes a registration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryError::NotFound`] when the registration does
    /// not exist.
    async fn remove(&self, server_id: ServerId) -> ServerRegistryResult<()>;

    /// Finds a registration by internal identifier.
    async fn find_by_id(
        &self,
        server_id: ServerId,
    ) -> ServerRegistryResult<Option<ServerRegistration>>;

    /// Resolves `name` for a caller from `org_id`: the caller's own entry
    /// first, else the global entry.
    async fn resolve(
        &self,
        name: &ServerName,
        org_id: Option<OrgId>,
    ) -> ServerRegistryResult<Option<ServerRegistration>>;

    /// Returns every registration visible to `org_id`, ordered by name.
    ///
    /// With no organization only global entries are returned.
    async fn list_visible(
        &self,
        org_id: Option<OrgId>,
    ) -> ServerRegistryResult<Vec<ServerRegistration>>;

    /// Returns all registrations regardless of scope, ordered by name.
    async fn list_all(&self) -> ServerRegistryResult<Vec<ServerRegistration>>;
}

/// Errors returned by server registry repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ServerRegistryError {
    /// The name is already taken in one of the target namespaces.
    #[error("server name '{name}' is already registered in the {namespace}")]
    Conflict {
        /// Namespace in which the collision occurred.
        namespace: Namespace,
        /// Colliding server name.
        name: ServerName,
    },

    /// A registration with the same identifier already exists.
    #[error("duplicate server identifier: {0}")]
    DuplicateServer(ServerId),

    /// The store rejected an unowned, hidden registration.
    #[error("server '{0}' has no owning organization and must be global")]
    InvalidScope(ServerName),

    /// The changes produce an invalid registration.
    #[error(transparent)]
    Rejected(ServerRegistryDomainError),

    /// The registration was not found.
    #[error("server not found: {0}")]
    NotFound(ServerId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted server data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ServerRegistryError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

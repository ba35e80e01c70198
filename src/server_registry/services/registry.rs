//! Service layer for scoped server registration and resolution.
//!
//! Provides [`ServerRegistryService`], the entry point for the administrative
//! surface (register, update, remove) and for dispatchers (resolve, list).

use crate::server_registry::{
    domain::{
        OrgId, OwnerChange, RegistrationScope, ServerChanges, ServerEndpoint, ServerId,
        ServerName, ServerRegistration, ServerRegistryDomainError,
    },
    ports::{ServerRegistryError, ServerRegistryRepository},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Request payload for registering a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterServerRequest {
    name: String,
    endpoint: ServerEndpoint,
    org_id: Option<OrgId>,
    is_global: Option<bool>,
}

impl RegisterServerRequest {
    /// Creates a request for an unowned registration.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: ServerEndpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            org_id: None,
            is_global: None,
        }
    }

    /// Makes the registration owned by `org_id`.
    #[must_use]
    pub const fn owned_by(mut self, org_id: OrgId) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Sets global visibility explicitly instead of using the default.
    #[must_use]
    pub const fn with_global(mut self, is_global: bool) -> Self {
        self.is_global = Some(is_global);
        self
    }
}

/// Request payload for changing a registration.
///
/// Fields left unset are kept as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateServerRequest {
    name: Option<String>,
    owner: OwnerChange,
    is_global: Option<bool>,
    endpoint: Option<ServerEndpoint>,
}

impl UpdateServerRequest {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the registration.
    #[must_use]
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Transfers ownership to `org_id`.
    #[must_use]
    pub const fn transfer_to(mut self, org_id: OrgId) -> Self {
        self.owner = OwnerChange::Set(org_id);
        self
    }

    /// Removes ownership.
    #[must_use]
    pub const fn release_ownership(mut self) -> Self {
        self.owner = OwnerChange::Clear;
        self
    }

    /// Sets global visibility.
    #[must_use]
    pub const fn set_global(mut self, is_global: bool) -> Self {
        self.is_global = Some(is_global);
        self
    }

    /// Replaces the connection payload.
    #[must_use]
    pub fn replace_endpoint(mut self, endpoint: ServerEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    fn into_changes(self) -> Result<ServerChanges, ServerRegistryDomainError> {
        Ok(ServerChanges {
            name: self.name.map(ServerName::new).transpose()?,
            owner: self.owner,
            is_global: self.is_global,
            endpoint: self.endpoint,
        })
    }
}

/// Service-level errors for server registry operations.
#[derive(Debug, Error)]
pub enum ServerRegistryServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ServerRegistryDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ServerRegistryError),
    /// No registration exists with the given identifier.
    #[error("server {0} not found")]
    NotFound(ServerId),
    /// Neither a tenant-owned nor a global registration matches the name.
    #[error("no server named '{name}' is visible to {}", describe_caller(.org_id))]
    Unresolved {
        /// Requested server name.
        name: ServerName,
        /// Caller organization.
        org_id: Option<OrgId>,
    },
}

fn describe_caller(org_id: &Option<OrgId>) -> String {
    org_id.map_or_else(
        || String::from("callers without an organization"),
        |org| format!("organization {org}"),
    )
}

/// Result type for server registry service operations.
pub type ServerRegistryServiceResult<T> = Result<T, ServerRegistryServiceError>;

/// Scoped server registry orchestration service.
#[derive(Clone)]
pub struct ServerRegistryService<R, C>
where
    R: ServerRegistryRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> ServerRegistryService<R, C>
where
    R: ServerRegistryRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new registry service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    async fn find_server_or_error(
        &self,
        server_id: ServerId,
    ) -> ServerRegistryServiceResult<ServerRegistration> {
        self.repository
            .find_by_id(server_id)
            .await?
            .ok_or(ServerRegistryServiceError::NotFound(server_id))
    }

    /// Registers a new server.
    ///
    /// Visibility defaults to global when no owning organization is given and
    /// to private otherwise.
    ///
    /// # Errors
    ///
    /// Returns domain errors for invalid names or an unowned hidden scope, and
    /// [`ServerRegistryError::Conflict`] when the name is taken in a target
    /// namespace.
    pub async fn register(
        &self,
        request: RegisterServerRequest,
    ) -> ServerRegistryServiceResult<ServerRegistration> {
        let name = ServerName::new(request.name)?;
        let scope = RegistrationScope::new(&name, request.org_id, request.is_global)?;
        let registration = ServerRegistration::new(name, scope, request.endpoint, &*self.clock);

        self.repository
            .insert(&registration)
            .await
            .inspect_err(log_write_failure)?;

        info!(
            server_id = %registration.id(),
            name = %registration.name(),
            org_id = ?registration.org_id(),
            is_global = registration.is_global(),
            "registered server"
        );
        Ok(registration)
    }

    /// Resolves the registration a caller from `org_id` reaches under `name`.
    ///
    /// The caller's own entry takes precedence over a global entry of the
    /// same name.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryServiceError::Unresolved`] when nothing
    /// matches, domain errors for invalid names, and persistence errors.
    pub async fn resolve(
        &self,
        name: &str,
        org_id: Option<OrgId>,
    ) -> ServerRegistryServiceResult<ServerRegistration> {
        let validated_name = ServerName::new(name)?;
        let resolved = self.repository.resolve(&validated_name, org_id).await?;

        match resolved {
            Some(registration) => {
                debug!(
                    name = %validated_name,
                    org_id = ?org_id,
                    server_id = %registration.id(),
                    "resolved server"
                );
                Ok(registration)
            }
            None => Err(ServerRegistryServiceError::Unresolved {
                name: validated_name,
                org_id,
            }),
        }
    }

    /// Applies a multi-field update to a registration.
    ///
    /// The changes are applied by the repository to the state current at
    /// write time and validated as a whole. Nothing is written when any part
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryServiceError::NotFound`] when the registration
    /// does not exist, domain errors for an invalid name or scope, and
    /// [`ServerRegistryError::Conflict`] when the new name or scope collides.
    pub async fn update(
        &self,
        server_id: ServerId,
        request: UpdateServerRequest,
    ) -> ServerRegistryServiceResult<ServerRegistration> {
        let changes = request.into_changes()?;
        if changes.is_empty() {
            debug!(server_id = %server_id, "update without changes");
            return self.find_server_or_error(server_id).await;
        }

        let server = self
            .repository
            .update(server_id, &changes, self.clock.utc())
            .await
            .map_err(|err| match err {
                ServerRegistryError::NotFound(id) => ServerRegistryServiceError::NotFound(id),
                ServerRegistryError::Rejected(domain) => ServerRegistryServiceError::Domain(domain),
                other => {
                    log_write_failure(&other);
                    ServerRegistryServiceError::Repository(other)
                }
            })?;

        info!(
            server_id = %server.id(),
            name = %server.name(),
            org_id = ?server.org_id(),
            is_global = server.is_global(),
            "updated server"
        );
        Ok(server)
    }

    /// Removes a registration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryServiceError::NotFound`] when the registration
    /// does not exist, or persistence errors.
    pub async fn remove(&self, server_id: ServerId) -> ServerRegistryServiceResult<()> {
        self.repository
            .remove(server_id)
            .await
            .map_err(|err| match err {
                ServerRegistryError::NotFound(id) => ServerRegistryServiceError::NotFound(id),
                other => ServerRegistryServiceError::Repository(other),
            })?;
        info!(server_id = %server_id, "removed server");
        Ok(())
    }

    /// Lists registrations visible to `org_id`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns persistence-layer errors from the repository.
    pub async fn list_by_scope(
        &self,
        org_id: Option<OrgId>,
    ) -> ServerRegistryServiceResult<Vec<ServerRegistration>> {
        Ok(self.repository.list_visible(org_id).await?)
    }

    /// Finds a registration by identifier.
    ///
    /// # Errors
    ///
    /// Returns persistence-layer errors from the repository.
    pub async fn find_by_id(
        &self,
        server_id: ServerId,
    ) -> ServerRegistryServiceResult<Option<ServerRegistration>> {
        Ok(self.repository.find_by_id(server_id).await?)
    }

    /// Lists every registration regardless of scope.
    ///
    /// # Errors
    ///
    /// Returns persistence-layer errors from the repository.
    pub async fn list_all(&self) -> ServerRegistryServiceResult<Vec<ServerRegistration>> {
        Ok(self.repository.list_all().await?)
    }
}

fn log_write_failure(err: &ServerRegistryError) {
    if let ServerRegistryError::Conflict { namespace, name } = err {
        warn!(name = %name, namespace = %namespace, "server name conflict");
    }
}

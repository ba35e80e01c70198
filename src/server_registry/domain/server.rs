//! Server registration aggregate root.

use super::{
    OrgId, RegistrationScope, ServerEndpoint, ServerId, ServerName, ServerRegistryDomainError,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Requested change to the owning organization of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerChange {
    /// Leave the owner untouched.
    #[default]
    Keep,
    /// Transfer ownership to the given organization.
    Set(OrgId),
    /// Remove ownership; the entry becomes unowned.
    Clear,
}

/// Validated field changes for a stored registration.
///
/// Fields left unset keep their stored value. Stores apply the changes to the
/// state current at write time, so concurrent changes to different fields
/// all take effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerChanges {
    /// New name.
    pub name: Option<ServerName>,
    /// Ownership change.
    pub owner: OwnerChange,
    /// New global visibility.
    pub is_global: Option<bool>,
    /// Replacement connection payload.
    pub endpoint: Option<ServerEndpoint>,
}

impl ServerChanges {
    /// Returns whether no field would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && !self.touches_scope() && self.endpoint.is_none()
    }

    /// Returns whether ownership or visibility changes.
    #[must_use]
    pub fn touches_scope(&self) -> bool {
        self.owner != OwnerChange::Keep || self.is_global.is_some()
    }
}

/// External server registration aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRegistration {
    id: ServerId,
    name: ServerName,
    scope: RegistrationScope,
    endpoint: ServerEndpoint,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing persisted registration state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedServerData {
    /// Persisted server identifier.
    pub id: ServerId,
    /// Persisted server name.
    pub name: ServerName,
    /// Persisted ownership and visibility.
    pub scope: RegistrationScope,
    /// Persisted connection payload.
    pub endpoint: ServerEndpoint,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ServerRegistration {
    /// Creates a new registration.
    #[must_use]
    pub fn new(
        name: ServerName,
        scope: RegistrationScope,
        endpoint: ServerEndpoint,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ServerId::new(),
            name,
            scope,
            endpoint,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a registration from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedServerData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            scope: data.scope,
            endpoint: data.endpoint,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the server identifier.
    #[must_use]
    pub const fn id(&self) -> ServerId {
        self.id
    }

    /// Returns the validated server name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns ownership and visibility.
    #[must_use]
    pub const fn scope(&self) -> RegistrationScope {
        self.scope
    }

    /// Returns the owning organization, if any.
    #[must_use]
    pub const fn org_id(&self) -> Option<OrgId> {
        self.scope.org_id()
    }

    /// Returns whether the registration is visible to every tenant.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.scope.is_global()
    }

    /// Returns the connection payload.
    #[must_use]
    pub const fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies `changes` to the current state and stamps `updated_at`.
    ///
    /// When `changes.is_global` is `None` the current flag is kept, except
    /// that an entry left without an owner falls back to global.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryDomainError::InvalidScope`] when the resulting
    /// entry would be unowned and hidden. The registration is unchanged on
    /// error.
    pub fn apply_changes(
        &mut self,
        changes: &ServerChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ServerRegistryDomainError> {
        let name = changes.name.clone().unwrap_or_else(|| self.name.clone());
        let scope = if changes.touches_scope() {
            let org_id = match changes.owner {
                OwnerChange::Keep => self.scope.org_id(),
                OwnerChange::Set(owner) => Some(owner),
                OwnerChange::Clear => None,
            };
            let global = changes
                .is_global
                .unwrap_or(org_id.is_none() || self.scope.is_global());
            RegistrationScope::validated(&name, org_id, global)?
        } else {
            self.scope
        };

        if let Some(endpoint) = &changes.endpoint {
            self.endpoint = endpoint.clone();
        }
        self.name = name;
        self.scope = scope;
        self.updated_at = updated_at;
        Ok(())
    }
}

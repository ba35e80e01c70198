//! Visibility scope and uniqueness namespaces for server registrations.

use super::{OrgId, ServerName, ServerRegistryDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ownership and visibility of a registration.
///
/// `org_id` and `is_global` are independent: a tenant-owned entry may also be
/// global. An entry without an owner is always global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationScope {
    org_id: Option<OrgId>,
    is_global: bool,
}

impl RegistrationScope {
    /// Builds a scope from optional ownership and visibility inputs.
    ///
    /// `is_global` defaults to `true` when no organization is given and to
    /// `false` (tenant-private) when one is.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRegistryDomainError::InvalidScope`] when `org_id` is
    /// absent and `is_global` is explicitly `false`.
    pub fn new(
        name: &ServerName,
        org_id: Option<OrgId>,
        is_global: Option<bool>,
    ) -> Result<Self, ServerRegistryDomainError> {
        let resolved_global = is_global.unwrap_or(org_id.is_none());
        Self::validated(name, org_id, resolved_global)
    }

    /// Visible to every tenant and owned by none.
    #[must_use]
    pub const fn global() -> Self {
        Self {
            org_id: None,
            is_global: true,
        }
    }

    /// Owned by `org_id` and visible only to it.
    #[must_use]
    pub const fn private_to(org_id: OrgId) -> Self {
        Self {
            org_id: Some(org_id),
            is_global: false,
        }
    }

    /// Owned by `org_id` and visible to every tenant.
    #[must_use]
    pub const fn shared_by(org_id: OrgId) -> Self {
        Self {
            org_id: Some(org_id),
            is_global: true,
        }
    }

    pub(crate) fn validated(
        name: &ServerName,
        org_id: Option<OrgId>,
        is_global: bool,
    ) -> Result<Self, ServerRegistryDomainError> {
        if org_id.is_none() && !is_global {
            return Err(ServerRegistryDomainError::InvalidScope {
                name: name.as_str().to_owned(),
            });
        }
        Ok(Self { org_id, is_global })
    }

    /// Returns the owning organization, if any.
    #[must_use]
    pub const fn org_id(&self) -> Option<OrgId> {
        self.org_id
    }

    /// Returns whether the entry is visible to every tenant.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.is_global
    }

    /// Returns whether `org_id` owns this entry.
    #[must_use]
    pub fn is_owned_by(&self, org_id: Option<OrgId>) -> bool {
        org_id.is_some() && self.org_id == org_id
    }

    /// Returns whether a caller from `org_id` can see this entry.
    #[must_use]
    pub fn is_visible_to(&self, org_id: Option<OrgId>) -> bool {
        self.is_global || self.is_owned_by(org_id)
    }

    /// Returns the uniqueness namespaces this scope occupies.
    #[must_use]
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces = Vec::with_capacity(2);
        if self.is_global {
            namespaces.push(Namespace::Global);
        }
        if let Some(org_id) = self.org_id {
            namespaces.push(Namespace::Tenant(org_id));
        }
        namespaces
    }
}

/// A uniqueness domain for server names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "org_id")]
pub enum Namespace {
    /// The flat namespace shared by every global registration.
    Global,
    /// The namespace of a single organization's owned registrations.
    Tenant(OrgId),
}

impl fmt::Display for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => formatter.write_str("global namespace"),
            Self::Tenant(org_id) => write!(formatter, "namespace of organization {org_id}"),
        }
    }
}

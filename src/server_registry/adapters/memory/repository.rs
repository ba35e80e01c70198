//! In-memory repository for scoped server registrations.

use crate::server_registry::{
    domain::{
        Namespace, OrgId, ServerChanges, ServerId, ServerName, ServerRegistration,
        resolve_candidate, sort_for_presentation,
    },
    ports::{ServerRegistryError, ServerRegistryRepository, ServerRegistryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory server registry repository.
///
/// A single lock guards the registrations and the namespace index, so every
/// check-and-write runs as one critical section.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerRegistry {
    state: Arc<RwLock<InMemoryRegistryState>>,
}

#[derive(Debug, Default)]
struct InMemoryRegistryState {
    servers: HashMap<ServerId, ServerRegistration>,
    namespace_index: HashMap<(Namespace, ServerName), ServerId>,
}

impl InMemoryRegistryState {
    fn check_namespaces(&self, server: &ServerRegistration) -> ServerRegistryResult<()> {
        for namespace in server.scope().namespaces() {
            let key = (namespace, server.name().clone());
            if let Some(&holder) = self.namespace_index.get(&key)
                && holder != server.id()
            {
                return Err(ServerRegistryError::Conflict {
                    namespace,
                    name: server.name().clone(),
                });
            }
        }
        Ok(())
    }

    fn index(&mut self, server: &ServerRegistration) {
        for namespace in server.scope().namespaces() {
            self.namespace_index
                .insert((namespace, server.name().clone()), server.id());
        }
    }

    fn unindex(&mut self, server: &ServerRegistration) {
        for namespace in server.scope().namespaces() {
            self.namespace_index
                .remove(&(namespace, server.name().clone()));
        }
    }
}

impl InMemoryServerRegistry {
    /// Creates an empty in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> ServerRegistryResult<RwLockReadGuard<'_, InMemoryRegistryState>> {
        self.state.read().map_err(|err| {
            ServerRegistryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(&self) -> ServerRegistryResult<RwLockWriteGuard<'_, InMemoryRegistryState>> {
        self.state.write().map_err(|err| {
            ServerRegistryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl ServerRegistryRepository for InMemoryServerRegistry {
    async fn insert(&self, server: &ServerRegistration) -> ServerRegistryResult<()> {
        let mut state = self.write_state()?;

        if state.servers.contains_key(&server.id()) {
            return Err(ServerRegistryError::DuplicateServer(server.id()));
        }
        state.check_namespaces(server)?;

        state.index(server);
        state.servers.insert(server.id(), server.clone());
        Ok(())
    }

    async fn update(
        &self,
        server_id: ServerId,
        changes: &ServerChanges,
        updated_at: DateTime<Utc>,
    ) -> ServerRegistryResult<ServerRegistration> {
        let mut state = self.write_state()?;

        let stored = state
            .servers
            .get(&server_id)
            .cloned()
            .ok_or(ServerRegistryError::NotFound(server_id))?;
        let mut changed = stored.clone();
        changed
            .apply_changes(changes, updated_at)
            .map_err(ServerRegistryError::Rejected)?;
        state.check_namespaces(&changed)?;

        state.unindex(&stored);
        state.index(&changed);
        state.servers.insert(server_id, changed.clone());
        Ok(changed)
    }

    async fn remove(&self, server_id: ServerId) -> ServerRegistryResult<()> {
        let mut state = self.write_state()?;

        let removed = state
            .servers
            .remove(&server_id)
            .ok_or(ServerRegistryError::NotFound(server_id))?;
        state.unindex(&removed);
        Ok(())
    }

    async fn find_by_id(
        &self,
        server_id: ServerId,
    ) -> ServerRegistryResult<Option<ServerRegistration>> {
        let state = self.read_state()?;
        Ok(state.servers.get(&server_id).cloned())
    }

    async fn resolve(
        &self,
        name: &ServerName,
        org_id: Option<OrgId>,
    ) -> ServerRegistryResult<Option<ServerRegistration>> {
        let state = self.read_state()?;
        let tenant_key = org_id.map(|org| (Namespace::Tenant(org), name.clone()));
        let global_key = (Namespace::Global, name.clone());
        let candidates = tenant_key
            .iter()
            .chain(std::iter::once(&global_key))
            .filter_map(|key| state.namespace_index.get(key))
            .filter_map(|id| state.servers.get(id))
            .cloned()
            .collect::<Vec<_>>();
        Ok(resolve_candidate(candidates, name, org_id))
    }

    async fn list_visible(
        &self,
        org_id: Option<OrgId>,
    ) -> ServerRegistryResult<Vec<ServerRegistration>> {
        let state = self.read_state()?;
        let mut visible = state
            .servers
            .values()
            .filter(|server| server.scope().is_visible_to(org_id))
            .cloned()
            .collect::<Vec<_>>();
        sort_for_presentation(&mut visible, org_id);
        Ok(visible)
    }

    async fn list_all(&self) -> ServerRegistryResult<Vec<ServerRegistration>> {
        let state = self.read_state()?;
        let mut servers = state.servers.values().cloned().collect::<Vec<_>>();
        sort_for_presentation(&mut servers, None);
        Ok(servers)
    }
}

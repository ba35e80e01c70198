//! Shared test helpers for in-memory registry integration tests.

use hybrid_registry::server_registry::{
    adapters::memory::InMemoryServerRegistry,
    domain::{ServerEndpoint, ServerRegistryDomainError, ServerRegistration},
    services::{RegisterServerRequest, ServerRegistryService},
};
use mockable::DefaultClock;
use rstest::fixture;
use std::collections::HashSet;
use std::sync::Arc;

/// Registry service over the in-memory adapter.
pub type TestService = ServerRegistryService<InMemoryServerRegistry, DefaultClock>;

/// Provides a fresh registry service for each test.
#[fixture]
pub fn service() -> Arc<TestService> {
    Arc::new(ServerRegistryService::new(
        Arc::new(InMemoryServerRegistry::new()),
        Arc::new(DefaultClock),
    ))
}

/// Builds an unowned registration request with a STDIO endpoint.
///
/// # Errors
///
/// Returns an error if the endpoint command is rejected.
pub fn stdio_request(
    name: &str,
    command: &str,
) -> Result<RegisterServerRequest, ServerRegistryDomainError> {
    Ok(RegisterServerRequest::new(
        name,
        ServerEndpoint::stdio(command)?,
    ))
}

/// Returns the first namespace violation found in `servers`, if any.
///
/// A violation is two global entries sharing a name, or two entries owned by
/// the same organization sharing a name.
#[must_use]
pub fn namespace_violation(servers: &[ServerRegistration]) -> Option<String> {
    let mut global_names = HashSet::new();
    let mut owned_names = HashSet::new();
    for server in servers {
        let name = server.name().as_str();
        if server.is_global() && !global_names.insert(name) {
            return Some(format!("two global entries named '{name}'"));
        }
        if let Some(org_id) = server.org_id()
            && !owned_names.insert((org_id, name))
        {
            return Some(format!("organization {org_id} owns two entries named '{name}'"));
        }
    }
    None
}

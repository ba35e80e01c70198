//! Namespace uniqueness under concurrent registration and update.

use crate::in_memory::helpers::{TestService, namespace_violation, service, stdio_request};
use hybrid_registry::server_registry::{
    domain::{Namespace, OrgId},
    ports::ServerRegistryError,
    services::{ServerRegistryServiceError, UpdateServerRequest},
};
use rstest::rstest;
use std::sync::Arc;

const NAMES: [&str; 3] = ["search", "fetch", "docs"];

fn is_conflict(error: &ServerRegistryServiceError) -> bool {
    matches!(
        error,
        ServerRegistryServiceError::Repository(ServerRegistryError::Conflict { .. })
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn mixed_concurrent_registrations_respect_every_namespace(service: Arc<TestService>) {
    let orgs = [OrgId::new(), OrgId::new()];
    let mut handles = Vec::new();
    for round in 0..4 {
        for name in NAMES {
            for (slot, org_id) in orgs.iter().copied().enumerate() {
                let shared = Arc::clone(&service);
                let publish = (round + slot).is_multiple_of(2);
                handles.push(tokio::spawn(async move {
                    let request = stdio_request(name, "tool-server")
                        .expect("valid request")
                        .owned_by(org_id)
                        .with_global(publish);
                    shared.register(request).await
                }));
            }
            let shared = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                shared
                    .register(stdio_request(name, "tool-server").expect("valid request"))
                    .await
            }));
        }
    }

    for handle in handles {
        let outcome = handle.await.expect("task should not panic");
        if let Err(error) = outcome {
            assert!(is_conflict(&error), "unexpected failure: {error:?}");
        }
    }

    let servers = service.list_all().await.expect("listing");
    assert_eq!(namespace_violation(&servers), None);
    for name in NAMES {
        let globals = servers
            .iter()
            .filter(|server| server.name().as_str() == name && server.is_global())
            .count();
        assert_eq!(globals, 1, "exactly one global entry named {name}");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_publishing_admits_one_global_entry(service: Arc<TestService>) {
    let mut ids = Vec::new();
    for _ in 0..6 {
        let private = service
            .register(
                stdio_request("search", "tool-server")
                    .expect("valid request")
                    .owned_by(OrgId::new()),
            )
            .await
            .expect("private registration");
        ids.push(private.id());
    }

    let handles = ids
        .into_iter()
        .map(|id| {
            let shared = Arc::clone(&service);
            tokio::spawn(async move {
                shared
                    .update(id, UpdateServerRequest::new().set_global(true))
                    .await
            })
        })
        .collect::<Vec<_>>();
    let mut published = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(_) => published += 1,
            Err(ServerRegistryServiceError::Repository(ServerRegistryError::Conflict {
                namespace,
                ..
            })) => assert_eq!(namespace, Namespace::Global),
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    assert_eq!(published, 1);
    let servers = service.list_all().await.expect("listing");
    assert_eq!(namespace_violation(&servers), None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_renames_into_one_name_admit_one(service: Arc<TestService>) {
    let owner = OrgId::new();
    let mut ids = Vec::new();
    for index in 0..5 {
        let registered = service
            .register(
                stdio_request(&format!("tool_{index}"), "tool-server")
                    .expect("valid request")
                    .owned_by(owner),
            )
            .await
            .expect("registration");
        ids.push(registered.id());
    }

    let handles = ids
        .into_iter()
        .map(|id| {
            let shared = Arc::clone(&service);
            tokio::spawn(async move {
                shared
                    .update(id, UpdateServerRequest::new().rename("search"))
                    .await
            })
        })
        .collect::<Vec<_>>();
    let mut renamed = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(_) => renamed += 1,
            Err(error) => assert!(is_conflict(&error), "unexpected failure: {error:?}"),
        }
    }

    assert_eq!(renamed, 1);
    let servers = service.list_by_scope(Some(owner)).await.expect("listing");
    assert_eq!(servers.len(), 5);
    assert_eq!(namespace_violation(&servers), None);
}

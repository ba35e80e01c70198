//! Resolution precedence and visibility through the public service API.

use crate::in_memory::helpers::{TestService, service, stdio_request};
use hybrid_registry::server_registry::{
    domain::{OrgId, ServerEndpoint},
    services::{ServerRegistryServiceError, UpdateServerRequest},
};
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn each_tenant_reaches_its_own_entry_before_the_global_one(service: Arc<TestService>) {
    let (t1, t2, t3) = (OrgId::new(), OrgId::new(), OrgId::new());
    let global = service
        .register(stdio_request("search", "global-search").expect("valid request"))
        .await
        .expect("global registration");
    let first = service
        .register(
            stdio_request("search", "t1-search")
                .expect("valid request")
                .owned_by(t1),
        )
        .await
        .expect("t1 registration");
    let second = service
        .register(
            stdio_request("search", "t2-search")
                .expect("valid request")
                .owned_by(t2),
        )
        .await
        .expect("t2 registration");

    let cases = [
        (Some(t1), first.id()),
        (Some(t2), second.id()),
        (Some(t3), global.id()),
        (None, global.id()),
    ];
    for (caller, expected) in cases {
        let resolved = service
            .resolve("search", caller)
            .await
            .expect("name should resolve");
        assert_eq!(resolved.id(), expected, "caller {caller:?}");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn private_entries_stay_invisible_to_other_tenants(service: Arc<TestService>) {
    let (owner, stranger) = (OrgId::new(), OrgId::new());
    service
        .register(
            stdio_request("billing", "billing-server")
                .expect("valid request")
                .owned_by(owner),
        )
        .await
        .expect("private registration");

    let result = service.resolve("billing", Some(stranger)).await;

    assert!(matches!(
        result,
        Err(ServerRegistryServiceError::Unresolved { org_id, .. }) if org_id == Some(stranger)
    ));
    assert!(
        service
            .list_by_scope(Some(stranger))
            .await
            .expect("listing")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shared_tenant_entry_is_visible_to_everyone(service: Arc<TestService>) {
    let (owner, other) = (OrgId::new(), OrgId::new());
    let shared = service
        .register(
            stdio_request("docs", "docs-server")
                .expect("valid request")
                .owned_by(owner)
                .with_global(true),
        )
        .await
        .expect("shared registration");

    for caller in [Some(owner), Some(other), None] {
        let resolved = service
            .resolve("docs", caller)
            .await
            .expect("shared entry resolves");
        assert_eq!(resolved.id(), shared.id());
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unpublishing_hides_entry_from_other_tenants(service: Arc<TestService>) {
    let (owner, other) = (OrgId::new(), OrgId::new());
    let shared = service
        .register(
            stdio_request("docs", "docs-server")
                .expect("valid request")
                .owned_by(owner)
                .with_global(true),
        )
        .await
        .expect("shared registration");

    let hidden = service
        .update(shared.id(), UpdateServerRequest::new().set_global(false))
        .await
        .expect("unpublish");

    assert!(!hidden.is_global());
    assert!(service.resolve("docs", Some(other)).await.is_err());
    assert_eq!(
        service
            .resolve("docs", Some(owner))
            .await
            .expect("owner still resolves")
            .id(),
        shared.id()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn endpoint_replacement_keeps_identity_and_scope(service: Arc<TestService>) {
    let owner = OrgId::new();
    let registered = service
        .register(
            stdio_request("search", "search-v1")
                .expect("valid request")
                .owned_by(owner),
        )
        .await
        .expect("registration");
    let endpoint = ServerEndpoint::http("https://search.example.com").expect("valid endpoint");

    let updated = service
        .update(
            registered.id(),
            UpdateServerRequest::new().replace_endpoint(endpoint.clone()),
        )
        .await
        .expect("endpoint update");

    assert_eq!(updated.id(), registered.id());
    assert_eq!(updated.endpoint(), &endpoint);
    assert_eq!(updated.scope(), registered.scope());
    assert!(updated.updated_at() >= registered.updated_at());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listing_without_organization_returns_only_global_entries(service: Arc<TestService>) {
    let owner = OrgId::new();
    service
        .register(stdio_request("zeta", "zeta-server").expect("valid request"))
        .await
        .expect("global registration");
    service
        .register(
            stdio_request("alpha", "alpha-server")
                .expect("valid request")
                .owned_by(owner),
        )
        .await
        .expect("private registration");
    service
        .register(
            stdio_request("beta", "beta-server")
                .expect("valid request")
                .owned_by(owner)
                .with_global(true),
        )
        .await
        .expect("shared registration");

    let listed = service.list_by_scope(None).await.expect("listing");
    let names = listed
        .iter()
        .map(|server| server.name().as_str())
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["beta", "zeta"]);
}

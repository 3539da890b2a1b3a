// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests against a real Kubernetes cluster.
//!
//! Cloud DNS is replaced by an in-memory zone; the Kubernetes side (watch,
//! list, annotation updates with optimistic concurrency) is real.
//!
//! Run with: cargo test --test cluster_integration -- --ignored

mod common;

use cloud_dns_sync::constants::{ANNOTATION_ENABLED, ANNOTATION_HOSTNAMES, ANNOTATION_STATE};
use cloud_dns_sync::reconciler::{reconcile, Initiator, ReconcileStatus};
use cloud_dns_sync::resource::{KubeResourceClient, ResourceClient};
use cloud_dns_sync::state::DnsSyncState;
use common::{create_test_namespace, delete_test_namespace, get_kube_client_or_skip, RecordingDns};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::client::Client;
use serde_json::json;
use std::collections::BTreeMap;

const TEST_IP: &str = "203.0.113.10";

/// Create an annotated `LoadBalancer` Service and fake its assigned IP
async fn create_load_balancer_service(
    client: &Client,
    namespace: &str,
    name: &str,
    hostnames: &str,
) -> Result<Service, Box<dyn std::error::Error>> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);

    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_ENABLED.to_string(), "true".to_string());
    annotations.insert(ANNOTATION_HOSTNAMES.to_string(), hostnames.to_string());

    let svc = Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            ports: Some(vec![ServicePort {
                port: 80,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };
    api.create(&PostParams::default(), &svc).await?;
    println!("✓ Created Service {namespace}/{name}");

    // No cloud controller in test clusters, so write the load-balancer status ourselves
    let status = json!({ "status": { "loadBalancer": { "ingress": [{ "ip": TEST_IP }] } } });
    let svc = api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&status))
        .await?;
    println!("✓ Assigned load-balancer IP {TEST_IP}");

    Ok(svc)
}

#[tokio::test]
#[ignore] // Run with: cargo test --test cluster_integration -- --ignored
async fn test_service_reconciliation_writes_state_annotation() {
    println!("\n=== Test: Service Reconciliation ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "cloud-dns-sync-integration";
    create_test_namespace(&client, namespace)
        .await
        .expect("Failed to create namespace");

    let svc = create_load_balancer_service(&client, namespace, "web", "web.example.com")
        .await
        .expect("Failed to create service");

    let dns = RecordingDns::default();
    let services = KubeResourceClient::<Service>::new(client.clone());

    let status = reconcile(svc, Initiator::Poller, &dns, &services)
        .await
        .expect("Reconciliation failed");
    assert_eq!(status, ReconcileStatus::Succeeded);

    let record = dns.record("web.example.com.").expect("A record missing");
    assert_eq!(record.rrdatas, vec![TEST_IP.to_string()]);
    println!("✓ A record written for web.example.com.");

    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let updated = api.get("web").await.expect("Failed to get service");
    let raw = updated
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_STATE))
        .expect("State annotation missing")
        .clone();
    let recorded: DnsSyncState = serde_json::from_str(&raw).expect("Invalid state annotation");
    assert_eq!(recorded.hostnames, "web.example.com");
    assert_eq!(recorded.ip_address, TEST_IP);
    println!("✓ State annotation recorded: {raw}");

    // Second pass over the fresh object is a no-op
    let status = reconcile(updated, Initiator::Poller, &dns, &services)
        .await
        .expect("Second reconciliation failed");
    assert_eq!(status, ReconcileStatus::Skipped);
    assert_eq!(dns.change_count(), 1);

    delete_test_namespace(&client, namespace).await;
    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_stale_resource_version_update_is_rejected() {
    println!("\n=== Test: Stale resourceVersion ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "cloud-dns-sync-conflict";
    create_test_namespace(&client, namespace)
        .await
        .expect("Failed to create namespace");

    let stale = create_load_balancer_service(&client, namespace, "api", "api.example.com")
        .await
        .expect("Failed to create service");

    // Bump the resourceVersion behind the stale copy's back
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let bump = json!({ "metadata": { "labels": { "touched": "true" } } });
    api.patch("api", &PatchParams::default(), &Patch::Merge(&bump))
        .await
        .expect("Failed to patch service");

    let services = KubeResourceClient::<Service>::new(client.clone());
    match services.update(&stale).await {
        Err(kube::Error::Api(ae)) => {
            assert_eq!(ae.code, 409);
            println!("✓ Stale update rejected with 409 Conflict");
        }
        other => panic!("Expected a conflict, got {other:?}"),
    }

    delete_test_namespace(&client, namespace).await;
    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_list_returns_services_from_all_namespaces() {
    println!("\n=== Test: List Services ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let services = KubeResourceClient::<Service>::new(client);
    let listed = services.list().await.expect("Failed to list services");

    // Every cluster has the kubernetes Service in the default namespace
    assert!(listed
        .iter()
        .any(|s| s.metadata.name.as_deref() == Some("kubernetes")));
    println!("✓ Listed {} services", listed.len());

    println!("\n✓ Test passed\n");
}

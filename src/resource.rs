// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kind polymorphism for the watched resources.
//!
//! [`SyncResource`] is the capability the reconciler needs from a Service or an
//! Ingress: read annotations, read and write the state annotation, and report
//! the assigned load-balancer IPs. [`ResourceClient`] is the Kubernetes side:
//! watch, list and update one kind across all namespaces.

use crate::constants::{
    ANNOTATION_STATE, KIND_INGRESS, KIND_SERVICE, SERVICE_TYPE_LOAD_BALANCER, WATCH_TIMEOUT_SECS,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, PostParams, WatchEvent, WatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;

/// A namespaced resource kind whose annotations drive DNS sync.
pub trait SyncResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Label used for the `type` metric label and in logs.
    const KIND: &'static str;

    /// Value of an annotation, if set.
    fn annotation(&self, key: &str) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    /// Raw JSON of the last applied state.
    fn state_annotation(&self) -> Option<&str> {
        self.annotation(ANNOTATION_STATE)
    }

    /// Store the JSON of the applied state on the resource (in memory only).
    fn set_state_annotation(&mut self, state: String) {
        self.annotations_mut()
            .insert(ANNOTATION_STATE.to_string(), state);
    }

    /// External IPs assigned by the load balancer, in status order.
    fn assigned_ips(&self) -> Vec<String>;
}

impl SyncResource for Service {
    const KIND: &'static str = KIND_SERVICE;

    fn assigned_ips(&self) -> Vec<String> {
        let is_load_balancer = self
            .spec
            .as_ref()
            .and_then(|spec| spec.type_.as_deref())
            == Some(SERVICE_TYPE_LOAD_BALANCER);

        if !is_load_balancer {
            return Vec::new();
        }

        self.status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .map(|ingress| ingress.iter().filter_map(|i| i.ip.clone()).collect())
            .unwrap_or_default()
    }
}

impl SyncResource for Ingress {
    const KIND: &'static str = KIND_INGRESS;

    fn assigned_ips(&self) -> Vec<String> {
        self.status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .map(|ingress| ingress.iter().filter_map(|i| i.ip.clone()).collect())
            .unwrap_or_default()
    }
}

/// Stream of watch events for one kind.
pub type WatchStream<R> = BoxStream<'static, Result<WatchEvent<R>, kube::Error>>;

/// Kubernetes operations the trigger loops and the reconciler need.
#[async_trait]
pub trait ResourceClient<R: SyncResource>: Send + Sync {
    /// Open a cluster-wide watch.
    async fn watch(&self) -> Result<WatchStream<R>, kube::Error>;

    /// List every resource of the kind across all namespaces.
    async fn list(&self) -> Result<Vec<R>, kube::Error>;

    /// Replace the resource, relying on its `resourceVersion` for conflicts.
    async fn update(&self, resource: &R) -> Result<(), kube::Error>;
}

/// [`ResourceClient`] backed by the Kubernetes API.
pub struct KubeResourceClient<R> {
    client: Client,
    _kind: PhantomData<fn() -> R>,
}

impl<R> KubeResourceClient<R> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<R> Clone for KubeResourceClient<R> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

#[async_trait]
impl<R: SyncResource> ResourceClient<R> for KubeResourceClient<R> {
    async fn watch(&self) -> Result<WatchStream<R>, kube::Error> {
        let api: Api<R> = Api::all(self.client.clone());
        let params = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);
        let stream = api.watch(&params, "0").await?;
        Ok(stream.boxed())
    }

    async fn list(&self) -> Result<Vec<R>, kube::Error> {
        let api: Api<R> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn update(&self, resource: &R) -> Result<(), kube::Error> {
        let namespace = resource.namespace().unwrap_or_default();
        let api: Api<R> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&resource.name_any(), &PostParams::default(), resource)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Builders and in-memory fakes shared by the unit tests.

use crate::dns::types::{Change, ResourceRecordSet};
use crate::dns::DnsProvider;
use crate::errors::DnsError;
use crate::metrics::OutcomeRecorder;
use crate::resource::{ResourceClient, SyncResource, WatchStream};
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{
    LoadBalancerIngress, LoadBalancerStatus, Service, ServiceSpec, ServiceStatus,
};
use k8s_openapi::api::networking::v1::{
    Ingress, IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::WatchEvent;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn metadata(name: &str, namespace: &str, pairs: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        resource_version: Some("1".to_string()),
        annotations: Some(annotations(pairs)),
        ..Default::default()
    }
}

/// A `LoadBalancer` Service, with an assigned IP when `ip` is set.
pub fn service(name: &str, namespace: &str, pairs: &[(&str, &str)], ip: Option<&str>) -> Service {
    service_of_type("LoadBalancer", name, namespace, pairs, ip)
}

pub fn service_of_type(
    service_type: &str,
    name: &str,
    namespace: &str,
    pairs: &[(&str, &str)],
    ip: Option<&str>,
) -> Service {
    Service {
        metadata: metadata(name, namespace, pairs),
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            ..Default::default()
        }),
        status: Some(ServiceStatus {
            load_balancer: Some(LoadBalancerStatus {
                ingress: ip.map(|ip| {
                    vec![LoadBalancerIngress {
                        ip: Some(ip.to_string()),
                        ..Default::default()
                    }]
                }),
            }),
            ..Default::default()
        }),
    }
}

pub fn ingress(name: &str, namespace: &str, pairs: &[(&str, &str)], ip: Option<&str>) -> Ingress {
    Ingress {
        metadata: metadata(name, namespace, pairs),
        spec: None,
        status: Some(IngressStatus {
            load_balancer: Some(IngressLoadBalancerStatus {
                ingress: ip.map(|ip| {
                    vec![IngressLoadBalancerIngress {
                        ip: Some(ip.to_string()),
                        ..Default::default()
                    }]
                }),
            }),
        }),
    }
}

pub fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(kube::core::Status::failure(&format!("fake error {code}"), "Fake")
            .with_code(code)
            .boxed())
}

/// In-memory zone implementing [`DnsProvider`].
#[derive(Default)]
pub struct FakeDnsProvider {
    pub records: Mutex<Vec<ResourceRecordSet>>,
    pub changes: Mutex<Vec<Change>>,
    /// Hostname (fully qualified) whose change requests fail with HTTP 500
    pub fail_for: Mutex<Option<String>>,
}

impl FakeDnsProvider {
    pub fn failing_for(name: &str) -> Self {
        let fake = Self::default();
        *fake.fail_for.lock().unwrap() = Some(name.to_string());
        fake
    }

    /// Names of every record set added so far, in order.
    pub fn upserted(&self) -> Vec<(String, String, Vec<String>)> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .flat_map(|c| c.additions.iter())
            .map(|r| (r.name.clone(), r.record_type.clone(), r.rrdatas.clone()))
            .collect()
    }

    pub fn change_count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}

#[async_trait]
impl DnsProvider for FakeDnsProvider {
    async fn list_record_sets(
        &self,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ResourceRecordSet>, DnsError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name == name && r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn apply_change(&self, change: &Change) -> Result<(), DnsError> {
        let failing = self.fail_for.lock().unwrap().clone();
        if let Some(name) = failing {
            if change.additions.iter().any(|r| r.name == name) {
                return Err(DnsError::Api {
                    url: "fake://changes".to_string(),
                    status_code: 500,
                    message: "backend error".to_string(),
                });
            }
        }

        let mut records = self.records.lock().unwrap();
        records.retain(|r| !change.deletions.contains(r));
        records.extend(change.additions.iter().cloned());
        self.changes.lock().unwrap().push(change.clone());
        Ok(())
    }
}

/// Scripted [`ResourceClient`].
///
/// Each `watch()` call pops the next scripted session: `Err(code)` fails to
/// connect, `Ok(events)` yields the events and then ends the stream.
pub struct FakeResourceClient<R> {
    pub watch_sessions: Mutex<VecDeque<Result<Vec<WatchEvent<R>>, u16>>>,
    pub watch_calls: Mutex<usize>,
    pub list_result: Mutex<Result<Vec<R>, u16>>,
    pub list_calls: Mutex<usize>,
    pub updates: Mutex<Vec<R>>,
    pub update_error: Mutex<Option<u16>>,
}

impl<R> Default for FakeResourceClient<R> {
    fn default() -> Self {
        Self {
            watch_sessions: Mutex::new(VecDeque::new()),
            watch_calls: Mutex::new(0),
            list_result: Mutex::new(Ok(Vec::new())),
            list_calls: Mutex::new(0),
            updates: Mutex::new(Vec::new()),
            update_error: Mutex::new(None),
        }
    }
}

impl<R: Clone> FakeResourceClient<R> {
    pub fn with_list(items: Vec<R>) -> Self {
        let fake = Self::default();
        *fake.list_result.lock().unwrap() = Ok(items);
        fake
    }

    pub fn push_watch_session(&self, session: Result<Vec<WatchEvent<R>>, u16>) {
        self.watch_sessions.lock().unwrap().push_back(session);
    }

    pub fn fail_updates_with(&self, code: u16) {
        *self.update_error.lock().unwrap() = Some(code);
    }

    pub fn updates(&self) -> Vec<R> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last_update(&self) -> Option<R> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn watch_calls(&self) -> usize {
        *self.watch_calls.lock().unwrap()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl<R: SyncResource> ResourceClient<R> for FakeResourceClient<R> {
    async fn watch(&self) -> Result<WatchStream<R>, kube::Error> {
        *self.watch_calls.lock().unwrap() += 1;
        let session = self.watch_sessions.lock().unwrap().pop_front();

        match session {
            Some(Ok(events)) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            Some(Err(code)) => Err(api_error(code)),
            // Nothing scripted: a connection that never delivers anything
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn list(&self) -> Result<Vec<R>, kube::Error> {
        *self.list_calls.lock().unwrap() += 1;
        self.list_result.lock().unwrap().clone().map_err(api_error)
    }

    async fn update(&self, resource: &R) -> Result<(), kube::Error> {
        if let Some(code) = *self.update_error.lock().unwrap() {
            return Err(api_error(code));
        }
        self.updates.lock().unwrap().push(resource.clone());
        Ok(())
    }
}

/// Records every outcome in memory.
#[derive(Default)]
pub struct FakeRecorder {
    pub outcomes: Mutex<Vec<(String, String, String, String)>>,
    pub durations: Mutex<Vec<(String, Duration)>>,
}

impl FakeRecorder {
    /// `(namespace, status, initiator, type)` tuples in recording order.
    pub fn outcomes(&self) -> Vec<(String, String, String, String)> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl OutcomeRecorder for FakeRecorder {
    fn record_outcome(&self, namespace: &str, status: &str, initiator: &str, kind: &str) {
        self.outcomes.lock().unwrap().push((
            namespace.to_string(),
            status.to_string(),
            initiator.to_string(),
            kind.to_string(),
        ));
    }

    fn record_duration(&self, kind: &str, duration: Duration) {
        self.durations
            .lock()
            .unwrap()
            .push((kind.to_string(), duration));
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Trigger loops feeding resources into the reconciler.
//!
//! Three loops run concurrently for the lifetime of the process:
//!
//! - a watch loop for Services and one for Ingresses, reconciling every
//!   `ADDED`/`MODIFIED` event one at a time in arrival order
//! - a sweep loop listing all Services and then all Ingresses, as a safety net
//!   for missed watch events
//!
//! Each loop cycles through connecting, streaming and sleeping and never gives
//! up; failures are logged and retried after a jittered sleep. The loops share
//! no locks: a watch-triggered and a sweep-triggered reconciliation of the same
//! resource may overlap, and the `resourceVersion` check on update decides the
//! winner.

use crate::constants::{MIN_LOOP_INTERVAL_SECS, SWEEP_INTERVAL_BASE_SECS, WATCH_RETRY_BASE_SECS};
use crate::dns::DnsProvider;
use crate::jitter::JitteredInterval;
use crate::metrics::OutcomeRecorder;
use crate::reconciler::{reconcile, Initiator, ReconcileStatus};
use crate::resource::{ResourceClient, SyncResource};
use crate::shutdown::ReconcileTracker;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::WatchEvent;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Base intervals of the trigger loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Base sleep before reopening a failed or finished watch
    pub watch_retry: Duration,
    /// Base sleep between two sweeps
    pub sweep_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            watch_retry: Duration::from_secs(WATCH_RETRY_BASE_SECS),
            sweep_interval: Duration::from_secs(SWEEP_INTERVAL_BASE_SECS),
        }
    }
}

impl LoopSettings {
    /// Watch-retry base, never below one second.
    #[must_use]
    pub fn watch_retry_base(&self) -> Duration {
        self.watch_retry.max(Duration::from_secs(MIN_LOOP_INTERVAL_SECS))
    }

    /// Sweep base, never below one second.
    #[must_use]
    pub fn sweep_interval_base(&self) -> Duration {
        self.sweep_interval
            .max(Duration::from_secs(MIN_LOOP_INTERVAL_SECS))
    }
}

/// Shared state of the trigger loops.
pub struct Context {
    /// Cloud DNS gateway
    pub dns: Arc<dyn DnsProvider>,
    /// Outcome counters
    pub recorder: Arc<dyn OutcomeRecorder>,
    /// In-flight tracking and shutdown gate
    pub tracker: Arc<ReconcileTracker>,
    pub settings: LoopSettings,
}

/// Reconcile one resource, then log and count the outcome.
///
/// Returns `None` without reconciling once shutdown has started.
pub async fn process_resource<R: SyncResource>(
    ctx: &Context,
    client: &dyn ResourceClient<R>,
    resource: R,
    initiator: Initiator,
) -> Option<ReconcileStatus> {
    let Some(_in_flight) = ctx.tracker.try_begin() else {
        debug!(
            kind = R::KIND,
            name = %resource.name_any(),
            "Shutdown in progress, not starting reconciliation"
        );
        return None;
    };

    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();
    let start = Instant::now();

    let status = match reconcile(resource, initiator, ctx.dns.as_ref(), client).await {
        Ok(status) => status,
        Err(e) => {
            error!(
                kind = R::KIND,
                name = %name,
                namespace = %namespace,
                initiator = %initiator,
                reason = e.reason(),
                transient = e.is_transient(),
                error = %e,
                "Processing {} {}.{} failed",
                R::KIND,
                name,
                namespace
            );
            ReconcileStatus::Failed
        }
    };

    ctx.recorder
        .record_outcome(&namespace, status.as_str(), initiator.label(), R::KIND);
    ctx.recorder.record_duration(R::KIND, start.elapsed());

    Some(status)
}

/// Sleep for a jittered interval; returns `false` if shutdown started first.
async fn sleep_unless_closed(ctx: &Context, interval: &JitteredInterval, kind: &str) -> bool {
    let sleep = interval.next_sleep();
    info!(
        kind,
        sleep_secs = sleep.as_secs_f64(),
        "Sleeping for {:.1} seconds...",
        sleep.as_secs_f64()
    );

    tokio::select! {
        () = ctx.tracker.closed() => false,
        () = tokio::time::sleep(sleep) => true,
    }
}

/// Watch one kind across all namespaces until shutdown.
pub async fn run_watch_loop<R: SyncResource>(ctx: Arc<Context>, client: Arc<dyn ResourceClient<R>>) {
    let retry = JitteredInterval::new(ctx.settings.watch_retry_base());
    info!(kind = R::KIND, "Starting watch loop");

    loop {
        let connected = tokio::select! {
            () = ctx.tracker.closed() => break,
            result = client.watch() => result,
        };

        match connected {
            Ok(mut stream) => loop {
                let next = tokio::select! {
                    () = ctx.tracker.closed() => {
                        info!(kind = R::KIND, "Watch loop stopped");
                        return;
                    }
                    next = stream.next() => next,
                };

                match next {
                    Some(Ok(WatchEvent::Added(resource))) => {
                        process_resource(&ctx, client.as_ref(), resource, Initiator::Watcher("ADDED"))
                            .await;
                    }
                    Some(Ok(WatchEvent::Modified(resource))) => {
                        process_resource(
                            &ctx,
                            client.as_ref(),
                            resource,
                            Initiator::Watcher("MODIFIED"),
                        )
                        .await;
                    }
                    Some(Ok(WatchEvent::Deleted(resource))) => {
                        debug!(
                            kind = R::KIND,
                            name = %resource.name_any(),
                            namespace = ?resource.namespace(),
                            "Ignoring delete event"
                        );
                    }
                    Some(Ok(WatchEvent::Bookmark(_))) => {}
                    Some(Ok(WatchEvent::Error(e))) => {
                        warn!(
                            kind = R::KIND,
                            code = e.code,
                            reason = %e.reason,
                            message = %e.message,
                            "Watch returned an error event"
                        );
                        break;
                    }
                    Some(Err(e)) => {
                        error!(
                            kind = R::KIND,
                            error = %e,
                            "Getting next event from {} watcher failed",
                            R::KIND
                        );
                        break;
                    }
                    None => {
                        debug!(kind = R::KIND, "Watch ended");
                        break;
                    }
                }
            },
            Err(e) => {
                error!(kind = R::KIND, error = %e, "Watch {} call failed", R::KIND);
            }
        }

        if !sleep_unless_closed(&ctx, &retry, R::KIND).await {
            break;
        }
    }

    info!(kind = R::KIND, "Watch loop stopped");
}

/// List and reconcile every resource of one kind.
///
/// Returns the number of resources listed; a failed list is logged and counts as zero.
pub async fn sweep_kind<R: SyncResource>(ctx: &Context, client: &dyn ResourceClient<R>) -> usize {
    info!(kind = R::KIND, "Listing {} for all namespaces...", R::KIND);

    let resources = match client.list().await {
        Ok(resources) => resources,
        Err(e) => {
            error!(kind = R::KIND, error = %e, "List {} call failed", R::KIND);
            return 0;
        }
    };

    let count = resources.len();
    info!(kind = R::KIND, count, "Cluster has {count} {}(s)", R::KIND);

    for resource in resources {
        if process_resource(ctx, client, resource, Initiator::Poller)
            .await
            .is_none()
        {
            break;
        }
    }

    count
}

/// Periodically sweep all Services and Ingresses until shutdown.
///
/// The first sweep runs immediately.
pub async fn run_sweep_loop(
    ctx: Arc<Context>,
    services: Arc<dyn ResourceClient<Service>>,
    ingresses: Arc<dyn ResourceClient<Ingress>>,
) {
    let interval = JitteredInterval::new(ctx.settings.sweep_interval_base());
    info!("Starting sweep loop");

    loop {
        sweep_kind(&ctx, services.as_ref()).await;
        if ctx.tracker.is_closed() {
            break;
        }

        sweep_kind(&ctx, ingresses.as_ref()).await;

        if !sleep_unless_closed(&ctx, &interval, "all").await {
            break;
        }
    }

    info!("Sweep loop stopped");
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use cloud_dns_sync::{
    config::Config,
    constants::TOKIO_WORKER_THREADS,
    controller::{run_sweep_loop, run_watch_loop, Context},
    dns::{
        cloud_dns::build_http_client,
        credentials::{watch_credentials_file, Credentials, TokenSource},
        CloudDnsProvider, DnsProvider,
    },
    metrics::PrometheusRecorder,
    resource::{KubeResourceClient, ResourceClient},
    server,
    shutdown::{shutdown_signal, ReconcileTracker},
};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("cloud-dns-sync")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_logging() {
    // Respects RUST_LOG, defaulting to INFO; RUST_LOG_FORMAT=json switches to JSON lines
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    let config = Config::parse();
    init_logging();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        project = %config.project,
        zone = %config.zone,
        "Starting cloud-dns-sync version {}...",
        env!("CARGO_PKG_VERSION")
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("Creating Kubernetes api client failed")?;

    let http = build_http_client().context("Creating HTTP client failed")?;
    let credentials = Credentials::load(config.credentials_file.as_deref())
        .await
        .context("Loading Google Cloud credentials failed")?;
    let token_source = Arc::new(TokenSource::new(http.clone(), credentials));
    let dns: Arc<dyn DnsProvider> = Arc::new(CloudDnsProvider::new(
        http,
        token_source.clone(),
        config.project.clone(),
        config.zone.clone(),
    ));

    let listener = TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("Binding metrics listener on {} failed", config.listen_address))?;

    let tracker = Arc::new(ReconcileTracker::new());
    let ctx = Arc::new(Context {
        dns,
        recorder: Arc::new(PrometheusRecorder),
        tracker: tracker.clone(),
        settings: config.loop_settings(),
    });

    let services: Arc<dyn ResourceClient<Service>> =
        Arc::new(KubeResourceClient::<Service>::new(client.clone()));
    let ingresses: Arc<dyn ResourceClient<Ingress>> =
        Arc::new(KubeResourceClient::<Ingress>::new(client));

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let server_shutdown = {
        let tracker = tracker.clone();
        async move { tracker.closed().await }
    };
    tasks.push(tokio::spawn(async move {
        if let Err(e) = server::serve(listener, server_shutdown).await {
            error!(error = %e, "Metrics server failed");
        }
    }));

    tasks.push(tokio::spawn(run_watch_loop(ctx.clone(), services.clone())));
    tasks.push(tokio::spawn(run_watch_loop(ctx.clone(), ingresses.clone())));
    tasks.push(tokio::spawn(run_sweep_loop(ctx.clone(), services, ingresses)));

    if let Some(path) = config.credentials_file.clone() {
        let watcher_shutdown = {
            let tracker = tracker.clone();
            async move { tracker.closed().await }
        };
        tasks.push(tokio::spawn(watch_credentials_file(
            path,
            token_source,
            config.credentials_poll(),
            watcher_shutdown,
        )));
    }

    info!("All loops started");

    let signal = shutdown_signal()
        .await
        .context("Installing signal handlers failed")?;
    info!(signal, "Received {signal}, shutting down...");

    if !tracker.close_and_wait(config.shutdown_timeout()).await {
        warn!("Exiting with reconciliations still in flight");
        return Ok(());
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Task ended abnormally");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

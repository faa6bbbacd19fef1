//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and reconciler wiring.

use crate::config::{load_config, ControllerConfig, ServerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::sqlserver::SqlServerConnecter;
use crate::credentials::KubeCredentialResolver;
use crate::crd::{ManagedKind, MySQLServer, PostgreSQLServer};
use crate::observability;
use crate::password::RandomPasswordGenerator;
use crate::provider::AzureClientFactory;
use crate::runtime::watch_loop::managed_api;
use anyhow::{anyhow, Context, Result};
use k8s_openapi::NamespaceResourceScope;
use kube::api::ListParams;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Reconciler context for `MySQLServer`
    pub mysql: Arc<Reconciler>,
    /// Reconciler context for `PostgreSQLServer`
    pub postgresql: Arc<Reconciler>,
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup for both managed kinds
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any TLS connection is opened
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "azure_sql_controller=info".into()),
        )
        .init();

    info!(
        "Starting Azure SQL Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let (controller_config, server_config) = load_config();
    info!(?controller_config, ?server_config, "Loaded configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let mysql = Arc::new(build_reconciler(
        client.clone(),
        ManagedKind::MySqlServer,
        controller_config.clone(),
    ));
    let postgresql = Arc::new(build_reconciler(
        client.clone(),
        ManagedKind::PostgreSqlServer,
        controller_config.clone(),
    ));

    let namespace = controller_config.watch_namespace.as_deref();
    summarize_existing_resources::<MySQLServer>(&client, namespace).await;
    summarize_existing_resources::<PostgreSQLServer>(&client, namespace).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult { mysql, postgresql })
}

/// Wire the production collaborators for one managed kind
pub fn build_reconciler(client: Client, kind: ManagedKind, config: ControllerConfig) -> Reconciler {
    let connecter = SqlServerConnecter::new(
        kind,
        Arc::new(KubeCredentialResolver::new(client.clone())),
        Arc::new(AzureClientFactory),
        Arc::new(RandomPasswordGenerator),
    );
    Reconciler::new(client, kind, Arc::new(connecter), config)
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = config.startup_timeout();
    let poll_interval = config.poll_interval();
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log the managed resources that already exist, grouped by namespace
///
/// The watch picks all of them up on its initial list; this only checks the
/// CRD is installed and gives operators a startup summary.
async fn summarize_existing_resources<K>(client: &Client, namespace: Option<&str>)
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let kind = K::kind(&());
    let api = managed_api::<K>(client.clone(), namespace);

    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.namespace().unwrap_or_else(|| "default".to_string()))
                    .or_default()
                    .push(item.name_any());
            }

            info!(
                "Found {} existing {} resources in {} namespaces",
                list.items.len(),
                kind,
                by_namespace.len()
            );
            for (ns, mut names) in by_namespace {
                names.sort();
                info!("  {}: {}", ns, names.join(", "));
            }
        }
        Err(e) => {
            error!("{} CRD is not queryable; {}. Is the CRD installed?", kind, e);
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}

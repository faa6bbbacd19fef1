//! # Watch Loop
//!
//! Runs one kube-runtime controller per managed kind until a shutdown signal
//! arrives.

use crate::constants::WATCH_TIMEOUT_SECS;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::{ManagedResource, MySQLServer, PostgreSQLServer};
use crate::runtime::error_policy::handle_reconciliation_error;
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Watch `MySQLServer` and `PostgreSQLServer` resources until shutdown
pub async fn run_watch_loop(
    mysql: Arc<Reconciler>,
    postgresql: Arc<Reconciler>,
) -> Result<()> {
    info!("Starting MySQLServer and PostgreSQLServer controllers");

    tokio::join!(
        run_controller::<MySQLServer>(mysql),
        run_controller::<PostgreSQLServer>(postgresql),
    );

    info!("Controllers stopped");
    Ok(())
}

/// Api for a managed kind, scoped to the configured watch namespace
pub fn managed_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

async fn run_controller<K>(ctx: Arc<Reconciler>)
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Into<ManagedResource>
        + Send
        + Sync
        + 'static,
{
    let api: Api<K> = managed_api(ctx.client.clone(), ctx.config.watch_namespace.as_deref());
    let kind = ctx.kind.as_str();

    info!(
        kind,
        namespace = ctx.config.watch_namespace.as_deref().unwrap_or("<all>"),
        "- {} controller",
        kind
    );

    Controller::new(api, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
        .shutdown_on_signal()
        .run(reconcile::<K>, handle_reconciliation_error::<K>, ctx)
        .for_each(log_reconcile_result(kind))
        .await;
}

fn log_reconcile_result<T: Debug, E: Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::debug!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

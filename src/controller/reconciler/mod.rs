//! # Managed Resource Reconciler
//!
//! Drives one reconcile pass for a managed SQL server:
//!
//! 1. Deleted objects with reclaim policy `Retain` only lose their finalizer.
//! 2. Live objects get the finalizer before anything is created.
//! 3. A fresh external client is connected and the server observed.
//! 4. Depending on the observation the server is created, deleted, updated
//!    or left alone; connection details are published and status persisted.

mod connection;
mod finalizer;
mod status;

pub use connection::{connection_secret, needs_update, publish_connection_details};
pub use finalizer::{add_finalizer, remove_finalizer, with_finalizer, without_finalizer};
pub use status::patch_status;

use crate::config::ControllerConfig;
use crate::constants::MANAGED_FINALIZER;
use crate::controller::backoff::BackoffState;
use crate::crd::{Condition, ManagedKind, ManagedResource, ReclaimPolicy};
use crate::managed::{error_chain, ConnectionDetails, ExternalClient, ExternalConnecter, ExternalError};
use crate::observability::metrics;
use kube::Client;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Errors surfaced from a reconcile pass to the error policy
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error("cannot publish connection details")]
    Publish(#[source] kube::Error),
    #[error("cannot update managed resource status")]
    Status(#[source] kube::Error),
    #[error("cannot update managed resource finalizers")]
    Finalizer(#[source] kube::Error),
}

/// Reconciler context shared by every pass of one managed kind
pub struct Reconciler {
    pub client: Client,
    pub kind: ManagedKind,
    pub connecter: Arc<dyn ExternalConnecter>,
    pub config: ControllerConfig,
    /// Error backoff per resource, keyed by `kind/namespace/name`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Client,
        kind: ManagedKind,
        connecter: Arc<dyn ExternalConnecter>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            client,
            kind,
            connecter,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn resource_key(kind: ManagedKind, namespace: &str, name: &str) -> String {
        format!("{kind}/{namespace}/{name}")
    }

    /// Forget the error backoff of a resource after a successful pass
    pub fn clear_backoff(&self, key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(key);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }
}

/// What a pass did to the external resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Creation was requested; details hold the new password
    Created(ConnectionDetails),
    /// The resource exists and was left alone
    Observed(ConnectionDetails),
    /// An update was requested
    Updated(ConnectionDetails),
    /// Deletion was requested and has not completed yet
    DeletionRequested,
    /// Nothing is left to clean up; the finalizer may go
    Deleted,
}

impl PassOutcome {
    pub fn connection_details(&self) -> Option<&ConnectionDetails> {
        match self {
            PassOutcome::Created(details)
            | PassOutcome::Observed(details)
            | PassOutcome::Updated(details) => Some(details),
            PassOutcome::DeletionRequested | PassOutcome::Deleted => None,
        }
    }

    /// Whether the next pass should come after the short wait
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            PassOutcome::Created(_) | PassOutcome::DeletionRequested
        )
    }
}

fn tracked<T>(
    operation: &'static str,
    result: Result<T, ExternalError>,
) -> Result<T, ExternalError> {
    let label = match &result {
        Ok(_) => "success",
        Err(e) => e.kind_label(),
    };
    metrics::record_external_operation(operation, label);
    result
}

/// Observe the external resource and apply at most one corrective action
///
/// Objects being deleted are deleted on the provider side only with reclaim
/// policy `Delete` and only while the resource still exists.
pub async fn run_external_pass(
    mg: &mut ManagedResource,
    external: &dyn ExternalClient,
) -> Result<PassOutcome, ExternalError> {
    let observation = tracked("observe", external.observe(mg).await)?;

    if mg.is_being_deleted() {
        if mg.spec().reclaim_policy == ReclaimPolicy::Delete && observation.resource_exists {
            tracked("delete", external.delete(mg).await)?;
            return Ok(PassOutcome::DeletionRequested);
        }
        return Ok(PassOutcome::Deleted);
    }

    if !observation.resource_exists {
        let creation = tracked("create", external.create(mg).await)?;
        return Ok(PassOutcome::Created(creation.connection_details));
    }

    if observation.resource_up_to_date || !external.supports_update() {
        return Ok(PassOutcome::Observed(observation.connection_details));
    }

    let update = tracked("update", external.update(mg).await)?;
    let mut details = observation.connection_details;
    details.extend(update.connection_details);
    Ok(PassOutcome::Updated(details))
}

/// kube-runtime entry point for one managed object
pub async fn reconcile<K>(obj: Arc<K>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError>
where
    K: Clone + Into<ManagedResource>,
{
    let start = Instant::now();
    let mut mg: ManagedResource = (*obj).clone().into();
    let key = Reconciler::resource_key(mg.kind(), mg.namespace(), mg.name());

    let span = info_span!(
        "controller.reconcile",
        resource.kind = %mg.kind(),
        resource.name = %mg.name(),
        resource.namespace = %mg.namespace()
    );

    async move {
        metrics::increment_reconciliations();
        let result = reconcile_managed(&mut mg, &ctx).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.clear_backoff(&key);
        }
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_managed(
    mg: &mut ManagedResource,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let original = mg.status().cloned();

    if mg.is_being_deleted() {
        if !mg.has_finalizer(MANAGED_FINALIZER) {
            return Ok(Action::await_change());
        }
        if mg.spec().reclaim_policy == ReclaimPolicy::Retain {
            info!("Reclaim policy is Retain, leaving Azure server in place");
            remove_finalizer(&ctx.client, mg, MANAGED_FINALIZER)
                .await
                .map_err(ReconcilerError::Finalizer)?;
            return Ok(Action::await_change());
        }
    } else {
        add_finalizer(&ctx.client, mg, MANAGED_FINALIZER)
            .await
            .map_err(ReconcilerError::Finalizer)?;
    }

    match drive(mg, ctx).await {
        Ok(PassOutcome::Deleted) => {
            remove_finalizer(&ctx.client, mg, MANAGED_FINALIZER)
                .await
                .map_err(ReconcilerError::Finalizer)?;
            info!("External resource released");
            Ok(Action::await_change())
        }
        Ok(outcome) => {
            mg.set_conditions([Condition::reconcile_success()]);
            patch_status(&ctx.client, mg, original.as_ref())
                .await
                .map_err(ReconcilerError::Status)?;

            let (wait, reason) = if outcome.is_transitional() {
                (ctx.config.short_wait(), "short-wait")
            } else {
                (ctx.config.long_wait(), "long-wait")
            };
            debug!(requeue_secs = wait.as_secs(), "Reconcile pass succeeded");
            metrics::increment_requeues_total(reason);
            Ok(Action::requeue(wait))
        }
        Err(e) => {
            mg.set_conditions([Condition::reconcile_error(error_chain(&e))]);
            if let Err(status_error) = patch_status(&ctx.client, mg, original.as_ref()).await {
                warn!(error = %status_error, "Failed to record reconcile error in status");
            }
            Err(e)
        }
    }
}

async fn drive(mg: &mut ManagedResource, ctx: &Reconciler) -> Result<PassOutcome, ReconcilerError> {
    let external = tracked("connect", ctx.connecter.connect(mg).await)?;
    let outcome = run_external_pass(mg, external.as_ref()).await?;

    if let Some(details) = outcome.connection_details() {
        publish_connection_details(&ctx.client, mg, details)
            .await
            .map_err(ReconcilerError::Publish)?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CONNECTION_PASSWORD_KEY, CONNECTION_USERNAME_KEY};
    use crate::crd::{
        MySQLServer, MySQLServerSpec, ProviderReference, SkuSpec, SkuTier, SqlServerParameters,
        SqlServerSpec, StorageProfileSpec,
    };
    use crate::managed::{ExternalCreation, ExternalObservation, ExternalUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mg(reclaim_policy: ReclaimPolicy) -> ManagedResource {
        MySQLServer::new(
            "db1",
            MySQLServerSpec {
                server: SqlServerSpec {
                    provider_ref: ProviderReference {
                        name: "azure-provider".to_string(),
                    },
                    write_connection_secret_to_ref: None,
                    reclaim_policy,
                    for_provider: SqlServerParameters {
                        administrator_login: "admin".to_string(),
                        resource_group_name: "rg".to_string(),
                        location: "westeurope".to_string(),
                        sku: SkuSpec {
                            tier: SkuTier::Basic,
                            capacity: 1,
                            family: "Gen5".to_string(),
                        },
                        storage_profile: StorageProfileSpec {
                            storage_gb: 5,
                            backup_retention_days: None,
                            geo_redundant_backup: None,
                        },
                        version: "5.7".to_string(),
                        ssl_enforced: true,
                        tags: None,
                    },
                },
            },
        )
        .into()
    }

    fn deleting(mut mg: ManagedResource) -> ManagedResource {
        if let ManagedResource::MySqlServer(cr) = &mut mg {
            cr.metadata = serde_json::from_value(serde_json::json!({
                "name": "db1",
                "deletionTimestamp": "2024-01-01T00:00:00Z",
                "finalizers": [MANAGED_FINALIZER]
            }))
            .unwrap();
        }
        mg
    }

    fn details(key: &str, value: &str) -> ConnectionDetails {
        ConnectionDetails::from([(key.to_string(), value.as_bytes().to_vec())])
    }

    #[derive(Default)]
    struct ScriptedClient {
        exists: bool,
        up_to_date: bool,
        supports_update: bool,
        creates: AtomicUsize,
        updates: AtomicUsize,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl ExternalClient for ScriptedClient {
        async fn observe(
            &self,
            _mg: &mut ManagedResource,
        ) -> Result<ExternalObservation, ExternalError> {
            Ok(ExternalObservation {
                resource_exists: self.exists,
                resource_up_to_date: self.up_to_date,
                connection_details: if self.exists {
                    details(CONNECTION_USERNAME_KEY, "admin@db1")
                } else {
                    ConnectionDetails::new()
                },
            })
        }

        async fn create(&self, _mg: &mut ManagedResource) -> Result<ExternalCreation, ExternalError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(ExternalCreation {
                connection_details: details(CONNECTION_PASSWORD_KEY, "pw"),
            })
        }

        async fn update(&self, _mg: &mut ManagedResource) -> Result<ExternalUpdate, ExternalError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(ExternalUpdate::default())
        }

        async fn delete(&self, _mg: &mut ManagedResource) -> Result<(), ExternalError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn supports_update(&self) -> bool {
            self.supports_update
        }
    }

    #[tokio::test]
    async fn test_missing_resource_is_created() {
        let client = ScriptedClient::default();
        let outcome = run_external_pass(&mut mg(ReclaimPolicy::Delete), &client)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PassOutcome::Created(details(CONNECTION_PASSWORD_KEY, "pw"))
        );
        assert!(outcome.is_transitional());
        assert_eq!(client.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_resource_without_update_support_is_left_alone() {
        let client = ScriptedClient {
            exists: true,
            ..Default::default()
        };
        let outcome = run_external_pass(&mut mg(ReclaimPolicy::Delete), &client)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PassOutcome::Observed(details(CONNECTION_USERNAME_KEY, "admin@db1"))
        );
        assert!(!outcome.is_transitional());
        assert_eq!(client.creates.load(Ordering::SeqCst), 0);
        assert_eq!(client.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drift_is_updated_when_supported() {
        let client = ScriptedClient {
            exists: true,
            supports_update: true,
            ..Default::default()
        };
        let outcome = run_external_pass(&mut mg(ReclaimPolicy::Delete), &client)
            .await
            .unwrap();

        assert!(matches!(outcome, PassOutcome::Updated(_)));
        assert_eq!(client.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_up_to_date_resource_is_not_updated() {
        let client = ScriptedClient {
            exists: true,
            up_to_date: true,
            supports_update: true,
            ..Default::default()
        };
        let outcome = run_external_pass(&mut mg(ReclaimPolicy::Delete), &client)
            .await
            .unwrap();

        assert!(matches!(outcome, PassOutcome::Observed(_)));
        assert_eq!(client.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deleted_object_deletes_existing_resource() {
        let client = ScriptedClient {
            exists: true,
            ..Default::default()
        };
        let outcome = run_external_pass(&mut deleting(mg(ReclaimPolicy::Delete)), &client)
            .await
            .unwrap();

        assert_eq!(outcome, PassOutcome::DeletionRequested);
        assert_eq!(client.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deleted_object_with_absent_resource_is_released() {
        let client = ScriptedClient::default();
        let outcome = run_external_pass(&mut deleting(mg(ReclaimPolicy::Delete)), &client)
            .await
            .unwrap();

        assert_eq!(outcome, PassOutcome::Deleted);
        assert_eq!(client.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(client.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retained_resource_is_never_deleted() {
        let client = ScriptedClient {
            exists: true,
            ..Default::default()
        };
        let outcome = run_external_pass(&mut deleting(mg(ReclaimPolicy::Retain)), &client)
            .await
            .unwrap();

        assert_eq!(outcome, PassOutcome::Deleted);
        assert_eq!(client.deletes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(
            Reconciler::resource_key(ManagedKind::PostgreSqlServer, "apps", "db1"),
            "PostgreSQLServer/apps/db1"
        );
    }

    #[test]
    fn test_reconciler_error_display_keeps_context() {
        let err: ReconcilerError = ExternalError::KindMismatch {
            expected: ManagedKind::MySqlServer,
            found: ManagedKind::PostgreSqlServer,
        }
        .into();
        assert_eq!(err.to_string(), "managed resource is not a MySQLServer");
    }
}

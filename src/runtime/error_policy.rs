//! # Error Policy
//!
//! Requeue policy for failed reconcile passes.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::managed::{error_chain, ExternalError};
use crate::observability;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing server does not slow
/// down the others. A kind mismatch cannot heal by retrying soon, so it waits
/// for the maximum backoff.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource,
{
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    let error_kind = match error {
        ReconcilerError::External(e) => e.kind_label(),
        ReconcilerError::Publish(_) => "publish",
        ReconcilerError::Status(_) => "status",
        ReconcilerError::Finalizer(_) => "finalizer",
    };

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %ctx.kind,
        resource.name = %name,
        resource.namespace = %namespace,
        error.kind = error_kind
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", name, error_chain(error));
    observability::metrics::increment_reconciliation_errors();

    let resource_key = Reconciler::resource_key(ctx.kind, &namespace, &name);
    let (delay, reason) = requeue_delay(error, &ctx.backoff_states, resource_key, &ctx.config);
    observability::metrics::increment_requeues_total(reason);
    Action::requeue(delay)
}

/// Delay before the next attempt and the requeue reason recorded for it
///
/// Each call counts one more error for `resource_key`.
pub(crate) fn requeue_delay(
    error: &ReconcilerError,
    backoff_states: &Mutex<HashMap<String, BackoffState>>,
    resource_key: String,
    config: &ControllerConfig,
) -> (Duration, &'static str) {
    if matches!(
        error,
        ReconcilerError::External(ExternalError::KindMismatch { .. })
    ) {
        return (Duration::from_secs(config.backoff_max_secs), "kind-mismatch");
    }

    let (delay, error_count) = match backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_default();
            state.increment_error();
            (
                state.delay(config.backoff_min_secs, config.backoff_max_secs),
                state.error_count,
            )
        }
        Err(e) => {
            warn!(
                "Failed to lock backoff_states: {}, using default backoff",
                e
            );
            (Duration::from_secs(config.backoff_min_secs), 0)
        }
    };

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    (delay, "error-backoff")
}

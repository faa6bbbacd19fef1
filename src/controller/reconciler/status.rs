//! # Status Management
//!
//! Persists conditions, binding phase and observed state of a managed resource.

use crate::constants::FIELD_MANAGER;
use crate::crd::{ManagedResource, MySQLServer, PostgreSQLServer, SqlServerStatus};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Merge-patch the status subresource with the current status
///
/// Skips the write when the status equals `original`, so unchanged passes do
/// not generate watch events. A resource that has disappeared is not an error.
pub async fn patch_status(
    client: &Client,
    mg: &ManagedResource,
    original: Option<&SqlServerStatus>,
) -> Result<(), kube::Error> {
    let Some(status) = mg.status() else {
        return Ok(());
    };

    if original == Some(status) {
        debug!("Skipping status update - status unchanged");
        return Ok(());
    }

    let patch = serde_json::json!({ "status": status });
    let result = match mg {
        ManagedResource::MySqlServer(_) => {
            patch_status_of::<MySQLServer>(client, mg.namespace(), mg.name(), &patch).await
        }
        ManagedResource::PostgreSqlServer(_) => {
            patch_status_of::<PostgreSQLServer>(client, mg.namespace(), mg.name(), &patch).await
        }
    };

    match result {
        Err(kube::Error::Api(e)) if e.code == 404 => {
            debug!("Resource is gone, skipping status update");
            Ok(())
        }
        other => other,
    }
}

async fn patch_status_of<K>(
    client: &Client,
    namespace: &str,
    name: &str,
    patch: &serde_json::Value,
) -> Result<(), kube::Error>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    Ok(())
}

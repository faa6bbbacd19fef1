//! # Finalizer Management
//!
//! Keeps the managed-resource finalizer on live objects so the external
//! server can be cleaned up before the object disappears.

use crate::constants::FIELD_MANAGER;
use crate::crd::{ManagedResource, MySQLServer, PostgreSQLServer};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Finalizer list with `finalizer` appended, or `None` when already present
pub fn with_finalizer(current: Option<&Vec<String>>, finalizer: &str) -> Option<Vec<String>> {
    let mut finalizers = current.cloned().unwrap_or_default();
    if finalizers.iter().any(|f| f == finalizer) {
        return None;
    }
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizer list without `finalizer`, or `None` when it was not present
pub fn without_finalizer(current: Option<&Vec<String>>, finalizer: &str) -> Option<Vec<String>> {
    let finalizers = current?;
    if !finalizers.iter().any(|f| f == finalizer) {
        return None;
    }
    Some(
        finalizers
            .iter()
            .filter(|f| f.as_str() != finalizer)
            .cloned()
            .collect(),
    )
}

pub async fn add_finalizer(
    client: &Client,
    mg: &ManagedResource,
    finalizer: &str,
) -> Result<(), kube::Error> {
    let Some(finalizers) = with_finalizer(mg.meta().finalizers.as_ref(), finalizer) else {
        return Ok(());
    };
    debug!(finalizer = finalizer, "Adding finalizer");
    patch_finalizers(client, mg, finalizers).await
}

pub async fn remove_finalizer(
    client: &Client,
    mg: &ManagedResource,
    finalizer: &str,
) -> Result<(), kube::Error> {
    let Some(finalizers) = without_finalizer(mg.meta().finalizers.as_ref(), finalizer) else {
        return Ok(());
    };
    debug!(finalizer = finalizer, "Removing finalizer");
    match patch_finalizers(client, mg, finalizers).await {
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        other => other,
    }
}

async fn patch_finalizers(
    client: &Client,
    mg: &ManagedResource,
    finalizers: Vec<String>,
) -> Result<(), kube::Error> {
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    match mg {
        ManagedResource::MySqlServer(_) => {
            patch_metadata_of::<MySQLServer>(client, mg.namespace(), mg.name(), &patch).await
        }
        ManagedResource::PostgreSqlServer(_) => {
            patch_metadata_of::<PostgreSQLServer>(client, mg.namespace(), mg.name(), &patch).await
        }
    }
}

async fn patch_metadata_of<K>(
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
    api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    Ok(())
}

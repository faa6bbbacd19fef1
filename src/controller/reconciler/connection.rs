//! # Connection Secret Publishing
//!
//! Writes connection details into the Secret named by
//! `writeConnectionSecretToRef`, in the managed resource's namespace.
//!
//! The Secret is created with the managed resource as its controller owner.
//! Existing Secrets are merge-patched key by key, so the password written on
//! the create pass survives later passes that only know the endpoint and
//! username.

use crate::constants::FIELD_MANAGER;
use crate::crd::ManagedResource;
use crate::managed::ConnectionDetails;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Build the connection Secret for a managed resource
pub fn connection_secret(mg: &ManagedResource, name: &str, details: &ConnectionDetails) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(mg.namespace().to_string()),
            owner_references: mg.controller_owner_ref().map(|owner| vec![owner]),
            ..Default::default()
        },
        type_: Some("connection.azure.microscaler.io/v1alpha1".to_string()),
        data: Some(secret_data(details)),
        ..Default::default()
    }
}

/// Whether writing `details` would change the Secret
pub fn needs_update(existing: &Secret, details: &ConnectionDetails) -> bool {
    let data = existing.data.as_ref();
    details.iter().any(|(key, value)| {
        !matches!(data.and_then(|d| d.get(key)), Some(current) if current.0 == *value)
    })
}

fn secret_data(details: &ConnectionDetails) -> BTreeMap<String, ByteString> {
    details
        .iter()
        .map(|(key, value)| (key.clone(), ByteString(value.clone())))
        .collect()
}

/// Publish connection details to the managed resource's connection Secret
///
/// Does nothing when no Secret is requested or there is nothing to write.
pub async fn publish_connection_details(
    client: &Client,
    mg: &ManagedResource,
    details: &ConnectionDetails,
) -> Result<(), kube::Error> {
    let Some(secret_ref) = mg.spec().write_connection_secret_to_ref.as_ref() else {
        return Ok(());
    };
    if details.is_empty() {
        return Ok(());
    }

    let api: Api<Secret> = Api::namespaced(client.clone(), mg.namespace());

    match api.get_opt(&secret_ref.name).await? {
        None => {
            let secret = connection_secret(mg, &secret_ref.name, details);
            let params = PostParams {
                field_manager: Some(FIELD_MANAGER.to_string()),
                ..Default::default()
            };
            match api.create(&params, &secret).await {
                Ok(_) => {
                    info!(secret.name = %secret_ref.name, "Created connection secret");
                    return Ok(());
                }
                // Created concurrently; fall through to the patch
                Err(kube::Error::Api(e)) if e.code == 409 => {}
                Err(e) => return Err(e),
            }
        }
        Some(existing) if !needs_update(&existing, details) => {
            debug!(secret.name = %secret_ref.name, "Connection secret up to date");
            return Ok(());
        }
        Some(_) => {}
    }

    let patch = serde_json::json!({ "data": secret_data(details) });
    api.patch(
        &secret_ref.name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    debug!(secret.name = %secret_ref.name, "Updated connection secret");
    Ok(())
}

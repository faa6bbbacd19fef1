//! # Credential Resolution
//!
//! Looks up a managed resource's Provider and reads the credential bytes from
//! the Secret it references.

use crate::crd::{Provider, ProviderReference, ProviderSpec, SecretKeySelector};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::debug;

/// Supplies provider configuration and raw credentials
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Fetch the Provider named by the reference
    async fn provider(&self, reference: &ProviderReference) -> Result<ProviderSpec>;

    /// Fetch the bytes stored under the selected Secret key
    ///
    /// A Secret without the key yields empty bytes.
    async fn secret_data(&self, selector: &SecretKeySelector) -> Result<Vec<u8>>;
}

/// Resolves credentials from the Kubernetes API
#[derive(Clone)]
pub struct KubeCredentialResolver {
    client: Client,
}

impl KubeCredentialResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialResolver for KubeCredentialResolver {
    async fn provider(&self, reference: &ProviderReference) -> Result<ProviderSpec> {
        let providers: Api<Provider> = Api::all(self.client.clone());
        let provider = providers
            .get(&reference.name)
            .await
            .with_context(|| format!("Failed to get Provider {}", reference.name))?;
        Ok(provider.spec)
    }

    async fn secret_data(&self, selector: &SecretKeySelector) -> Result<Vec<u8>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &selector.namespace);
        let secret = secrets.get(&selector.name).await.with_context(|| {
            format!(
                "Failed to get Secret {}/{}",
                selector.namespace, selector.name
            )
        })?;

        let data = secret_key_bytes(&secret, &selector.key);
        if data.is_empty() {
            debug!(
                secret.namespace = %selector.namespace,
                secret.name = %selector.name,
                secret.key = %selector.key,
                "Provider Secret has no data under the selected key"
            );
        }
        Ok(data)
    }
}

fn secret_key_bytes(secret: &Secret, key: &str) -> Vec<u8> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.clone())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|value| value.clone().into_bytes())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn test_secret_key_bytes_reads_data() {
        let secret = Secret {
            data: Some(BTreeMap::from([(
                "credentials".to_string(),
                ByteString(b"{}".to_vec()),
            )])),
            ..Default::default()
        };
        assert_eq!(secret_key_bytes(&secret, "credentials"), b"{}".to_vec());
    }

    #[test]
    fn test_secret_key_bytes_missing_key_is_empty() {
        let secret = Secret {
            data: Some(BTreeMap::from([(
                "other".to_string(),
                ByteString(b"x".to_vec()),
            )])),
            ..Default::default()
        };
        assert!(secret_key_bytes(&secret, "credentials").is_empty());
        assert!(secret_key_bytes(&Secret::default(), "credentials").is_empty());
    }
}

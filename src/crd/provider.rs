//! # Azure Provider
//!
//! Cluster-scoped `Provider` resource holding a reference to the Secret with
//! the Azure service principal credentials used to manage servers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Azure Provider Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: azure.microscaler.io/v1alpha1
/// kind: Provider
/// metadata:
///   name: azure-provider
/// spec:
///   credentialsSecretRef:
///     namespace: microscaler-system
///     name: azure-account-creds
///     key: credentials
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Provider",
    group = "azure.microscaler.io",
    version = "v1alpha1",
    shortname = "azprovider"
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Secret containing the Azure credentials JSON
    pub credentials_secret_ref: SecretKeySelector,
}

/// Reference to a key within a Secret
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Secret namespace
    pub namespace: String,
    /// Secret name
    pub name: String,
    /// Key within the Secret data
    pub key: String,
}

/// Reference from a managed resource to its cluster-scoped Provider
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReference {
    /// Provider name
    pub name: String,
}

/// Reference to the Secret that receives connection details
/// The Secret is always written to the managed resource's namespace
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    /// Secret name
    pub name: String,
}

//! # Azure Credentials
//!
//! Parses the service principal credentials stored in the Provider Secret.
//!
//! The Secret holds the JSON written by `az ad sp create-for-rbac --sdk-auth`:
//!
//! ```json
//! {
//!   "clientId": "...",
//!   "clientSecret": "...",
//!   "subscriptionId": "...",
//!   "tenantId": "...",
//!   "activeDirectoryEndpointUrl": "https://login.microsoftonline.com",
//!   "resourceManagerEndpointUrl": "https://management.azure.com/"
//! }
//! ```

use crate::constants::{DEFAULT_ACTIVE_DIRECTORY_ENDPOINT, DEFAULT_RESOURCE_MANAGER_ENDPOINT};
use anyhow::{Context, Result};
use serde::Deserialize;

/// Azure service principal credentials
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub tenant_id: String,
    #[serde(default = "default_active_directory_endpoint")]
    pub active_directory_endpoint_url: String,
    #[serde(default = "default_resource_manager_endpoint")]
    pub resource_manager_endpoint_url: String,
}

// Never expose the client secret in debug output
impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("client_id", &self.client_id)
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field(
                "resource_manager_endpoint_url",
                &self.resource_manager_endpoint_url,
            )
            .finish_non_exhaustive()
    }
}

impl AzureCredentials {
    /// Parse credentials from the raw Secret value
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let credentials: AzureCredentials =
            serde_json::from_slice(data).context("cannot parse Azure credentials JSON")?;

        for (field, value) in [
            ("clientId", &credentials.client_id),
            ("clientSecret", &credentials.client_secret),
            ("subscriptionId", &credentials.subscription_id),
            ("tenantId", &credentials.tenant_id),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Azure credentials field '{field}' is empty");
            }
        }

        Ok(credentials)
    }

    /// Resource Manager base URL without a trailing slash
    pub fn resource_manager_base(&self) -> &str {
        self.resource_manager_endpoint_url.trim_end_matches('/')
    }

    /// OAuth2 token endpoint for the tenant
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.active_directory_endpoint_url.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Scope requested for Resource Manager access tokens
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.resource_manager_base())
    }
}

fn default_active_directory_endpoint() -> String {
    DEFAULT_ACTIVE_DIRECTORY_ENDPOINT.to_string()
}

fn default_resource_manager_endpoint() -> String {
    DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string()
}

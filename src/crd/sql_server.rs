//! # SQL Server Resources
//!
//! `MySQLServer` and `PostgreSQLServer` custom resources. Both kinds share
//! the same spec and status shapes; only the Azure resource provider they
//! map to differs.

use super::provider::{LocalSecretReference, ProviderReference};
use super::status::SqlServerStatus;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// MySQLServer Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: database.azure.microscaler.io/v1alpha1
/// kind: MySQLServer
/// metadata:
///   name: db1
///   namespace: default
/// spec:
///   providerRef:
///     name: azure-provider
///   writeConnectionSecretToRef:
///     name: db1-conn
///   reclaimPolicy: Delete
///   forProvider:
///     administratorLogin: admin
///     resourceGroupName: my-rg
///     location: westeurope
///     sku:
///       tier: GeneralPurpose
///       capacity: 2
///       family: Gen5
///     storageProfile:
///       storageGB: 25
///     version: "5.7"
///     sslEnforced: true
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "MySQLServer",
    group = "database.azure.microscaler.io",
    version = "v1alpha1",
    namespaced,
    status = "SqlServerStatus",
    shortname = "mysql",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"State", "type":"string", "jsonPath":".status.atProvider.userVisibleState"}, {"name":"Version", "type":"string", "jsonPath":".spec.forProvider.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MySQLServerSpec {
    #[serde(flatten)]
    pub server: SqlServerSpec,
}

/// PostgreSQLServer Custom Resource Definition
///
/// Same shape as [`MySQLServer`], provisioned through Azure Database for PostgreSQL.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "PostgreSQLServer",
    group = "database.azure.microscaler.io",
    version = "v1alpha1",
    namespaced,
    status = "SqlServerStatus",
    shortname = "postgres",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"State", "type":"string", "jsonPath":".status.atProvider.userVisibleState"}, {"name":"Version", "type":"string", "jsonPath":".spec.forProvider.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgreSQLServerSpec {
    #[serde(flatten)]
    pub server: SqlServerSpec,
}

/// Desired state shared by every SQL server kind
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlServerSpec {
    /// Provider whose credentials are used to manage this server
    pub provider_ref: ProviderReference,
    /// Secret that receives the endpoint, username and password
    #[serde(default)]
    pub write_connection_secret_to_ref: Option<LocalSecretReference>,
    /// What happens to the Azure server when this resource is deleted
    /// Default: Retain
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    /// Azure server parameters
    pub for_provider: SqlServerParameters,
}

/// Azure server parameters
///
/// None of these can be changed after creation has been requested.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlServerParameters {
    /// Administrator login name
    pub administrator_login: String,
    /// Azure resource group that contains the server
    pub resource_group_name: String,
    /// Azure region (e.g., "westeurope")
    pub location: String,
    /// Pricing tier and compute
    pub sku: SkuSpec,
    /// Storage settings
    pub storage_profile: StorageProfileSpec,
    /// Engine version (e.g., "5.7" for MySQL, "11" for PostgreSQL)
    pub version: String,
    /// Require SSL connections
    #[serde(default = "default_true")]
    pub ssl_enforced: bool,
    /// Azure resource tags
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Pricing tier and compute of a server
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkuSpec {
    /// Pricing tier
    pub tier: SkuTier,
    /// Number of vCores
    pub capacity: i32,
    /// Hardware generation (e.g., "Gen5")
    pub family: String,
}

/// Azure pricing tiers
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
pub enum SkuTier {
    Basic,
    GeneralPurpose,
    MemoryOptimized,
}

impl SkuTier {
    /// Prefix used in Azure SKU names
    pub fn sku_prefix(self) -> &'static str {
        match self {
            SkuTier::Basic => "B",
            SkuTier::GeneralPurpose => "GP",
            SkuTier::MemoryOptimized => "MO",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkuTier::Basic => "Basic",
            SkuTier::GeneralPurpose => "GeneralPurpose",
            SkuTier::MemoryOptimized => "MemoryOptimized",
        }
    }
}

impl SkuSpec {
    /// Azure SKU name, e.g. `GP_Gen5_2`
    pub fn sku_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.tier.sku_prefix(),
            self.family,
            self.capacity
        )
    }
}

/// Storage settings of a server
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfileSpec {
    /// Maximum storage in GB
    #[serde(rename = "storageGB")]
    pub storage_gb: i32,
    /// Backup retention in days
    #[serde(default)]
    pub backup_retention_days: Option<i32>,
    /// Enable geo-redundant backups
    #[serde(default)]
    pub geo_redundant_backup: Option<bool>,
}

/// Reclaim policy of a managed resource
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, JsonSchema)]
pub enum ReclaimPolicy {
    /// Leave the Azure server in place when the resource is deleted
    #[default]
    Retain,
    /// Delete the Azure server together with the resource
    Delete,
}

fn default_true() -> bool {
    true
}

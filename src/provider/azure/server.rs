//! # Server Payloads
//!
//! Resource Manager request and response bodies for Azure Database servers,
//! shared by the MySQL and PostgreSQL resource providers.

use crate::crd::{SqlServerObservation, SqlServerParameters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state reported once a server can accept connections
pub const STATE_READY: &str = "Ready";

/// Server resource as returned by `GET .../servers/{name}`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub r#type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub sku: Option<Sku>,
    #[serde(default)]
    pub properties: Option<ServerProperties>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerProperties {
    #[serde(default)]
    pub administrator_login: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ssl_enforcement: Option<String>,
    #[serde(default)]
    pub user_visible_state: Option<String>,
    #[serde(default)]
    pub fully_qualified_domain_name: Option<String>,
    #[serde(default)]
    pub storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    #[serde(default, rename = "storageMB", skip_serializing_if = "Option::is_none")]
    pub storage_mb: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_retention_days: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_redundant_backup: Option<String>,
}

impl Server {
    pub fn user_visible_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.user_visible_state.as_deref())
    }

    pub fn fully_qualified_domain_name(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.fully_qualified_domain_name.as_deref())
    }
}

/// Map a server payload onto the status observation
pub fn generate_observation(server: &Server) -> SqlServerObservation {
    let properties = server.properties.as_ref();
    SqlServerObservation {
        id: server.id.clone(),
        name: server.name.clone(),
        r#type: server.r#type.clone(),
        user_visible_state: properties.and_then(|p| p.user_visible_state.clone()),
        fully_qualified_domain_name: properties
            .and_then(|p| p.fully_qualified_domain_name.clone()),
        version: properties.and_then(|p| p.version.clone()),
    }
}

/// `PUT` body requesting a new server
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerCreateRequest<'a> {
    pub location: &'a str,
    pub sku: Sku,
    pub properties: ServerCreateProperties<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<&'a BTreeMap<String, String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerCreateProperties<'a> {
    pub administrator_login: &'a str,
    pub administrator_login_password: &'a str,
    pub version: &'a str,
    pub ssl_enforcement: &'static str,
    pub create_mode: &'static str,
    pub storage_profile: StorageProfile,
}

/// `PATCH` body for the mutable server properties
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerUpdateRequest<'a> {
    pub sku: Sku,
    pub properties: ServerUpdateProperties<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<&'a BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerUpdateProperties<'a> {
    pub version: &'a str,
    pub ssl_enforcement: &'static str,
    pub storage_profile: StorageProfile,
}

#[derive(Debug, Serialize)]
pub(crate) struct NameAvailabilityRequest<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NameAvailability {
    pub name_available: bool,
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

fn sku(parameters: &SqlServerParameters) -> Sku {
    Sku {
        name: parameters.sku.sku_name(),
        tier: Some(parameters.sku.tier.as_str().to_string()),
        capacity: Some(parameters.sku.capacity),
        family: Some(parameters.sku.family.clone()),
    }
}

fn storage_profile(parameters: &SqlServerParameters) -> StorageProfile {
    let storage = &parameters.storage_profile;
    StorageProfile {
        storage_mb: Some(storage.storage_gb.saturating_mul(1024)),
        backup_retention_days: storage.backup_retention_days,
        geo_redundant_backup: storage.geo_redundant_backup.map(|flag| enabled(flag).to_string()),
    }
}

impl<'a> ServerCreateRequest<'a> {
    pub(crate) fn new(parameters: &'a SqlServerParameters, admin_password: &'a str) -> Self {
        Self {
            location: &parameters.location,
            sku: sku(parameters),
            properties: ServerCreateProperties {
                administrator_login: &parameters.administrator_login,
                administrator_login_password: admin_password,
                version: &parameters.version,
                ssl_enforcement: enabled(parameters.ssl_enforced),
                create_mode: "Default",
                storage_profile: storage_profile(parameters),
            },
            tags: parameters.tags.as_ref(),
        }
    }
}

impl<'a> ServerUpdateRequest<'a> {
    pub(crate) fn new(parameters: &'a SqlServerParameters) -> Self {
        Self {
            sku: sku(parameters),
            properties: ServerUpdateProperties {
                version: &parameters.version,
                ssl_enforcement: enabled(parameters.ssl_enforced),
                storage_profile: storage_profile(parameters),
            },
            tags: parameters.tags.as_ref(),
        }
    }
}

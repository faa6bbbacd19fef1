//! # Azure Provider
//!
//! Azure Resource Manager implementation of [`SqlServerApi`].
//!
//! - `credentials`: service principal JSON stored in the Provider Secret
//! - `auth`: client-credentials access tokens
//! - `server`: request and response payloads
//! - `client`: REST calls against the MySQL and PostgreSQL resource providers

mod auth;
mod client;
mod credentials;
mod server;

pub use client::{resource_provider_namespace, AzureSqlClient};
pub use credentials::AzureCredentials;
pub use server::{generate_observation, Server, ServerProperties, Sku, StorageProfile, STATE_READY};

use crate::crd::ManagedKind;
use crate::provider::{ClientFactory, SqlServerApi};
use anyhow::Result;
use std::sync::Arc;

/// Builds [`AzureSqlClient`]s from the raw Provider Secret value
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureClientFactory;

impl ClientFactory for AzureClientFactory {
    fn new_client(&self, credentials: &[u8], kind: ManagedKind) -> Result<Arc<dyn SqlServerApi>> {
        let credentials = AzureCredentials::from_bytes(credentials)?;
        Ok(Arc::new(AzureSqlClient::new(credentials, kind)?))
    }
}

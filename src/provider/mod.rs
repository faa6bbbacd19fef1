//! # Provider Clients
//!
//! Abstract interface for the Azure Database server APIs.
//!
//! The controller talks to MySQL and PostgreSQL servers through the same
//! [`SqlServerApi`] trait; [`azure`] provides the Resource Manager REST
//! implementation.

pub mod azure;

use crate::crd::{ManagedKind, SqlServerRef};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use azure::{
    generate_observation, AzureClientFactory, AzureCredentials, AzureSqlClient, Server,
    STATE_READY,
};

/// Errors returned by provider API calls
#[derive(Debug, Error)]
pub enum AzureError {
    /// Azure answered with a non-success status
    #[error("Azure API returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    /// Request could not be sent or the response could not be read
    #[error("Azure request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Access token could not be obtained
    #[error("cannot obtain Azure access token: {0}")]
    Token(String),
    /// Response body did not match the expected shape
    #[error("unexpected Azure response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl AzureError {
    /// Whether the error reports that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            AzureError::Api { status, code, .. } => {
                *status == 404 || code == "ResourceNotFound" || code == "NotFound"
            }
            _ => false,
        }
    }
}

/// Azure Database server operations
///
/// Create, update and delete only submit the request; Azure completes them
/// asynchronously and `get_server` keeps reporting not-found until a create
/// has finished.
#[async_trait]
pub trait SqlServerApi: Send + Sync {
    /// Get the server
    async fn get_server(&self, server: &SqlServerRef<'_>) -> Result<Server, AzureError>;

    /// Whether the server name is reserved, either by an existing server or
    /// by a create request that is still in flight
    async fn server_name_taken(&self, server: &SqlServerRef<'_>) -> Result<bool, AzureError>;

    /// Request creation of the server with the given administrator password
    async fn create_server(
        &self,
        server: &SqlServerRef<'_>,
        admin_password: &str,
    ) -> Result<(), AzureError>;

    /// Request an update of the server's mutable properties
    async fn update_server(&self, server: &SqlServerRef<'_>) -> Result<(), AzureError>;

    /// Request deletion of the server
    async fn delete_server(&self, server: &SqlServerRef<'_>) -> Result<(), AzureError>;
}

/// Builds provider clients from raw credential bytes
pub trait ClientFactory: Send + Sync {
    fn new_client(
        &self,
        credentials: &[u8],
        kind: ManagedKind,
    ) -> anyhow::Result<Arc<dyn SqlServerApi>>;
}

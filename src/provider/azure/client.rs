//! # Azure SQL Server Client
//!
//! Resource Manager REST client for Azure Database for MySQL and PostgreSQL.
//!
//! Talks to `Microsoft.DBforMySQL/servers` or `Microsoft.DBforPostgreSQL/servers`
//! depending on the managed kind. Create, update and delete are long running
//! operations on the Azure side; the client only submits them and treats
//! 200/201/202 as accepted.

use super::auth::TokenSource;
use super::credentials::AzureCredentials;
use super::server::{
    NameAvailability, NameAvailabilityRequest, Server, ServerCreateRequest, ServerUpdateRequest,
};
use crate::constants::SQL_SERVER_API_VERSION;
use crate::crd::{ManagedKind, SqlServerRef};
use crate::observability::metrics;
use crate::provider::{AzureError, SqlServerApi};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// Resource provider namespace for a managed kind
pub fn resource_provider_namespace(kind: ManagedKind) -> &'static str {
    match kind {
        ManagedKind::MySqlServer => "Microsoft.DBforMySQL",
        ManagedKind::PostgreSqlServer => "Microsoft.DBforPostgreSQL",
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Azure Database server client bound to one subscription and one resource provider
#[derive(Debug)]
pub struct AzureSqlClient {
    http_client: ReqwestClient,
    tokens: TokenSource,
    subscription_id: String,
    base_url: String,
    namespace: &'static str,
}

impl AzureSqlClient {
    pub fn new(credentials: AzureCredentials, kind: ManagedKind) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            subscription_id: credentials.subscription_id.clone(),
            base_url: credentials.resource_manager_base().to_string(),
            namespace: resource_provider_namespace(kind),
            tokens: TokenSource::new(credentials),
        })
    }

    fn server_url(&self, server: &SqlServerRef<'_>) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/servers/{}?api-version={}",
            self.base_url,
            self.subscription_id,
            server.parameters.resource_group_name,
            self.namespace,
            server.name,
            SQL_SERVER_API_VERSION
        )
    }

    fn name_availability_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/providers/{}/checkNameAvailability?api-version={}",
            self.base_url, self.subscription_id, self.namespace, SQL_SERVER_API_VERSION
        )
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, AzureError> {
        let token = self.tokens.bearer_token(&self.http_client).await?;
        Ok(self
            .http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {token}")))
    }

    /// Send the request and turn non-success statuses into `AzureError::Api`
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, AzureError> {
        let start = Instant::now();
        let result = request.send().await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_azure_request(
                    operation,
                    "transport_error",
                    start.elapsed().as_secs_f64(),
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_azure_request(
            operation,
            status.as_str(),
            start.elapsed().as_secs_f64(),
        );
        debug!(
            operation = operation,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Azure request completed"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }
}

fn api_error(status: u16, body: &str) -> AzureError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => AzureError::Api {
            status,
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => AzureError::Api {
            status,
            code: String::new(),
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl SqlServerApi for AzureSqlClient {
    async fn get_server(&self, server: &SqlServerRef<'_>) -> Result<Server, AzureError> {
        let span = info_span!(
            "azure.sql.server.get",
            server.name = server.name,
            provider.namespace = self.namespace
        );
        async move {
            let url = self.server_url(server);
            let request = self.request(Method::GET, &url).await?;
            let response = self.send("get", request).await?;
            let body = response.bytes().await?;
            serde_json::from_slice(&body).map_err(AzureError::Decode)
        }
        .instrument(span)
        .await
    }

    async fn server_name_taken(&self, server: &SqlServerRef<'_>) -> Result<bool, AzureError> {
        let span = info_span!(
            "azure.sql.server.check_name",
            server.name = server.name,
            provider.namespace = self.namespace
        );
        async move {
            let url = self.name_availability_url();
            let body = NameAvailabilityRequest {
                name: server.name,
                r#type: format!("{}/servers", self.namespace),
            };
            let request = self.request(Method::POST, &url).await?.json(&body);
            let response = self.send("check_name", request).await?;
            let bytes = response.bytes().await?;
            let availability: NameAvailability =
                serde_json::from_slice(&bytes).map_err(AzureError::Decode)?;
            Ok(!availability.name_available)
        }
        .instrument(span)
        .await
    }

    async fn create_server(
        &self,
        server: &SqlServerRef<'_>,
        admin_password: &str,
    ) -> Result<(), AzureError> {
        let span = info_span!(
            "azure.sql.server.create",
            server.name = server.name,
            provider.namespace = self.namespace
        );
        async move {
            let url = self.server_url(server);
            let body = ServerCreateRequest::new(server.parameters, admin_password);
            let request = self.request(Method::PUT, &url).await?.json(&body);
            self.send("create", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn update_server(&self, server: &SqlServerRef<'_>) -> Result<(), AzureError> {
        let span = info_span!(
            "azure.sql.server.update",
            server.name = server.name,
            provider.namespace = self.namespace
        );
        async move {
            let url = self.server_url(server);
            let body = ServerUpdateRequest::new(server.parameters);
            let request = self.request(Method::PATCH, &url).await?.json(&body);
            self.send("update", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn delete_server(&self, server: &SqlServerRef<'_>) -> Result<(), AzureError> {
        let span = info_span!(
            "azure.sql.server.delete",
            server.name = server.name,
            provider.namespace = self.namespace
        );
        async move {
            let url = self.server_url(server);
            let request = self.request(Method::DELETE, &url).await?;
            // 204 means the server was already gone; report it the same way as 404
            let response = self.send("delete", request).await?;
            if response.status() == reqwest::StatusCode::NO_CONTENT {
                return Err(AzureError::Api {
                    status: 404,
                    code: "ResourceNotFound".to_string(),
                    message: format!("server {} does not exist", server.name),
                });
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}

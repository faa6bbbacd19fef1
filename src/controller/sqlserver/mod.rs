//! # SQL Server Lifecycle
//!
//! Observe, create, update and delete for Azure Database servers.
//!
//! Azure's create call is fire-and-forget and not idempotent, while its read
//! API keeps answering not-found until provisioning has finished. Observe
//! therefore falls back to the name-availability check whenever the server
//! is not found: a reserved name means a create is already in flight and must
//! not be requested again.

use crate::constants::{
    CONNECTION_ENDPOINT_KEY, CONNECTION_PASSWORD_KEY, CONNECTION_USERNAME_KEY, PASSWORD_DATA_LEN,
};
use crate::credentials::CredentialResolver;
use crate::crd::{Condition, ManagedKind, ManagedResource};
use crate::managed::{
    ConnectionDetails, ExternalClient, ExternalConnecter, ExternalCreation, ExternalError,
    ExternalObservation, ExternalUpdate,
};
use crate::password::PasswordGenerator;
use crate::provider::{generate_observation, ClientFactory, SqlServerApi, STATE_READY};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

fn ensure_kind(expected: ManagedKind, mg: &ManagedResource) -> Result<(), ExternalError> {
    let found = mg.kind();
    if found == expected {
        Ok(())
    } else {
        Err(ExternalError::KindMismatch { expected, found })
    }
}

/// Binds a managed SQL server to a provider client built from its Provider's credentials
pub struct SqlServerConnecter {
    kind: ManagedKind,
    resolver: Arc<dyn CredentialResolver>,
    client_factory: Arc<dyn ClientFactory>,
    passwords: Arc<dyn PasswordGenerator>,
}

impl std::fmt::Debug for SqlServerConnecter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerConnecter")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl SqlServerConnecter {
    pub fn new(
        kind: ManagedKind,
        resolver: Arc<dyn CredentialResolver>,
        client_factory: Arc<dyn ClientFactory>,
        passwords: Arc<dyn PasswordGenerator>,
    ) -> Self {
        Self {
            kind,
            resolver,
            client_factory,
            passwords,
        }
    }
}

#[async_trait]
impl ExternalConnecter for SqlServerConnecter {
    async fn connect(&self, mg: &ManagedResource) -> Result<Box<dyn ExternalClient>, ExternalError> {
        ensure_kind(self.kind, mg)?;

        let provider_ref = &mg.spec().provider_ref;
        let provider = self
            .resolver
            .provider(provider_ref)
            .await
            .map_err(ExternalError::ProviderResolution)?;

        let credentials = self
            .resolver
            .secret_data(&provider.credentials_secret_ref)
            .await
            .map_err(ExternalError::CredentialResolution)?;

        let client = self
            .client_factory
            .new_client(&credentials, self.kind)
            .map_err(ExternalError::ClientConstruction)?;

        debug!(
            provider = %provider_ref.name,
            kind = %self.kind,
            "Connected SQL server client"
        );

        Ok(Box::new(SqlServerExternal::new(
            self.kind,
            client,
            Arc::clone(&self.passwords),
        )))
    }
}

/// SQL server client bound to one reconcile pass
pub struct SqlServerExternal {
    kind: ManagedKind,
    client: Arc<dyn SqlServerApi>,
    passwords: Arc<dyn PasswordGenerator>,
}

impl std::fmt::Debug for SqlServerExternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerExternal")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl SqlServerExternal {
    pub fn new(
        kind: ManagedKind,
        client: Arc<dyn SqlServerApi>,
        passwords: Arc<dyn PasswordGenerator>,
    ) -> Self {
        Self {
            kind,
            client,
            passwords,
        }
    }
}

#[async_trait]
impl ExternalClient for SqlServerExternal {
    async fn observe(&self, mg: &mut ManagedResource) -> Result<ExternalObservation, ExternalError> {
        ensure_kind(self.kind, mg)?;
        let span = info_span!("sqlserver.observe", server.name = mg.external_name());

        async move {
            let server = match self.client.get_server(&mg.server_ref()).await {
                Ok(server) => server,
                Err(e) if e.is_not_found() => {
                    // Not found is reported until provisioning completes, so a
                    // reserved name means a create is already outstanding.
                    let taken = self
                        .client
                        .server_name_taken(&mg.server_ref())
                        .await
                        .map_err(ExternalError::NameCheck)?;
                    if taken {
                        debug!("SQL server name is reserved, creation in progress");
                    }
                    return Ok(ExternalObservation {
                        resource_exists: taken,
                        resource_up_to_date: taken,
                        connection_details: ConnectionDetails::new(),
                    });
                }
                Err(e) => return Err(ExternalError::Observation(e)),
            };

            let username = format!(
                "{}@{}",
                mg.spec().for_provider.administrator_login,
                mg.external_name()
            );

            let mut connection_details = ConnectionDetails::new();
            if let Some(endpoint) = server.fully_qualified_domain_name() {
                connection_details.insert(
                    CONNECTION_ENDPOINT_KEY.to_string(),
                    endpoint.as_bytes().to_vec(),
                );
            }
            connection_details.insert(CONNECTION_USERNAME_KEY.to_string(), username.into_bytes());

            let status = mg.status_mut();
            status.at_provider = Some(generate_observation(&server));
            if server.user_visible_state() == Some(STATE_READY) {
                status.set_conditions([Condition::available()]);
                status.set_bindable();
            } else {
                status.set_conditions([Condition::unavailable()]);
                status.set_unbindable();
            }

            // Updates are not acted on; SQL servers opt out via supports_update
            Ok(ExternalObservation {
                resource_exists: true,
                resource_up_to_date: false,
                connection_details,
            })
        }
        .instrument(span)
        .await
    }

    async fn create(&self, mg: &mut ManagedResource) -> Result<ExternalCreation, ExternalError> {
        ensure_kind(self.kind, mg)?;
        let span = info_span!("sqlserver.create", server.name = mg.external_name());

        async move {
            mg.set_conditions([Condition::creating()]);

            let password = self
                .passwords
                .generate(PASSWORD_DATA_LEN)
                .map_err(ExternalError::PasswordGeneration)?;

            self.client
                .create_server(&mg.server_ref(), &password)
                .await
                .map_err(ExternalError::Creation)?;

            info!("Requested SQL server creation");

            let mut connection_details = ConnectionDetails::new();
            connection_details.insert(CONNECTION_PASSWORD_KEY.to_string(), password.into_bytes());
            Ok(ExternalCreation { connection_details })
        }
        .instrument(span)
        .await
    }

    async fn update(&self, mg: &mut ManagedResource) -> Result<ExternalUpdate, ExternalError> {
        ensure_kind(self.kind, mg)?;
        let span = info_span!("sqlserver.update", server.name = mg.external_name());

        async move {
            self.client
                .update_server(&mg.server_ref())
                .await
                .map_err(ExternalError::Update)?;
            Ok(ExternalUpdate::default())
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, mg: &mut ManagedResource) -> Result<(), ExternalError> {
        ensure_kind(self.kind, mg)?;
        let span = info_span!("sqlserver.delete", server.name = mg.external_name());

        async move {
            mg.set_conditions([Condition::deleting()]);

            match self.client.delete_server(&mg.server_ref()).await {
                Ok(()) => {
                    info!("Requested SQL server deletion");
                    Ok(())
                }
                Err(e) if e.is_not_found() => {
                    debug!("SQL server already gone");
                    Ok(())
                }
                Err(e) => Err(ExternalError::Deletion(e)),
            }
        }
        .instrument(span)
        .await
    }

    fn supports_update(&self) -> bool {
        false
    }
}

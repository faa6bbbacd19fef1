//! SQL Server Lifecycle Tests
//!
//! Drives the SQL server state machine against an in-memory Azure that
//! mimics Resource Manager's asynchronous provisioning: a created server
//! answers not-found to reads but reserves its name until provisioning
//! finishes.

use async_trait::async_trait;
use azure_sql_controller::constants::{
    CONNECTION_ENDPOINT_KEY, CONNECTION_PASSWORD_KEY, CONNECTION_USERNAME_KEY,
    EXTERNAL_NAME_ANNOTATION, MANAGED_FINALIZER, PASSWORD_DATA_LEN,
};
use azure_sql_controller::controller::reconciler::{run_external_pass, PassOutcome};
use azure_sql_controller::controller::sqlserver::SqlServerExternal;
use azure_sql_controller::crd::{
    ManagedKind, ManagedResource, MySQLServer, MySQLServerSpec, ProviderReference, ReclaimPolicy,
    SkuSpec, SkuTier, SqlServerParameters, SqlServerRef, SqlServerSpec, StorageProfileSpec,
    CONDITION_TYPE_READY, REASON_AVAILABLE, REASON_UNAVAILABLE,
};
use azure_sql_controller::managed::ExternalClient;
use azure_sql_controller::password::RandomPasswordGenerator;
use azure_sql_controller::provider::azure::ServerProperties;
use azure_sql_controller::provider::{AzureError, Server, SqlServerApi, STATE_READY};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct AzureState {
    servers: HashMap<String, Server>,
    provisioning: HashSet<String>,
    created: Vec<(String, String)>,
    delete_calls: usize,
}

/// In-memory stand-in for Azure Database for MySQL
#[derive(Default)]
struct SimulatedAzure {
    state: Mutex<AzureState>,
}

impl SimulatedAzure {
    fn with_server(name: &str, state: Option<&str>, fqdn: Option<&str>) -> Self {
        let azure = Self::default();
        azure
            .state
            .lock()
            .unwrap()
            .servers
            .insert(name.to_string(), server(name, state, fqdn));
        azure
    }

    /// Finish provisioning of a pending create
    fn complete_provisioning(&self, name: &str, fqdn: &str) {
        let mut state = self.state.lock().unwrap();
        assert!(state.provisioning.remove(name), "no pending create for {name}");
        state
            .servers
            .insert(name.to_string(), server(name, Some(STATE_READY), Some(fqdn)));
    }

    fn created(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created.clone()
    }

    fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }
}

fn server(name: &str, state: Option<&str>, fqdn: Option<&str>) -> Server {
    Server {
        name: Some(name.to_string()),
        r#type: Some("Microsoft.DBforMySQL/servers".to_string()),
        properties: Some(ServerProperties {
            administrator_login: Some("admin".to_string()),
            user_visible_state: state.map(str::to_string),
            fully_qualified_domain_name: fqdn.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn api_error(status: u16, code: &str) -> AzureError {
    AzureError::Api {
        status,
        code: code.to_string(),
        message: format!("simulated {code}"),
    }
}

#[async_trait]
impl SqlServerApi for SimulatedAzure {
    async fn get_server(&self, server: &SqlServerRef<'_>) -> Result<Server, AzureError> {
        self.state
            .lock()
            .unwrap()
            .servers
            .get(server.name)
            .cloned()
            .ok_or_else(|| api_error(404, "ResourceNotFound"))
    }

    async fn server_name_taken(&self, server: &SqlServerRef<'_>) -> Result<bool, AzureError> {
        let state = self.state.lock().unwrap();
        Ok(state.servers.contains_key(server.name) || state.provisioning.contains(server.name))
    }

    async fn create_server(
        &self,
        server: &SqlServerRef<'_>,
        admin_password: &str,
    ) -> Result<(), AzureError> {
        let mut state = self.state.lock().unwrap();
        if state.servers.contains_key(server.name) || state.provisioning.contains(server.name) {
            return Err(api_error(409, "ServerAlreadyExists"));
        }
        state.provisioning.insert(server.name.to_string());
        state
            .created
            .push((server.name.to_string(), admin_password.to_string()));
        Ok(())
    }

    async fn update_server(&self, _server: &SqlServerRef<'_>) -> Result<(), AzureError> {
        Ok(())
    }

    async fn delete_server(&self, server: &SqlServerRef<'_>) -> Result<(), AzureError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        let removed = state.servers.remove(server.name).is_some()
            || state.provisioning.remove(server.name);
        if removed {
            Ok(())
        } else {
            Err(api_error(404, "ResourceNotFound"))
        }
    }
}

fn mysql_server(name: &str, login: &str) -> MySQLServer {
    MySQLServer::new(
        name,
        MySQLServerSpec {
            server: SqlServerSpec {
                provider_ref: ProviderReference {
                    name: "azure-provider".to_string(),
                },
                write_connection_secret_to_ref: None,
                reclaim_policy: ReclaimPolicy::Delete,
                for_provider: SqlServerParameters {
                    administrator_login: login.to_string(),
                    resource_group_name: "rg".to_string(),
                    location: "westeurope".to_string(),
                    sku: SkuSpec {
                        tier: SkuTier::GeneralPurpose,
                        capacity: 2,
                        family: "Gen5".to_string(),
                    },
                    storage_profile: StorageProfileSpec {
                        storage_gb: 10,
                        backup_retention_days: Some(7),
                        geo_redundant_backup: Some(false),
                    },
                    version: "5.7".to_string(),
                    ssl_enforced: true,
                    tags: None,
                },
            },
        },
    )
}

fn managed(name: &str) -> ManagedResource {
    mysql_server(name, "admin").into()
}

fn external(azure: &Arc<SimulatedAzure>) -> SqlServerExternal {
    let client: Arc<dyn SqlServerApi> = Arc::clone(azure) as Arc<dyn SqlServerApi>;
    SqlServerExternal::new(
        ManagedKind::MySqlServer,
        client,
        Arc::new(RandomPasswordGenerator),
    )
}

fn detail(details: &BTreeMap<String, Vec<u8>>, key: &str) -> Option<String> {
    details
        .get(key)
        .map(|v| String::from_utf8(v.clone()).unwrap())
}

#[tokio::test]
async fn test_never_created_server_is_created_once_with_generated_password() {
    let azure = Arc::new(SimulatedAzure::default());
    let client = external(&azure);
    let mut mg = managed("db1");

    let observation = client.observe(&mut mg).await.unwrap();
    assert!(!observation.resource_exists);
    assert!(observation.connection_details.is_empty());

    let creation = client.create(&mut mg).await.unwrap();
    let created = azure.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, "db1");

    let password = detail(&creation.connection_details, CONNECTION_PASSWORD_KEY).unwrap();
    assert_eq!(password.len(), PASSWORD_DATA_LEN);
    assert_eq!(password, created[0].1);
    assert_eq!(creation.connection_details.len(), 1);
}

#[tokio::test]
async fn test_reserved_name_reports_existing_and_up_to_date() {
    let azure = Arc::new(SimulatedAzure::default());
    azure
        .state
        .lock()
        .unwrap()
        .provisioning
        .insert("db1".to_string());
    let client = external(&azure);
    let mut mg = managed("db1");

    let observation = client.observe(&mut mg).await.unwrap();

    assert!(observation.resource_exists);
    assert!(observation.resource_up_to_date);
    assert!(observation.connection_details.is_empty());
    assert!(mg.status().map_or(true, |s| s.conditions.is_empty()));
    assert!(azure.created().is_empty());
}

#[tokio::test]
async fn test_ready_server_is_available_and_bindable() {
    let azure = Arc::new(SimulatedAzure::with_server(
        "db1",
        Some(STATE_READY),
        Some("db1.example.net"),
    ));
    let client = external(&azure);
    let mut mg = managed("db1");

    let observation = client.observe(&mut mg).await.unwrap();

    assert!(observation.resource_exists);
    assert_eq!(
        detail(&observation.connection_details, CONNECTION_ENDPOINT_KEY).as_deref(),
        Some("db1.example.net")
    );
    assert_eq!(
        detail(&observation.connection_details, CONNECTION_USERNAME_KEY).as_deref(),
        Some("admin@db1")
    );
    assert_eq!(observation.connection_details.len(), 2);

    let status = mg.status().unwrap();
    let ready = status.condition(CONDITION_TYPE_READY).unwrap();
    assert!(ready.is_true());
    assert_eq!(ready.reason.as_deref(), Some(REASON_AVAILABLE));
    assert!(status.is_bindable());
    assert_eq!(
        status
            .at_provider
            .as_ref()
            .and_then(|p| p.fully_qualified_domain_name.as_deref()),
        Some("db1.example.net")
    );
}

#[tokio::test]
async fn test_deleting_missing_server_succeeds() {
    let azure = Arc::new(SimulatedAzure::default());
    let client = external(&azure);
    let mut mg = managed("db1");

    client.delete(&mut mg).await.unwrap();
    assert_eq!(azure.delete_calls(), 1);

    // A second delete of the same missing server is just as quiet
    client.delete(&mut mg).await.unwrap();
    assert_eq!(azure.delete_calls(), 2);
}

#[tokio::test]
async fn test_repeated_passes_never_create_twice() {
    let azure = Arc::new(SimulatedAzure::default());
    let client = external(&azure);
    let mut mg = managed("db1");

    let first = run_external_pass(&mut mg, &client).await.unwrap();
    assert!(matches!(first, PassOutcome::Created(_)));

    for _ in 0..3 {
        let outcome = run_external_pass(&mut mg, &client).await.unwrap();
        assert_eq!(outcome, PassOutcome::Observed(BTreeMap::new()));
    }
    assert_eq!(azure.created().len(), 1);

    azure.complete_provisioning("db1", "db1.mysql.database.azure.com");
    let outcome = run_external_pass(&mut mg, &client).await.unwrap();
    let details = outcome.connection_details().unwrap();
    assert_eq!(
        detail(details, CONNECTION_ENDPOINT_KEY).as_deref(),
        Some("db1.mysql.database.azure.com")
    );
    assert_eq!(azure.created().len(), 1);
}

#[tokio::test]
async fn test_observe_never_reports_password() {
    let azure = Arc::new(SimulatedAzure::default());
    let client = external(&azure);
    let mut mg = managed("db1");

    let creation = client.create(&mut mg).await.unwrap();
    assert!(creation.connection_details.contains_key(CONNECTION_PASSWORD_KEY));

    let pending = client.observe(&mut mg).await.unwrap();
    assert!(!pending.connection_details.contains_key(CONNECTION_PASSWORD_KEY));

    azure.complete_provisioning("db1", "db1.example.net");
    let ready = client.observe(&mut mg).await.unwrap();
    assert!(!ready.connection_details.contains_key(CONNECTION_PASSWORD_KEY));
}

#[tokio::test]
async fn test_each_create_generates_a_fresh_password() {
    let azure = Arc::new(SimulatedAzure::default());
    let client = external(&azure);

    let mut first = managed("db1");
    let mut second = managed("db2");
    client.create(&mut first).await.unwrap();
    client.create(&mut second).await.unwrap();

    let created = azure.created();
    assert_eq!(created.len(), 2);
    assert_ne!(created[0].1, created[1].1);
}

#[tokio::test]
async fn test_non_ready_states_are_unavailable_and_unbindable() {
    for state in [Some("Disabled"), Some("Dropping"), Some("Inaccessible"), None] {
        let azure = Arc::new(SimulatedAzure::with_server("db1", state, Some("db1.example.net")));
        let client = external(&azure);
        let mut mg = managed("db1");

        client.observe(&mut mg).await.unwrap();

        let status = mg.status().unwrap();
        let ready = status.condition(CONDITION_TYPE_READY).unwrap();
        assert!(!ready.is_true(), "state {state:?}");
        assert_eq!(ready.reason.as_deref(), Some(REASON_UNAVAILABLE));
        assert!(!status.is_bindable(), "state {state:?}");
    }
}

#[tokio::test]
async fn test_server_becoming_ready_flips_conditions() {
    let azure = Arc::new(SimulatedAzure::with_server("db1", Some("Disabled"), None));
    let client = external(&azure);
    let mut mg = managed("db1");

    let observation = client.observe(&mut mg).await.unwrap();
    assert!(!observation.connection_details.contains_key(CONNECTION_ENDPOINT_KEY));
    assert!(!mg.status().unwrap().is_bindable());

    azure
        .state
        .lock()
        .unwrap()
        .servers
        .insert("db1".to_string(), server("db1", Some(STATE_READY), Some("db1.example.net")));
    client.observe(&mut mg).await.unwrap();

    let status = mg.status().unwrap();
    assert!(status.condition(CONDITION_TYPE_READY).unwrap().is_true());
    assert!(status.is_bindable());
}

#[tokio::test]
async fn test_username_uses_external_name() {
    let azure = Arc::new(SimulatedAzure::with_server(
        "prod-db-eu",
        Some(STATE_READY),
        Some("prod-db-eu.example.net"),
    ));
    let client = external(&azure);

    let mut cr = mysql_server("db1", "dbadmin");
    cr.metadata.annotations = Some(BTreeMap::from([(
        EXTERNAL_NAME_ANNOTATION.to_string(),
        "prod-db-eu".to_string(),
    )]));
    let mut mg: ManagedResource = cr.into();

    let observation = client.observe(&mut mg).await.unwrap();
    assert_eq!(
        detail(&observation.connection_details, CONNECTION_USERNAME_KEY).as_deref(),
        Some("dbadmin@prod-db-eu")
    );
}

#[tokio::test]
async fn test_deletion_pass_deletes_then_releases() {
    let azure = Arc::new(SimulatedAzure::with_server(
        "db1",
        Some(STATE_READY),
        Some("db1.example.net"),
    ));
    let client = external(&azure);

    let mut cr = mysql_server("db1", "admin");
    cr.metadata = serde_json::from_value(serde_json::json!({
        "name": "db1",
        "namespace": "default",
        "deletionTimestamp": "2024-01-01T00:00:00Z",
        "finalizers": [MANAGED_FINALIZER]
    }))
    .unwrap();
    let mut mg: ManagedResource = cr.into();

    let first = run_external_pass(&mut mg, &client).await.unwrap();
    assert_eq!(first, PassOutcome::DeletionRequested);
    assert_eq!(azure.delete_calls(), 1);

    let second = run_external_pass(&mut mg, &client).await.unwrap();
    assert_eq!(second, PassOutcome::Deleted);
    assert_eq!(azure.delete_calls(), 1);
    assert!(azure.created().is_empty());
}

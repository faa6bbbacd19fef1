//! # AZSQLCTL CLI
//!
//! Command-line interface for the Azure SQL Controller.
//!
//! ## Usage
//!
//! ```bash
//! # Trigger reconciliation for a specific MySQLServer
//! azsqlctl reconcile --namespace default --name db1
//!
//! # List all PostgreSQLServer resources
//! azsqlctl --kind postgresql list
//!
//! # Show status of a MySQLServer
//! azsqlctl status --namespace default --name db1
//! ```

use anyhow::{Context, Result};
use azure_sql_controller::constants::RECONCILE_REQUEST_ANNOTATION;
use azure_sql_controller::crd::{
    ManagedResource, MySQLServer, PostgreSQLServer, CONDITION_TYPE_READY, CONDITION_TYPE_SYNCED,
};
use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;

/// Azure SQL Controller CLI
#[derive(Parser)]
#[command(name = "azsqlctl")]
#[command(about = "Azure SQL Controller CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Managed resource kind
    #[arg(short, long, global = true, value_enum, default_value_t = Kind::Mysql)]
    kind: Kind,

    /// Kubernetes namespace (defaults to `default`, or all namespaces for `list`)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Mysql,
    Postgresql,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger reconciliation for a server resource
    Reconcile {
        /// Name of the server resource
        #[arg(long)]
        name: String,
    },
    /// List server resources
    List,
    /// Show status of a server resource
    Status {
        /// Name of the server resource
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "azsqlctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.kind {
        Kind::Mysql => run::<MySQLServer>(client, cli.command, cli.namespace).await,
        Kind::Postgresql => run::<PostgreSQLServer>(client, cli.command, cli.namespace).await,
    }
}

async fn run<K>(client: Client, command: Commands, namespace: Option<String>) -> Result<()>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Into<ManagedResource>,
{
    match command {
        Commands::Reconcile { name } => reconcile_command::<K>(client, &name, namespace).await,
        Commands::List => list_command::<K>(client, namespace).await,
        Commands::Status { name } => status_command::<K>(client, &name, namespace).await,
    }
}

/// Trigger reconciliation by updating the reconcile-request annotation
///
/// Any metadata change wakes the controller's watch for that object.
async fn reconcile_command<K>(client: Client, name: &str, namespace: Option<String>) -> Result<()>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let kind = K::kind(&());
    let ns = namespace.as_deref().unwrap_or("default");

    println!("Triggering reconciliation for {kind} '{ns}/{name}'...");

    let api: Api<K> = Api::namespaced(client, ns);
    let timestamp = chrono::Utc::now().to_rfc3339();

    let patch = json!({
        "metadata": {
            "annotations": {
                RECONCILE_REQUEST_ANNOTATION: timestamp
            }
        }
    });

    api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| format!("Failed to trigger reconciliation for '{ns}/{name}'"))?;

    println!("Reconciliation triggered");
    println!("   Resource: {ns}/{name}");
    println!("   Requested at: {timestamp}");

    Ok(())
}

async fn list_command<K>(client: Client, namespace: Option<String>) -> Result<()>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Into<ManagedResource>,
{
    let kind = K::kind(&());
    let api: Api<K> = if let Some(ns) = namespace.as_deref() {
        println!("Listing {kind} resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing {kind} resources in all namespaces...");
        Api::all(client)
    };

    let servers = api
        .list(&ListParams::default())
        .await
        .with_context(|| format!("Failed to list {kind} resources"))?;

    if servers.items.is_empty() {
        println!("No {kind} resources found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<8} {:<8} {:<12} {:<40}",
        "NAME", "NAMESPACE", "READY", "SYNCED", "STATE", "ENDPOINT"
    );
    println!("{}", "-".repeat(120));

    for server in servers.items {
        let mg: ManagedResource = server.into();
        let status = mg.status();
        let condition = |condition_type: &str| {
            status
                .and_then(|s| s.condition(condition_type))
                .map_or("Unknown", |c| c.status.as_str())
                .to_string()
        };
        let at_provider = status.and_then(|s| s.at_provider.as_ref());

        println!(
            "{:<30} {:<20} {:<8} {:<8} {:<12} {:<40}",
            mg.name(),
            mg.namespace(),
            condition(CONDITION_TYPE_READY),
            condition(CONDITION_TYPE_SYNCED),
            at_provider
                .and_then(|p| p.user_visible_state.as_deref())
                .unwrap_or("-"),
            at_provider
                .and_then(|p| p.fully_qualified_domain_name.as_deref())
                .unwrap_or("-"),
        );
    }

    Ok(())
}

async fn status_command<K>(client: Client, name: &str, namespace: Option<String>) -> Result<()>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Into<ManagedResource>,
{
    let kind = K::kind(&());
    let ns = namespace.as_deref().unwrap_or("default");

    println!("Status for {kind} '{ns}/{name}':\n");

    let api: Api<K> = Api::namespaced(client, ns);
    let mg: ManagedResource = api
        .get(name)
        .await
        .with_context(|| format!("Failed to get {kind} '{ns}/{name}'"))?
        .into();

    println!("Metadata:");
    println!("  Name: {}", mg.name());
    println!("  Namespace: {}", mg.namespace());
    println!("  External Name: {}", mg.external_name());
    if mg.is_being_deleted() {
        println!("  Being deleted: true");
    }

    let spec = mg.spec();
    let params = &spec.for_provider;
    println!("\nSpec:");
    println!("  Provider: {}", spec.provider_ref.name);
    println!("  Reclaim Policy: {:?}", spec.reclaim_policy);
    println!("  Resource Group: {}", params.resource_group_name);
    println!("  Location: {}", params.location);
    println!("  SKU: {}", params.sku.sku_name());
    println!("  Version: {}", params.version);
    if let Some(secret_ref) = &spec.write_connection_secret_to_ref {
        println!("  Connection Secret: {}", secret_ref.name);
    }

    let Some(status) = mg.status() else {
        println!("\nStatus: No status available (resource may not have been reconciled yet)");
        return Ok(());
    };

    println!("\nStatus:");
    if let Some(phase) = status.binding_phase {
        println!("  Binding Phase: {phase:?}");
    }
    if let Some(at_provider) = &status.at_provider {
        if let Some(state) = &at_provider.user_visible_state {
            println!("  State: {state}");
        }
        if let Some(fqdn) = &at_provider.fully_qualified_domain_name {
            println!("  Endpoint: {fqdn}");
        }
        if let Some(id) = &at_provider.id {
            println!("  Azure ID: {id}");
        }
    }

    if !status.conditions.is_empty() {
        println!("\nConditions:");
        for condition in &status.conditions {
            println!("  {}: {}", condition.r#type, condition.status);
            if let Some(reason) = &condition.reason {
                println!("    Reason: {reason}");
            }
            if let Some(message) = &condition.message {
                println!("    Message: {message}");
            }
            if let Some(time) = &condition.last_transition_time {
                println!("    Last Transition: {time}");
            }
        }
    }

    Ok(())
}

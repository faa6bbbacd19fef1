//! # Azure SQL Controller
//!
//! A Kubernetes controller that provisions Azure Database for MySQL and
//! PostgreSQL servers from `MySQLServer` and `PostgreSQLServer` resources.
//!
//! ## Overview
//!
//! For every managed resource the controller:
//!
//! 1. **Resolves credentials** - Reads the referenced `Provider` and its Azure
//!    service principal Secret
//! 2. **Observes the server** - Queries Azure Resource Manager and records the
//!    observed state in `status.atProvider`
//! 3. **Creates or deletes** - Creates missing servers with a generated
//!    administrator password and deletes them when the resource is deleted
//!    with reclaim policy `Delete`
//! 4. **Publishes connection details** - Writes endpoint, username and
//!    password to the connection Secret
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for detailed usage instructions and examples.

use anyhow::Result;
use azure_sql_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(init_result.mysql, init_result.postgresql).await
}

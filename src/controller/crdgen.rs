//! # CRD Generator
//!
//! Prints the `MySQLServer`, `PostgreSQLServer` and `Provider`
//! CustomResourceDefinitions as a multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/azure-sql-controller.yaml
//! ```

use anyhow::Result;
use azure_sql_controller::crd::{MySQLServer, PostgreSQLServer, Provider};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [MySQLServer::crd(), PostgreSQLServer::crd(), Provider::crd()];

    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}

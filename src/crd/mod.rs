//! # Custom Resource Definitions
//!
//! CRD types for the Azure SQL Controller.
//!
//! - `MySQLServer` / `PostgreSQLServer`: namespaced managed resources describing
//!   an Azure Database server
//! - `Provider`: cluster-scoped reference to Azure credentials
//! - `ManagedResource`: sum type the reconciler passes through each pass

pub mod managed;
pub mod provider;
pub mod sql_server;
pub mod status;

pub use managed::*;
pub use provider::*;
pub use sql_server::*;
pub use status::*;

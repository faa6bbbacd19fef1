//! # Managed Resources
//!
//! Sum type over every resource kind the controller manages. Operations that
//! only make sense for one kind check the variant at their boundary.

use super::sql_server::{MySQLServer, PostgreSQLServer, SqlServerParameters, SqlServerSpec};
use super::status::{Condition, SqlServerStatus};
use crate::constants::EXTERNAL_NAME_ANNOTATION;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use std::fmt;

/// Kinds of managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedKind {
    MySqlServer,
    PostgreSqlServer,
}

impl ManagedKind {
    /// Kubernetes kind name
    pub fn as_str(self) -> &'static str {
        match self {
            ManagedKind::MySqlServer => "MySQLServer",
            ManagedKind::PostgreSqlServer => "PostgreSQLServer",
        }
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed resource owned by a single reconcile pass
#[derive(Debug, Clone)]
pub enum ManagedResource {
    MySqlServer(MySQLServer),
    PostgreSqlServer(PostgreSQLServer),
}

impl From<MySQLServer> for ManagedResource {
    fn from(server: MySQLServer) -> Self {
        ManagedResource::MySqlServer(server)
    }
}

impl From<PostgreSQLServer> for ManagedResource {
    fn from(server: PostgreSQLServer) -> Self {
        ManagedResource::PostgreSqlServer(server)
    }
}

/// Borrowed view of a server as needed by provider API calls
#[derive(Debug, Clone, Copy)]
pub struct SqlServerRef<'a> {
    /// Provider-side server name
    pub name: &'a str,
    pub parameters: &'a SqlServerParameters,
}

impl ManagedResource {
    pub fn kind(&self) -> ManagedKind {
        match self {
            ManagedResource::MySqlServer(_) => ManagedKind::MySqlServer,
            ManagedResource::PostgreSqlServer(_) => ManagedKind::PostgreSqlServer,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ManagedResource::MySqlServer(cr) => &cr.metadata,
            ManagedResource::PostgreSqlServer(cr) => &cr.metadata,
        }
    }

    pub fn spec(&self) -> &SqlServerSpec {
        match self {
            ManagedResource::MySqlServer(cr) => &cr.spec.server,
            ManagedResource::PostgreSqlServer(cr) => &cr.spec.server,
        }
    }

    pub fn status(&self) -> Option<&SqlServerStatus> {
        match self {
            ManagedResource::MySqlServer(cr) => cr.status.as_ref(),
            ManagedResource::PostgreSqlServer(cr) => cr.status.as_ref(),
        }
    }

    /// Mutable status, initialised to the default when absent
    pub fn status_mut(&mut self) -> &mut SqlServerStatus {
        let status = match self {
            ManagedResource::MySqlServer(cr) => &mut cr.status,
            ManagedResource::PostgreSqlServer(cr) => &mut cr.status,
        };
        status.get_or_insert_with(SqlServerStatus::default)
    }

    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.status_mut().set_conditions(conditions);
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or("unknown")
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or("default")
    }

    /// Provider-side name: the external-name annotation when set, otherwise
    /// the Kubernetes object name
    pub fn external_name(&self) -> &str {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|ann| ann.get(EXTERNAL_NAME_ANNOTATION))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.meta().name.as_deref().unwrap_or_default())
    }

    pub fn server_ref(&self) -> SqlServerRef<'_> {
        SqlServerRef {
            name: self.external_name(),
            parameters: &self.spec().for_provider,
        }
    }

    pub fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|s| s == finalizer))
    }

    /// Owner reference making the managed resource the controller of a dependent object
    pub fn controller_owner_ref(&self) -> Option<OwnerReference> {
        match self {
            ManagedResource::MySqlServer(cr) => cr.controller_owner_ref(&()),
            ManagedResource::PostgreSqlServer(cr) => cr.controller_owner_ref(&()),
        }
    }
}

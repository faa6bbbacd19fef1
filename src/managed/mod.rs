//! # Managed Resource Contract
//!
//! Generic contract between the reconciler and the code that manages one kind
//! of external resource.
//!
//! A reconcile pass calls [`ExternalConnecter::connect`] to obtain an
//! [`ExternalClient`] bound to fresh credentials, then `observe`, and based on
//! the observation at most one of `create`, `update` or `delete`. Clients are
//! never reused across passes.

mod error;

pub use error::{error_chain, ExternalError};

use crate::crd::ManagedResource;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Connection details keyed by `endpoint`, `username` and `password`
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Result of observing the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    /// The resource exists, or its creation is already in flight
    pub resource_exists: bool,
    /// The resource matches the desired state
    pub resource_up_to_date: bool,
    pub connection_details: ConnectionDetails,
}

/// Result of requesting creation of the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Result of requesting an update of the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Produces an [`ExternalClient`] for a managed resource
#[async_trait]
pub trait ExternalConnecter: Send + Sync {
    async fn connect(&self, mg: &ManagedResource) -> Result<Box<dyn ExternalClient>, ExternalError>;
}

/// Observe, create, update and delete one external resource
///
/// Conditions and observed state are written into the managed resource in
/// place; persisting them is left to the caller.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn observe(&self, mg: &mut ManagedResource) -> Result<ExternalObservation, ExternalError>;

    async fn create(&self, mg: &mut ManagedResource) -> Result<ExternalCreation, ExternalError>;

    async fn update(&self, mg: &mut ManagedResource) -> Result<ExternalUpdate, ExternalError>;

    async fn delete(&self, mg: &mut ManagedResource) -> Result<(), ExternalError>;

    /// Whether `update` is worth calling when `observe` reports drift
    fn supports_update(&self) -> bool {
        true
    }
}

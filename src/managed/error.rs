use crate::crd::ManagedKind;
use crate::provider::AzureError;
use thiserror::Error;

/// Failures of the external resource lifecycle
///
/// Each variant names the phase that failed and keeps the underlying cause
/// as its source.
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("managed resource is not a {expected}")]
    KindMismatch {
        expected: ManagedKind,
        found: ManagedKind,
    },
    #[error("cannot get Azure provider")]
    ProviderResolution(#[source] anyhow::Error),
    #[error("cannot get Azure provider Secret")]
    CredentialResolution(#[source] anyhow::Error),
    #[error("cannot create new SQL server client")]
    ClientConstruction(#[source] anyhow::Error),
    #[error("cannot get SQL server")]
    Observation(#[source] AzureError),
    #[error("cannot check SQL server name availability")]
    NameCheck(#[source] AzureError),
    #[error("cannot generate admin password")]
    PasswordGeneration(#[source] anyhow::Error),
    #[error("cannot create SQL server")]
    Creation(#[source] AzureError),
    #[error("cannot update SQL server")]
    Update(#[source] AzureError),
    #[error("cannot delete SQL server")]
    Deletion(#[source] AzureError),
}

impl ExternalError {
    /// Short label used for metrics and log fields
    pub fn kind_label(&self) -> &'static str {
        match self {
            ExternalError::KindMismatch { .. } => "kind_mismatch",
            ExternalError::ProviderResolution(_) => "provider_resolution",
            ExternalError::CredentialResolution(_) => "credential_resolution",
            ExternalError::ClientConstruction(_) => "client_construction",
            ExternalError::Observation(_) => "observation",
            ExternalError::NameCheck(_) => "name_check",
            ExternalError::PasswordGeneration(_) => "password_generation",
            ExternalError::Creation(_) => "creation",
            ExternalError::Update(_) => "update",
            ExternalError::Deletion(_) => "deletion",
        }
    }
}

/// Render an error and its sources as `context: cause: cause`
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_cause() {
        let err = ExternalError::Observation(AzureError::Api {
            status: 500,
            code: "InternalServerError".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(
            error_chain(&err),
            "cannot get SQL server: Azure API returned 500 (InternalServerError): boom"
        );
    }

    #[test]
    fn test_error_chain_walks_anyhow_context() {
        let cause = anyhow::anyhow!("secrets \"creds\" not found").context("Failed to get Secret");
        let err = ExternalError::CredentialResolution(cause);
        assert_eq!(
            error_chain(&err),
            "cannot get Azure provider Secret: Failed to get Secret: secrets \"creds\" not found"
        );
    }

    #[test]
    fn test_kind_mismatch_message() {
        let err = ExternalError::KindMismatch {
            expected: ManagedKind::MySqlServer,
            found: ManagedKind::PostgreSqlServer,
        };
        assert_eq!(err.to_string(), "managed resource is not a MySQLServer");
        assert_eq!(err.kind_label(), "kind_mismatch");
    }
}

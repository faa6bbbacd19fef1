//! # Constants
//!
//! Process-wide constants for the Azure SQL Controller.
//!
//! Values that can be tuned at runtime live in [`crate::config`]; everything
//! here is fixed at compile time.

/// Length of the administrator password generated for new servers
pub const PASSWORD_DATA_LEN: usize = 20;

/// Finalizer placed on managed resources so the external server can be
/// deleted before the Kubernetes object goes away
pub const MANAGED_FINALIZER: &str = "finalizer.managedresource.azure.microscaler.io";

/// Annotation overriding the provider-side name of a managed resource
pub const EXTERNAL_NAME_ANNOTATION: &str = "azure.microscaler.io/external-name";

/// Annotation written by `azsqlctl reconcile` to request an immediate pass
pub const RECONCILE_REQUEST_ANNOTATION: &str = "azure.microscaler.io/reconcile-requested-at";

/// Field manager used for every patch issued by the controller
pub const FIELD_MANAGER: &str = "azure-sql-controller";

// Connection secret keys
pub const CONNECTION_ENDPOINT_KEY: &str = "endpoint";
pub const CONNECTION_USERNAME_KEY: &str = "username";
pub const CONNECTION_PASSWORD_KEY: &str = "password";

// Server defaults
pub const DEFAULT_METRICS_PORT: u16 = 8080;
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

// Requeue defaults
pub const DEFAULT_SHORT_WAIT_SECS: u64 = 30;
pub const DEFAULT_LONG_WAIT_SECS: u64 = 60;
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 60;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Watcher timeout (seconds) - must be less than the client read timeout (30s)
pub const WATCH_TIMEOUT_SECS: u32 = 25;

// Azure Resource Manager
pub const DEFAULT_ACTIVE_DIRECTORY_ENDPOINT: &str = "https://login.microsoftonline.com";
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com/";
pub const SQL_SERVER_API_VERSION: &str = "2017-12-01";

/// Refresh access tokens this many seconds before they expire
pub const TOKEN_EXPIRY_SKEW_SECS: u64 = 120;

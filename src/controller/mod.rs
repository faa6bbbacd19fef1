//! # Controller
//!
//! - `sqlserver`: lifecycle of Azure Database servers
//! - `reconciler`: generic managed-resource reconcile pass
//! - `backoff`: error retry delays
//! - `server`: metrics and health endpoints

pub mod backoff;
pub mod reconciler;
pub mod server;
pub mod sqlserver;

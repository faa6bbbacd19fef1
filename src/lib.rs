//! # Azure SQL Controller
//!
//! Library crate backing the `azure-sql-controller`, `crdgen` and `azsqlctl`
//! binaries.

pub mod config;
pub mod constants;
pub mod controller;
pub mod credentials;
pub mod crd;
pub mod managed;
pub mod observability;
pub mod password;
pub mod provider;
pub mod runtime;

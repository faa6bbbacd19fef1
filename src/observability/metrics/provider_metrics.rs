//! # Provider Metrics
//!
//! Azure Resource Manager request counts and latencies.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec};
use std::sync::LazyLock;

static AZURE_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azure_sql_provider_requests_total",
            "Total number of Azure Resource Manager requests by operation and status",
        ),
        &["operation", "status"],
    )
    .expect("Failed to create AZURE_REQUESTS_TOTAL metric - this should never happen")
});

static AZURE_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "azure_sql_provider_request_duration_seconds",
            "Duration of Azure Resource Manager requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create AZURE_REQUEST_DURATION metric - this should never happen")
});

/// Register provider metrics with the registry
pub(crate) fn register_provider_metrics() -> Result<()> {
    REGISTRY.register(Box::new(AZURE_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AZURE_REQUEST_DURATION.clone()))?;
    Ok(())
}

pub fn record_azure_request(operation: &str, status: &str, duration: f64) {
    AZURE_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    AZURE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

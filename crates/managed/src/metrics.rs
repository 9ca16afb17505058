//! # Metrics
//!
//! Prometheus metrics for the managed reconciler.
//!
//! ## Metrics Exposed
//!
//! - `gcp_managed_reconciles_total{kind,outcome}` - Reconcile cycles by result
//! - `gcp_managed_external_errors_total{kind,stage}` - Failed external calls
//! - `gcp_managed_reconcile_duration_seconds{kind}` - Duration of reconcile cycles

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("gcp_managed_reconciles_total", "Total number of reconcile cycles"),
        &["kind", "outcome"],
    )
    .expect("Failed to create RECONCILES_TOTAL metric - this should never happen")
});

static EXTERNAL_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gcp_managed_external_errors_total",
            "Total number of failed calls to the external API",
        ),
        &["kind", "stage"],
    )
    .expect("Failed to create EXTERNAL_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gcp_managed_reconcile_duration_seconds",
            "Duration of reconcile cycles in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILE_DURATION metric - this should never happen")
});

/// Register all metrics with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(RECONCILES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXTERNAL_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_DURATION.clone()))?;

    Ok(())
}

/// Count a finished cycle; `outcome` is e.g. "success", "error", "timeout"
pub fn increment_reconciles(kind: &str, outcome: &str) {
    RECONCILES_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn increment_external_errors(kind: &str, stage: &str) {
    EXTERNAL_ERRORS_TOTAL.with_label_values(&[kind, stage]).inc();
}

pub fn observe_reconcile_duration(kind: &str, duration: f64) {
    RECONCILE_DURATION.with_label_values(&[kind]).observe(duration);
}

//! Prometheus Metrics for the ingestion run
//!
//! Metrics include:
//! - upstream requests by endpoint and status
//! - quota units charged per endpoint
//! - records ingested, duplicates dropped
//! - source outcomes (skipped / failed)
//! - enrichment batches
//!
//! A run is a batch job, so metrics are exported by writing a textfile for
//! the node-exporter textfile collector instead of serving an endpoint.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::path::Path;
use tracing::{debug, error};

// ============================================
// METRIC DEFINITIONS
// ============================================

static UPSTREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lumens_upstream_requests_total",
        "Upstream HTTP attempts by endpoint and status",
        &["endpoint", "status"]
    )
    .expect("Failed to create upstream_requests metric")
});

static QUOTA_UNITS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lumens_quota_units_total",
        "Estimated upstream quota units spent per endpoint",
        &["endpoint"]
    )
    .expect("Failed to create quota_units metric")
});

static RECORDS_INGESTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lumens_records_ingested_total",
        "New video records produced by the harvester",
        &["reference_kind"]
    )
    .expect("Failed to create records_ingested metric")
});

static DEDUP_HITS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lumens_dedup_hits_total",
        "Videos dropped because an earlier source already yielded them",
        &["reference_kind"]
    )
    .expect("Failed to create dedup_hits metric")
});

static SOURCE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lumens_source_outcomes_total",
        "Per-source outcome of a harvest run",
        &["outcome"]
    )
    .expect("Failed to create source_outcomes metric")
});

static ENRICH_BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lumens_enrich_batches_total",
        "Video detail batches requested during enrichment",
        &["status"]
    )
    .expect("Failed to create enrich_batches metric")
});

// ============================================
// METRICS API
// ============================================

/// Records one upstream HTTP attempt
pub fn record_upstream_request(endpoint: &str, status: &str) {
    UPSTREAM_REQUESTS.with_label_values(&[endpoint, status]).inc();
}

/// Records quota units charged for a logical call
pub fn record_quota_units(endpoint: &str, units: u64) {
    QUOTA_UNITS.with_label_values(&[endpoint]).inc_by(units);
}

/// Records records produced by one source
pub fn record_records_ingested(reference_kind: &str, count: u64) {
    RECORDS_INGESTED.with_label_values(&[reference_kind]).inc_by(count);
}

/// Records deduplication hit
pub fn record_dedup_hit(reference_kind: &str) {
    DEDUP_HITS.with_label_values(&[reference_kind]).inc();
}

/// Records a source outcome (`ingested`, `skipped`, `failed`)
pub fn record_source_outcome(outcome: &str) {
    SOURCE_OUTCOMES.with_label_values(&[outcome]).inc();
}

/// Records an enrichment batch (`ok` or `failed`)
pub fn record_enrich_batch(status: &str) {
    ENRICH_BATCHES.with_label_values(&[status]).inc();
}

// ============================================
// METRICS COLLECTION
// ============================================

/// Collects all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

/// Writes the current metrics to `path` (temp file + rename)
pub async fn write_textfile(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension("prom.tmp");
    tokio::fs::write(&temp_path, gather_metrics()).await?;
    tokio::fs::rename(&temp_path, path).await?;
    debug!(path = %path.display(), "Metrics textfile written");
    Ok(())
}

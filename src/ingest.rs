//! Run wiring
//!
//! One ingestion run: load sources and state, harvest, enrich, write
//! artifacts, store, then persist the merged watermark.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::checkpoint::{ChannelReferenceCache, CheckpointManager};
use crate::config::Config;
use crate::enrich::{self, EnrichSummary, Enricher};
use crate::error::Result;
use crate::harvester::{Harvester, SourceReport};
use crate::http_client::ResilientHttpClient;
use crate::metrics;
use crate::output::{write_outputs, OutputFiles};
use crate::resolver::build_channel_map;
use crate::schemas::{load_sources, VideoRecord};
use crate::storage::{create_sink, write_content};
use crate::youtube::{QuotaUsage, YouTubeClient};

/// What a run did
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub records: usize,
    pub output: Option<OutputFiles>,
    pub sources: Vec<SourceReport>,
    pub enrichment: Option<EnrichSummary>,
    /// Documents written to the sink, when one is configured and succeeded
    pub stored: Option<usize>,
    pub sink_error: Option<String>,
    pub watermark_saved: bool,
    pub quota: QuotaUsage,
}

fn build_client(config: &Config) -> Result<YouTubeClient> {
    let api_key = config.api_key()?;
    let http = Arc::new(ResilientHttpClient::new(config.http_client_config())?);
    Ok(YouTubeClient::new(http, &config.yt_api_base_url, api_key))
}

async fn write_metrics(config: &Config) {
    if let Some(path) = &config.metrics_textfile {
        if let Err(e) = metrics::write_textfile(path).await {
            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }
}

/// Writes records to the configured sink; `None` when no sink is configured.
/// Opening the sink counts as part of the write.
async fn store_records(config: &Config, records: &[VideoRecord]) -> Result<Option<usize>> {
    let sink = create_sink(&config.sink_type, &config.sink_dir, config.database_url.as_deref()).await?;
    match sink {
        Some(sink) => Ok(Some(write_content(sink.as_ref(), &config.collection, records).await?)),
        None => Ok(None),
    }
}

/// Runs one full ingestion pass
#[instrument(skip_all, fields(channels = %config.channels_csv.display()))]
pub async fn run_ingest(config: &Config) -> Result<IngestSummary> {
    let client = build_client(config)?;
    let sources = load_sources(&config.channels_csv)?;
    if sources.is_empty() {
        warn!("No sources found");
        return Ok(IngestSummary::default());
    }

    let checkpoint = CheckpointManager::with_dir(&config.state_dir);
    let watermark = checkpoint.load_watermark().await?;
    let cache = checkpoint.load_channel_cache().await;

    let harvester = Harvester::new(&client, &cache, config.limit_per_source)
        .incremental(config.incremental)
        .relevance_language(config.relevance_language.clone());
    let report = harvester.run(&sources, watermark).await;
    let mut records = report.records;

    let enrichment = if config.enrich && !records.is_empty() {
        let detector = enrich::default_detector();
        let summary = Enricher::new(&client, detector.as_deref())
            .enrich(&mut records)
            .await;
        Some(summary)
    } else {
        None
    };

    let output = write_outputs(&records, &config.out_prefix).await?;

    let (stored, sink_error) = match store_records(config, &records).await {
        Ok(stored) => (stored, None),
        Err(e) => {
            error!(error = %e, sink = %config.sink_type, "Storage sink failed");
            (None, Some(e.to_string()))
        }
    };

    let watermark_saved = if config.gate_watermark_on_sink && sink_error.is_some() {
        warn!("Sink failed, watermark not persisted");
        false
    } else {
        checkpoint.save_watermark(&report.watermark).await?;
        true
    };

    let quota = client.quota_usage();
    info!(
        records = records.len(),
        quota_units = quota.total_units(),
        upstream_calls = quota.total_calls(),
        "Ingestion run complete"
    );
    write_metrics(config).await;

    Ok(IngestSummary {
        records: records.len(),
        output: Some(output),
        sources: report.sources,
        enrichment,
        stored,
        sink_error,
        watermark_saved,
        quota,
    })
}

/// Resolve-only pass: builds and persists the channel map
#[instrument(skip_all, fields(channels = %config.channels_csv.display()))]
pub async fn run_resolve(config: &Config) -> Result<ChannelReferenceCache> {
    let client = build_client(config)?;
    let sources = load_sources(&config.channels_csv)?;

    let map = build_channel_map(&sources, &client, config.relevance_language.clone()).await;
    CheckpointManager::with_dir(&config.state_dir)
        .save_channel_cache(&map)
        .await?;

    let quota = client.quota_usage();
    info!(entries = map.len(), quota_units = quota.total_units(), "Resolve pass complete");
    write_metrics(config).await;
    Ok(map)
}

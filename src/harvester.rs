//! Ingestion orchestration
//!
//! Drives classify -> resolve -> page across every configured source:
//! - Global deduplication across sources
//! - Exclusive watermark cutoff per channel
//! - New-head tracking for the next run's watermark
//! - Per-source outcomes instead of run-aborting errors

use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{ChannelReferenceCache, IncrementalWatermark};
use crate::dedup::DedupStore;
use crate::error::IngestionError;
use crate::metrics;
use crate::pager::VideoPager;
use crate::reference::{classify, ClassifiedReference};
use crate::resolver::{ChannelResolver, Resolution};
use crate::schemas::video_record::SOURCE_YOUTUBE;
use crate::schemas::{SourceDescriptor, VideoRecord};
use crate::youtube::YouTubeApi;

/// State threaded through one run
#[derive(Debug, Default)]
pub struct RunContext {
    pub seen: DedupStore,
    pub watermark: IncrementalWatermark,
    pub new_heads: BTreeMap<String, String>,
}

impl RunContext {
    pub fn new(watermark: IncrementalWatermark) -> Self {
        Self {
            seen: DedupStore::new(),
            watermark,
            new_heads: BTreeMap::new(),
        }
    }

    /// Keeps the earliest candidate when a channel is harvested twice
    pub fn record_head(&mut self, channel_id: &str, video_id: &str) {
        self.new_heads
            .entry(channel_id.to_string())
            .or_insert_with(|| video_id.to_string());
    }

    /// Prior watermark overlaid with this run's heads
    pub fn merged_watermark(&self) -> IncrementalWatermark {
        self.watermark.merged_with(&self.new_heads)
    }
}

/// Result of processing one source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Ingested {
        new_records: usize,
        channel_id: Option<String>,
        stopped_at_watermark: bool,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
        /// Records kept from pages fetched before the failure
        partial_records: usize,
    },
}

impl SourceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SourceOutcome::Ingested { .. } => "ingested",
            SourceOutcome::Skipped { .. } => "skipped",
            SourceOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub reference: String,
    pub kind: Option<&'static str>,
    pub outcome: SourceOutcome,
}

/// Everything a run produced, before enrichment
#[derive(Debug)]
pub struct HarvestReport {
    pub records: Vec<VideoRecord>,
    pub sources: Vec<SourceReport>,
    pub new_heads: BTreeMap<String, String>,
    pub watermark: IncrementalWatermark,
}

impl HarvestReport {
    pub fn skipped(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
    }
}

/// Pager consumed to the end, the limit, or the cutoff
struct Drained {
    new_records: usize,
    /// First surviving id, the channel's candidate new head
    head: Option<String>,
    hit_cutoff: bool,
}

/// Pager that failed after yielding some records
struct PartialHarvest {
    error: IngestionError,
    kept: usize,
}

pub struct Harvester<'a> {
    api: &'a dyn YouTubeApi,
    cache: &'a ChannelReferenceCache,
    limit_per_source: usize,
    incremental: bool,
    relevance_language: Option<String>,
}

impl<'a> Harvester<'a> {
    pub fn new(api: &'a dyn YouTubeApi, cache: &'a ChannelReferenceCache, limit_per_source: usize) -> Self {
        Self {
            api,
            cache,
            limit_per_source,
            incremental: true,
            relevance_language: None,
        }
    }

    /// When off, watermarks do not cut paging short (heads are still recorded)
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn relevance_language(mut self, language: Option<String>) -> Self {
        self.relevance_language = language;
        self
    }

    /// Harvests every source in order
    pub async fn run(&self, sources: &[SourceDescriptor], watermark: IncrementalWatermark) -> HarvestReport {
        let mut ctx = RunContext::new(watermark);
        let mut records = Vec::new();
        let mut reports = Vec::with_capacity(sources.len());

        info!(sources = sources.len(), limit = self.limit_per_source, "Starting harvest");

        for descriptor in sources {
            let (kind, outcome) = self.harvest_source(descriptor, &mut ctx, &mut records).await;
            metrics::record_source_outcome(outcome.label());
            reports.push(SourceReport {
                name: descriptor.display_name.clone(),
                reference: descriptor.reference.clone(),
                kind,
                outcome,
            });
        }

        let watermark = ctx.merged_watermark();
        info!(
            records = records.len(),
            new_heads = ctx.new_heads.len(),
            "Harvest complete"
        );

        HarvestReport {
            records,
            sources: reports,
            new_heads: ctx.new_heads,
            watermark,
        }
    }

    #[instrument(skip_all, fields(source = %descriptor.display_name, reference = %descriptor.reference))]
    async fn harvest_source(
        &self,
        descriptor: &SourceDescriptor,
        ctx: &mut RunContext,
        out: &mut Vec<VideoRecord>,
    ) -> (Option<&'static str>, SourceOutcome) {
        if !descriptor.is_source(SOURCE_YOUTUBE) {
            debug!(platform = %descriptor.source, "Skipping non-matching source");
            return (
                None,
                SourceOutcome::Skipped {
                    reason: format!("unsupported source type '{}'", descriptor.source),
                },
            );
        }

        let reference = classify(&descriptor.reference);
        let kind = Some(reference.kind());
        info!(kind = reference.kind(), value = %reference.value(), "Processing source");

        if let ClassifiedReference::PlaylistId(playlist_id) = &reference {
            let pager = VideoPager::playlist(self.api, playlist_id, self.limit_per_source);
            let outcome = match self.drain(pager, reference.kind(), None, ctx, out).await {
                Ok(drained) => SourceOutcome::Ingested {
                    new_records: drained.new_records,
                    channel_id: None,
                    stopped_at_watermark: false,
                },
                Err(partial) => {
                    warn!(playlist_id = %playlist_id, error = %partial.error, "Playlist harvest failed");
                    SourceOutcome::Failed {
                        error: partial.error.to_string(),
                        partial_records: partial.kept,
                    }
                }
            };
            return (kind, outcome);
        }

        let resolver = ChannelResolver::new(self.api, self.cache)
            .with_relevance_language(self.relevance_language.clone());
        let channel_id = match resolver.resolve(&descriptor.reference, &reference).await {
            Ok(Resolution::Resolved(channel_id)) => channel_id,
            Ok(Resolution::NotFound) => {
                warn!("Could not resolve channel, skipping source");
                return (
                    kind,
                    SourceOutcome::Skipped {
                        reason: "channel not found".to_string(),
                    },
                );
            }
            Ok(Resolution::NotAChannel) => {
                warn!("Reference does not name a channel, skipping source");
                return (
                    kind,
                    SourceOutcome::Skipped {
                        reason: format!("{} reference is not a channel", reference.kind()),
                    },
                );
            }
            Err(e) => {
                warn!(error = %e, "Channel resolution failed");
                return (
                    kind,
                    SourceOutcome::Failed {
                        error: e.to_string(),
                        partial_records: 0,
                    },
                );
            }
        };

        let outcome = self.harvest_channel(&channel_id, reference.kind(), ctx, out).await;
        (kind, outcome)
    }

    async fn harvest_channel(
        &self,
        channel_id: &str,
        kind: &'static str,
        ctx: &mut RunContext,
        out: &mut Vec<VideoRecord>,
    ) -> SourceOutcome {
        let pager = match VideoPager::channel(self.api, channel_id, self.limit_per_source).await {
            Ok(pager) => pager,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Channel lookup failed");
                return SourceOutcome::Failed {
                    error: e.to_string(),
                    partial_records: 0,
                };
            }
        };

        let cutoff = if self.incremental {
            ctx.watermark.get(channel_id).map(str::to_string)
        } else {
            None
        };

        match self.drain(pager, kind, cutoff.as_deref(), ctx, out).await {
            Ok(drained) => {
                if let Some(head) = &drained.head {
                    ctx.record_head(channel_id, head);
                }
                info!(
                    channel_id = %channel_id,
                    new_records = drained.new_records,
                    watermark = ?cutoff,
                    "Channel harvested"
                );
                SourceOutcome::Ingested {
                    new_records: drained.new_records,
                    channel_id: Some(channel_id.to_string()),
                    stopped_at_watermark: drained.hit_cutoff,
                }
            }
            Err(partial) => {
                warn!(
                    channel_id = %channel_id,
                    kept = partial.kept,
                    error = %partial.error,
                    "Channel harvest failed, watermark not advanced"
                );
                SourceOutcome::Failed {
                    error: partial.error.to_string(),
                    partial_records: partial.kept,
                }
            }
        }
    }

    /// Consumes a pager up to `cutoff` (exclusive), deduplicating into `out`
    async fn drain(
        &self,
        mut pager: VideoPager<'_>,
        kind: &'static str,
        cutoff: Option<&str>,
        ctx: &mut RunContext,
        out: &mut Vec<VideoRecord>,
    ) -> std::result::Result<Drained, PartialHarvest> {
        let mut new_records = 0;
        let mut head = None;
        let mut hit_cutoff = false;

        loop {
            let record = match pager.next().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(error) => {
                    metrics::record_records_ingested(kind, new_records as u64);
                    return Err(PartialHarvest {
                        error,
                        kept: new_records,
                    });
                }
            };

            if cutoff == Some(record.video_id.as_str()) {
                debug!(video_id = %record.video_id, "Reached watermark");
                hit_cutoff = true;
                break;
            }
            if ctx.seen.check_and_mark(&record.video_id) {
                metrics::record_dedup_hit(kind);
                continue;
            }

            if head.is_none() {
                head = Some(record.video_id.clone());
            }
            out.push(record);
            new_records += 1;
        }

        metrics::record_records_ingested(kind, new_records as u64);
        Ok(Drained {
            new_records,
            head,
            hit_cutoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeYouTube;

    fn channel_source(channel_id: &str) -> SourceDescriptor {
        SourceDescriptor::new(
            "youtube",
            &format!("https://www.youtube.com/channel/{}", channel_id),
            channel_id,
        )
    }

    fn ids(records: &[VideoRecord]) -> Vec<&str> {
        records.iter().map(|r| r.video_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fresh_channel_then_rerun() {
        let api = FakeYouTube::new().with_uploads("UC1", &["v3", "v2", "v1"]);
        let cache = ChannelReferenceCache::new();
        let harvester = Harvester::new(&api, &cache, 100);
        let sources = vec![channel_source("UC1")];

        let first = harvester.run(&sources, IncrementalWatermark::new()).await;
        assert_eq!(ids(&first.records), vec!["v3", "v2", "v1"]);
        assert_eq!(first.watermark.get("UC1"), Some("v3"));

        let second = harvester.run(&sources, first.watermark.clone()).await;
        assert!(second.records.is_empty());
        assert_eq!(second.watermark, first.watermark);
        assert!(second.new_heads.is_empty());
    }

    #[tokio::test]
    async fn test_watermark_cutoff_is_exclusive() {
        let api = FakeYouTube::new().with_uploads("UC1", &["V5", "V4", "V3", "V2", "V1"]);
        let cache = ChannelReferenceCache::new();
        let mut watermark = IncrementalWatermark::new();
        watermark.set("UC1", "V3");

        let report = Harvester::new(&api, &cache, 100)
            .run(&[channel_source("UC1")], watermark)
            .await;

        assert_eq!(ids(&report.records), vec!["V5", "V4"]);
        assert_eq!(report.watermark.get("UC1"), Some("V5"));
        assert!(matches!(
            report.sources[0].outcome,
            SourceOutcome::Ingested { new_records: 2, stopped_at_watermark: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_watermark_id_takes_everything() {
        let api = FakeYouTube::new().with_uploads("UC1", &["V5", "V4"]);
        let cache = ChannelReferenceCache::new();
        let mut watermark = IncrementalWatermark::new();
        watermark.set("UC1", "gone");

        let report = Harvester::new(&api, &cache, 100)
            .run(&[channel_source("UC1")], watermark)
            .await;
        assert_eq!(ids(&report.records), vec!["V5", "V4"]);
    }

    #[tokio::test]
    async fn test_full_refresh_ignores_watermark_but_updates_head() {
        let api = FakeYouTube::new().with_uploads("UC1", &["V5", "V4", "V3"]);
        let cache = ChannelReferenceCache::new();
        let mut watermark = IncrementalWatermark::new();
        watermark.set("UC1", "V4");

        let report = Harvester::new(&api, &cache, 100)
            .incremental(false)
            .run(&[channel_source("UC1")], watermark)
            .await;
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.watermark.get("UC1"), Some("V5"));
    }

    #[tokio::test]
    async fn test_dedup_across_sources() {
        let api = FakeYouTube::new()
            .with_uploads("UC1", &["a", "shared", "b"])
            .with_playlist("PLx", &["shared", "c"]);
        let cache = ChannelReferenceCache::new();
        let sources = vec![
            channel_source("UC1"),
            SourceDescriptor::new("youtube", "https://www.youtube.com/playlist?list=PLx", "List"),
        ];

        let report = Harvester::new(&api, &cache, 100)
            .run(&sources, IncrementalWatermark::new())
            .await;

        assert_eq!(ids(&report.records), vec!["a", "shared", "b", "c"]);
        // Playlists carry no watermark
        assert_eq!(report.watermark.len(), 1);
    }

    #[tokio::test]
    async fn test_same_channel_twice_keeps_first_head() {
        let api = FakeYouTube::new().with_uploads("UC1", &["v2", "v1"]);
        let mut cache = ChannelReferenceCache::new();
        cache.insert("@alias", "UC1");
        let sources = vec![
            channel_source("UC1"),
            SourceDescriptor::new("youtube", "@alias", "Alias"),
        ];

        let report = Harvester::new(&api, &cache, 100)
            .run(&sources, IncrementalWatermark::new())
            .await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.new_heads.get("UC1").map(String::as_str), Some("v2"));
        assert!(matches!(
            report.sources[1].outcome,
            SourceOutcome::Ingested { new_records: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_skips_and_failures_do_not_abort() {
        let api = FakeYouTube::new()
            .with_uploads("UC_ok", &["ok1"])
            .with_uploads("UC_bad", &["x"])
            .failing_playlist("UU_bad");
        let cache = ChannelReferenceCache::new();
        let sources = vec![
            SourceDescriptor::new("vimeo", "https://vimeo.com/123", "Other platform"),
            SourceDescriptor::new("youtube", "@nobody", "Unknown handle"),
            SourceDescriptor::new("youtube", "https://youtu.be/abc", "Single video"),
            channel_source("UC_bad"),
            channel_source("UC_ok"),
        ];

        let mut watermark = IncrementalWatermark::new();
        watermark.set("UC_bad", "old");
        let report = Harvester::new(&api, &cache, 100).run(&sources, watermark).await;

        assert_eq!(ids(&report.records), vec!["ok1"]);
        assert_eq!(report.skipped().count(), 3);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.sources[0].kind, None);
        // Failed channel keeps its previous watermark
        assert_eq!(report.watermark.get("UC_bad"), Some("old"));
        assert_eq!(report.watermark.get("UC_ok"), Some("ok1"));
    }

    #[test]
    fn test_record_head_keeps_earliest() {
        let mut ctx = RunContext::default();
        ctx.record_head("UC1", "first");
        ctx.record_head("UC1", "second");
        assert_eq!(ctx.new_heads.get("UC1").map(String::as_str), Some("first"));
    }
}

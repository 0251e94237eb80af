//! Metadata enrichment
//!
//! Augments harvested records from batched video detail lookups:
//! - ISO-8601 duration decoding
//! - engagement counters
//! - declared language, normalized
//! - text-derived language hint and the derived `is_english` flag
//! - audience (made for kids) flags
//!
//! Failures stay local: a failed batch leaves its records unenriched, and a
//! malformed field is simply omitted.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::schemas::{VideoRecord, VideoStats};
use crate::youtube::schema::VideoItem;
use crate::youtube::{YouTubeApi, MAX_IDS_PER_VIDEO_LOOKUP};

/// Below this many characters of title + description, detection is skipped
pub const MIN_TEXT_DETECTION_CHARS: usize = 20;

/// Minimum text-hint confidence to call a record English
pub const ENGLISH_CONFIDENCE_THRESHOLD: f64 = 0.7;

const ENGLISH: &str = "en";

// ============================================
// DURATION
// ============================================

/// Decodes `P[nD][T[nH][nM][nS]]` into seconds.
///
/// `P` alone (or `PT`) is the zero duration. Anything outside the grammar,
/// including units out of order or digits without a unit, yields `None`.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = parse_components(date_part, &[('D', 86_400)])?;
    if let Some(time) = time_part {
        total = total.checked_add(parse_components(time, &[('H', 3_600), ('M', 60), ('S', 1)])?)?;
    }
    Some(total)
}

/// Sums `<digits><unit>` groups; units must appear in the given order
fn parse_components(part: &str, units: &[(char, u64)]) -> Option<u64> {
    let mut total: u64 = 0;
    let mut remaining = units;
    let mut digits = String::new();

    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return None;
        }
        let position = remaining.iter().position(|(unit, _)| *unit == c)?;
        let (_, scale) = remaining[position];
        let amount: u64 = digits.parse().ok()?;
        total = total.checked_add(amount.checked_mul(scale)?)?;
        remaining = &remaining[position + 1..];
        digits.clear();
    }

    if digits.is_empty() {
        Some(total)
    } else {
        None
    }
}

// ============================================
// LANGUAGE
// ============================================

/// Lower-cases and hyphenates a tag, returning `(primary, full)`
pub fn normalize_language_tag(tag: &str) -> Option<(String, String)> {
    let full = tag.trim().to_lowercase().replace('_', "-");
    if full.is_empty() {
        return None;
    }
    let primary = full.split('-').next().unwrap_or(&full).to_string();
    Some((primary, full))
}

/// Best-scoring language for a piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    /// ISO 639-1 code, lower-case
    pub code: String,
    pub confidence: f64,
}

pub trait TextLanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<LanguageGuess>;
}

#[cfg(feature = "lang-detect")]
pub use lingua_detector::LinguaDetector;

#[cfg(feature = "lang-detect")]
mod lingua_detector {
    use super::{LanguageGuess, TextLanguageDetector};
    use lingua::{LanguageDetector, LanguageDetectorBuilder};

    /// Statistical detector over all languages lingua knows
    pub struct LinguaDetector {
        detector: LanguageDetector,
    }

    impl LinguaDetector {
        pub fn new() -> Self {
            Self {
                detector: LanguageDetectorBuilder::from_all_languages().build(),
            }
        }
    }

    impl Default for LinguaDetector {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TextLanguageDetector for LinguaDetector {
        fn detect(&self, text: &str) -> Option<LanguageGuess> {
            let (language, confidence) = self
                .detector
                .compute_language_confidence_values(text)
                .into_iter()
                .next()?;
            Some(LanguageGuess {
                code: language.iso_code_639_1().to_string().to_lowercase(),
                confidence,
            })
        }
    }
}

/// Detector available in this build, if any
pub fn default_detector() -> Option<Box<dyn TextLanguageDetector>> {
    #[cfg(feature = "lang-detect")]
    {
        Some(Box::new(LinguaDetector::new()))
    }
    #[cfg(not(feature = "lang-detect"))]
    {
        None
    }
}

fn text_hint(record: &VideoRecord, detector: Option<&dyn TextLanguageDetector>) -> Option<LanguageGuess> {
    let detector = detector?;
    let text = format!("{}\n{}", record.title, record.description);
    if text.chars().count() < MIN_TEXT_DETECTION_CHARS {
        return None;
    }
    detector.detect(&text)
}

fn is_english(record: &VideoRecord) -> bool {
    if record.language.as_deref() == Some(ENGLISH) {
        return true;
    }
    matches!(
        (record.text_language.as_deref(), record.text_lang_confidence),
        (Some(ENGLISH), Some(confidence)) if confidence >= ENGLISH_CONFIDENCE_THRESHOLD
    )
}

// ============================================
// ENRICHMENT
// ============================================

/// Applies one detail payload to a record.
///
/// A language already present on the record is never overwritten.
pub fn apply_details(
    record: &mut VideoRecord,
    details: &VideoItem,
    detector: Option<&dyn TextLanguageDetector>,
) {
    if let Some(seconds) = details
        .content_details
        .as_ref()
        .and_then(|c| c.duration.as_deref())
        .and_then(parse_iso8601_duration)
    {
        record.duration_seconds = Some(seconds);
    }

    if let Some(statistics) = &details.statistics {
        record.stats = Some(VideoStats {
            views: statistics.views(),
            likes: statistics.likes(),
            comments: statistics.comments(),
        });
    }

    if record.language.is_none() {
        if let Some((primary, full)) = details
            .snippet
            .as_ref()
            .and_then(|s| s.declared_language())
            .and_then(normalize_language_tag)
        {
            record.language = Some(primary);
            record.language_full = Some(full);
        }
    }

    if let Some(guess) = text_hint(record, detector) {
        record.text_language = Some(guess.code);
        record.text_lang_confidence = Some(guess.confidence);
    }
    record.is_english = is_english(record);

    if let Some(status) = &details.status {
        if status.made_for_kids.is_some() {
            record.made_for_kids = status.made_for_kids;
        }
        if status.self_declared_made_for_kids.is_some() {
            record.self_declared_made_for_kids = status.self_declared_made_for_kids;
        }
    }
}

/// Totals for one enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub enriched: usize,
}

pub struct Enricher<'a> {
    api: &'a dyn YouTubeApi,
    detector: Option<&'a dyn TextLanguageDetector>,
}

impl<'a> Enricher<'a> {
    pub fn new(api: &'a dyn YouTubeApi, detector: Option<&'a dyn TextLanguageDetector>) -> Self {
        Self { api, detector }
    }

    /// Enriches records in place, one detail call per batch of ids
    pub async fn enrich(&self, records: &mut [VideoRecord]) -> EnrichSummary {
        let ids: Vec<String> = records
            .iter()
            .map(|r| r.video_id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let mut summary = EnrichSummary::default();
        let mut details: HashMap<String, VideoItem> = HashMap::with_capacity(ids.len());

        for batch in ids.chunks(MAX_IDS_PER_VIDEO_LOOKUP) {
            summary.batches += 1;
            match self.api.videos(batch).await {
                Ok(response) => {
                    metrics::record_enrich_batch("ok");
                    for item in response.items.into_iter().filter(|i| !i.id.is_empty()) {
                        details.insert(item.id.clone(), item);
                    }
                }
                Err(e) => {
                    metrics::record_enrich_batch("failed");
                    summary.failed_batches += 1;
                    warn!(batch_size = batch.len(), error = %e, "Detail lookup failed, batch left unenriched");
                }
            }
        }

        for record in records.iter_mut() {
            match details.get(&record.video_id) {
                Some(item) => {
                    apply_details(record, item, self.detector);
                    summary.enriched += 1;
                }
                None => debug!(video_id = %record.video_id, "No details for video"),
            }
        }

        info!(
            records = records.len(),
            enriched = summary.enriched,
            batches = summary.batches,
            failed_batches = summary.failed_batches,
            "Enrichment complete"
        );
        summary
    }
}

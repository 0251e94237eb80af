//! VideoRecord - the unit of the catalog
//!
//! Field names are snake_case on the wire: the read API and stored
//! documents query `channel_id`, `published_at`, `is_english`,
//! `made_for_kids` directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::youtube::schema::Snippet;

/// Source tag carried by every record
pub const SOURCE_YOUTUBE: &str = "youtube";

/// Engagement counters; absent counters are omitted, never zeroed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStats {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub likes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comments: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub source: String,
    pub video_id: String,
    pub video_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub thumbnails: Map<String, Value>,

    // Enrichment
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stats: Option<VideoStats>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language_full: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_lang_confidence: Option<f64>,
    #[serde(default)]
    pub is_english: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub made_for_kids: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub self_declared_made_for_kids: Option<bool>,
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

impl VideoRecord {
    /// Minimal record with no metadata beyond the id
    pub fn new(video_id: impl Into<String>) -> Self {
        let video_id = video_id.into();
        Self {
            source: SOURCE_YOUTUBE.to_string(),
            video_url: watch_url(&video_id),
            video_id,
            title: String::new(),
            description: String::new(),
            published_at: None,
            channel_id: None,
            channel_title: None,
            thumbnails: Map::new(),
            duration_seconds: None,
            stats: None,
            language: None,
            language_full: None,
            text_language: None,
            text_lang_confidence: None,
            is_english: false,
            made_for_kids: None,
            self_declared_made_for_kids: None,
        }
    }

    /// Builds a record from a search or playlist-item snippet
    pub fn from_snippet(video_id: &str, snippet: &Snippet) -> Self {
        let mut record = Self::new(video_id);
        record.title = snippet.title.clone().unwrap_or_default();
        record.description = snippet.description.clone().unwrap_or_default();
        record.published_at = snippet.published_at();
        record.channel_id = snippet.channel_id.clone();
        record.channel_title = snippet.channel_title.clone();
        record.thumbnails = snippet.thumbnails.clone();
        record
    }
}

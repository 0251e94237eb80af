//! Typed response schemas for the upstream Data API
//!
//! Every nested field is optional; accessors return `None` rather than
//! panicking on irregular payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Result kind for video resources
pub const VIDEO_KIND: &str = "youtube#video";

/// Envelope shared by all list endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: None,
        }
    }
}

impl<T> ListResponse<T> {
    /// Continuation token, treating an empty string as "no more pages"
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    #[serde(default)]
    pub thumbnails: Map<String, Value>,
    pub resource_id: Option<ResourceId>,
    pub default_language: Option<String>,
    pub default_audio_language: Option<String>,
}

impl Snippet {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Audio language wins over the declared metadata language
    pub fn declared_language(&self) -> Option<&str> {
        self.default_audio_language
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.default_language.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: Option<String>,
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
    pub playlist_id: Option<String>,
}

impl ResourceId {
    /// Video id, only for video resources
    pub fn video_id(&self) -> Option<&str> {
        match self.kind.as_deref() {
            Some(VIDEO_KIND) => self.video_id.as_deref().filter(|id| !id.is_empty()),
            _ => None,
        }
    }
}

// ============================================
// channels.list
// ============================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    #[serde(default)]
    pub id: String,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

impl ChannelItem {
    /// Id of the channel's uploads collection, when exposed
    pub fn uploads_playlist_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .related_playlists
            .as_ref()?
            .uploads
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

// ============================================
// search.list
// ============================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    #[serde(default)]
    pub id: ResourceId,
    pub snippet: Option<Snippet>,
}

impl SearchItem {
    pub fn video_id(&self) -> Option<&str> {
        self.id.video_id()
    }

    /// Channel id of a channel-type result
    pub fn channel_id(&self) -> Option<&str> {
        self.snippet
            .as_ref()
            .and_then(|s| s.channel_id.as_deref())
            .or(self.id.channel_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

// ============================================
// playlistItems.list
// ============================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub snippet: Option<Snippet>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.snippet.as_ref()?.resource_id.as_ref()?.video_id()
    }
}

// ============================================
// videos.list
// ============================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    #[serde(default)]
    pub id: String,
    pub snippet: Option<Snippet>,
    pub content_details: Option<VideoContentDetails>,
    pub statistics: Option<VideoStatistics>,
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

/// Counters arrive as decimal strings; numbers are accepted too
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<Value>,
    pub like_count: Option<Value>,
    pub comment_count: Option<Value>,
}

impl VideoStatistics {
    pub fn views(&self) -> Option<u64> {
        parse_count(self.view_count.as_ref())
    }

    pub fn likes(&self) -> Option<u64> {
        parse_count(self.like_count.as_ref())
    }

    pub fn comments(&self) -> Option<u64> {
        parse_count(self.comment_count.as_ref())
    }
}

fn parse_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub made_for_kids: Option<bool>,
    pub self_declared_made_for_kids: Option<bool>,
}

//! Upstream video platform API
//!
//! `YouTubeApi` is the seam between the pipeline and the network: the
//! resolver, pager and enricher only ever talk to this trait, so tests can
//! swap in an in-memory fake.

pub mod client;
pub mod schema;

use async_trait::async_trait;

use crate::error::Result;
use schema::{ChannelItem, ListResponse, PlaylistItem, SearchItem, VideoItem};

/// Per-call page size ceiling for list endpoints
pub const MAX_RESULTS_PER_PAGE: u32 = 50;

/// Per-call id ceiling for the video details lookup
pub const MAX_IDS_PER_VIDEO_LOOKUP: usize = 50;

/// Upstream endpoints, used for quota accounting and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Channels,
    Search,
    PlaylistItems,
    Videos,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Channels => "/channels",
            Endpoint::Search => "/search",
            Endpoint::PlaylistItems => "/playlistItems",
            Endpoint::Videos => "/videos",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Channels => "channels",
            Endpoint::Search => "search",
            Endpoint::PlaylistItems => "playlist_items",
            Endpoint::Videos => "videos",
        }
    }

    /// Quota units charged by the platform for one call
    pub fn quota_cost(&self) -> u64 {
        match self {
            Endpoint::Search => 100,
            Endpoint::Channels | Endpoint::PlaylistItems | Endpoint::Videos => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Channel,
    Video,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Channel => "channel",
            SearchType::Video => "video",
        }
    }
}

/// Parameters for a search call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub result_type: SearchType,
    pub query: Option<String>,
    pub channel_id: Option<String>,
    /// Order by upload date instead of relevance
    pub order_by_date: bool,
    pub max_results: u32,
    pub page_token: Option<String>,
    pub relevance_language: Option<String>,
}

impl SearchRequest {
    /// Channel search for a free-text query
    pub fn channels(query: impl Into<String>, max_results: u32) -> Self {
        Self {
            result_type: SearchType::Channel,
            query: Some(query.into()),
            channel_id: None,
            order_by_date: false,
            max_results,
            page_token: None,
            relevance_language: None,
        }
    }

    /// Recency-ordered video search within one channel
    pub fn channel_videos(channel_id: impl Into<String>, max_results: u32) -> Self {
        Self {
            result_type: SearchType::Video,
            query: None,
            channel_id: Some(channel_id.into()),
            order_by_date: true,
            max_results,
            page_token: None,
            relevance_language: None,
        }
    }

    pub fn page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }

    pub fn relevance_language(mut self, language: Option<String>) -> Self {
        self.relevance_language = language;
        self
    }
}

/// Read-only operations the pipeline needs from the platform
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    /// Legacy username lookup (`channels?forUsername=`)
    async fn channels_for_username(&self, username: &str) -> Result<ListResponse<ChannelItem>>;

    /// Channel content details, carrying the uploads collection id
    async fn channel_details(&self, channel_id: &str) -> Result<ListResponse<ChannelItem>>;

    async fn search(&self, request: &SearchRequest) -> Result<ListResponse<SearchItem>>;

    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListResponse<PlaylistItem>>;

    /// Batched detail lookup; callers keep `ids` within `MAX_IDS_PER_VIDEO_LOOKUP`
    async fn videos(&self, ids: &[String]) -> Result<ListResponse<VideoItem>>;
}

pub use client::{QuotaUsage, YouTubeClient};

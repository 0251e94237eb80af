//! HTTP implementation of `YouTubeApi`
//!
//! Wraps `ResilientHttpClient`, attaches the API key, and keeps a running
//! estimate of quota units spent so a run can report its cost.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::schema::{ChannelItem, ListResponse, PlaylistItem, SearchItem, VideoItem};
use super::{Endpoint, SearchRequest, YouTubeApi, MAX_IDS_PER_VIDEO_LOOKUP};
use crate::error::Result;
use crate::http_client::ResilientHttpClient;
use crate::metrics;

/// Quota units and call counts per endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaUsage {
    pub calls: BTreeMap<&'static str, u64>,
    pub units: BTreeMap<&'static str, u64>,
}

impl QuotaUsage {
    fn charge(&mut self, endpoint: Endpoint) {
        *self.calls.entry(endpoint.name()).or_insert(0) += 1;
        *self.units.entry(endpoint.name()).or_insert(0) += endpoint.quota_cost();
    }

    pub fn total_units(&self) -> u64 {
        self.units.values().sum()
    }

    pub fn total_calls(&self) -> u64 {
        self.calls.values().sum()
    }
}

/// Upstream Data API client
pub struct YouTubeClient {
    http: Arc<ResilientHttpClient>,
    base_url: String,
    api_key: String,
    quota: Mutex<QuotaUsage>,
}

impl YouTubeClient {
    pub fn new(http: Arc<ResilientHttpClient>, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            quota: Mutex::new(QuotaUsage::default()),
        }
    }

    /// Snapshot of quota spent so far
    pub fn quota_usage(&self) -> QuotaUsage {
        self.quota.lock().clone()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        mut params: Vec<(&str, String)>,
    ) -> Result<T> {
        self.quota.lock().charge(endpoint);
        metrics::record_quota_units(endpoint.name(), endpoint.quota_cost());

        debug!(endpoint = endpoint.name(), params = ?params, "Calling upstream API");

        params.push(("key", self.api_key.clone()));
        let url = format!("{}{}", self.base_url, endpoint.path());
        self.http.get_json(endpoint.name(), &url, &params).await
    }
}

#[async_trait]
impl YouTubeApi for YouTubeClient {
    async fn channels_for_username(&self, username: &str) -> Result<ListResponse<ChannelItem>> {
        let params = vec![("part", "id".to_string()), ("forUsername", username.to_string())];
        self.call(Endpoint::Channels, params).await
    }

    async fn channel_details(&self, channel_id: &str) -> Result<ListResponse<ChannelItem>> {
        let params = vec![
            ("part", "contentDetails".to_string()),
            ("id", channel_id.to_string()),
        ];
        self.call(Endpoint::Channels, params).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<ListResponse<SearchItem>> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("type", request.result_type.as_str().to_string()),
            ("maxResults", request.max_results.to_string()),
        ];
        if let Some(ref query) = request.query {
            params.push(("q", query.clone()));
        }
        if let Some(ref channel_id) = request.channel_id {
            params.push(("channelId", channel_id.clone()));
        }
        if request.order_by_date {
            params.push(("order", "date".to_string()));
        }
        if let Some(ref token) = request.page_token {
            params.push(("pageToken", token.clone()));
        }
        if let Some(ref language) = request.relevance_language {
            params.push(("relevanceLanguage", language.clone()));
        }
        self.call(Endpoint::Search, params).await
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListResponse<PlaylistItem>> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.call(Endpoint::PlaylistItems, params).await
    }

    async fn videos(&self, ids: &[String]) -> Result<ListResponse<VideoItem>> {
        debug_assert!(ids.len() <= MAX_IDS_PER_VIDEO_LOOKUP);
        let params = vec![
            ("part", "contentDetails,statistics,snippet,status".to_string()),
            ("id", ids.join(",")),
            ("maxResults", MAX_IDS_PER_VIDEO_LOOKUP.to_string()),
        ];
        self.call(Endpoint::Videos, params).await
    }
}

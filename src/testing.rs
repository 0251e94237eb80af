//! In-memory `YouTubeApi` for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

use crate::error::{IngestionError, Result};
use crate::youtube::schema::{ChannelItem, ListResponse, PlaylistItem, SearchItem, VideoItem};
use crate::youtube::{SearchRequest, SearchType, YouTubeApi};

#[derive(Default)]
pub struct FakeYouTube {
    usernames: HashMap<String, String>,
    channel_searches: HashMap<String, Vec<String>>,
    uploads: HashMap<String, String>,
    playlists: HashMap<String, Vec<Value>>,
    channel_videos: HashMap<String, Vec<Value>>,
    details: HashMap<String, Value>,
    failing_playlists: HashSet<String>,
    fail_search: bool,
    fail_videos: bool,
    calls: Mutex<Vec<String>>,
    searches: Mutex<Vec<SearchRequest>>,
    detail_batches: Mutex<Vec<Vec<String>>>,
}

fn upstream_failure() -> IngestionError {
    IngestionError::RetriesExhausted {
        attempts: 4,
        last_error: "HTTP 503: backend unavailable".to_string(),
    }
}

fn snippet(video_id: &str, channel_id: &str) -> Value {
    json!({
        "title": format!("Video {}", video_id),
        "description": format!("Description of {}", video_id),
        "publishedAt": "2024-05-01T12:00:00Z",
        "channelId": channel_id,
        "channelTitle": format!("Channel {}", channel_id),
        "thumbnails": {"default": {"url": format!("https://i.ytimg.com/vi/{}/default.jpg", video_id)}},
        "resourceId": {"kind": "youtube#video", "videoId": video_id}
    })
}

/// Offset-encoded continuation tokens
fn page<T: serde::de::DeserializeOwned>(
    items: &[Value],
    max_results: u32,
    token: Option<&str>,
) -> Result<ListResponse<T>> {
    let start: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + max_results as usize).min(items.len());
    let slice = items.get(start..end).unwrap_or(&[]).to_vec();
    let next = (end < items.len()).then(|| end.to_string());
    Ok(serde_json::from_value(json!({
        "items": slice,
        "nextPageToken": next,
    }))?)
}

impl FakeYouTube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, name: &str, channel_id: &str) -> Self {
        self.usernames.insert(name.to_string(), channel_id.to_string());
        self
    }

    /// Channel-type search results for a query; empty ids yield items without one
    pub fn with_channel_search(mut self, query: &str, channel_ids: &[&str]) -> Self {
        self.channel_searches.insert(
            query.to_string(),
            channel_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Channel exposing an uploads collection with these videos, newest first
    pub fn with_uploads(mut self, channel_id: &str, video_ids: &[&str]) -> Self {
        let playlist_id = format!("UU{}", channel_id.trim_start_matches("UC"));
        self.uploads.insert(channel_id.to_string(), playlist_id.clone());
        self.with_playlist_from(&playlist_id, channel_id, video_ids)
    }

    pub fn with_playlist(self, playlist_id: &str, video_ids: &[&str]) -> Self {
        self.with_playlist_from(playlist_id, "UC_playlist_owner", video_ids)
    }

    fn with_playlist_from(mut self, playlist_id: &str, channel_id: &str, video_ids: &[&str]) -> Self {
        let items = video_ids
            .iter()
            .map(|id| json!({"snippet": snippet(id, channel_id)}))
            .collect();
        self.playlists.insert(playlist_id.to_string(), items);
        self
    }

    /// Channel without an uploads collection; videos come from search.
    /// Each video is followed by a channel-kind item to exercise filtering.
    pub fn with_search_only_channel(mut self, channel_id: &str, video_ids: &[&str]) -> Self {
        let mut items = Vec::new();
        for id in video_ids {
            items.push(json!({
                "id": {"kind": "youtube#video", "videoId": id},
                "snippet": snippet(id, channel_id)
            }));
            items.push(json!({
                "id": {"kind": "youtube#channel", "channelId": channel_id},
                "snippet": {"channelId": channel_id}
            }));
        }
        self.channel_videos.insert(channel_id.to_string(), items);
        self
    }

    pub fn with_details(mut self, item: Value) -> Self {
        let id = item["id"].as_str().unwrap_or_default().to_string();
        self.details.insert(id, item);
        self
    }

    pub fn failing_playlist(mut self, playlist_id: &str) -> Self {
        self.failing_playlists.insert(playlist_id.to_string());
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_videos(mut self) -> Self {
        self.fail_videos = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == endpoint).count()
    }

    pub fn search_requests(&self) -> Vec<SearchRequest> {
        self.searches.lock().clone()
    }

    pub fn detail_batches(&self) -> Vec<Vec<String>> {
        self.detail_batches.lock().clone()
    }

    fn record(&self, endpoint: &str) {
        self.calls.lock().push(endpoint.to_string());
    }
}

#[async_trait]
impl YouTubeApi for FakeYouTube {
    async fn channels_for_username(&self, username: &str) -> Result<ListResponse<ChannelItem>> {
        self.record("channels");
        let items: Vec<Value> = self
            .usernames
            .get(username)
            .map(|id| vec![json!({"id": id})])
            .unwrap_or_default();
        Ok(serde_json::from_value(json!({"items": items}))?)
    }

    async fn channel_details(&self, channel_id: &str) -> Result<ListResponse<ChannelItem>> {
        self.record("channels");
        let item = match self.uploads.get(channel_id) {
            Some(uploads) => json!({
                "id": channel_id,
                "contentDetails": {"relatedPlaylists": {"uploads": uploads}}
            }),
            None => json!({"id": channel_id}),
        };
        Ok(serde_json::from_value(json!({"items": [item]}))?)
    }

    async fn search(&self, request: &SearchRequest) -> Result<ListResponse<SearchItem>> {
        self.record("search");
        self.searches.lock().push(request.clone());
        if self.fail_search {
            return Err(upstream_failure());
        }

        match request.result_type {
            SearchType::Channel => {
                let query = request.query.clone().unwrap_or_default();
                let items: Vec<Value> = self
                    .channel_searches
                    .get(&query)
                    .map(|ids| {
                        ids.iter()
                            .map(|id| {
                                json!({
                                    "id": {"kind": "youtube#channel", "channelId": id},
                                    "snippet": {"channelId": id}
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(serde_json::from_value(json!({"items": items}))?)
            }
            SearchType::Video => {
                let channel_id = request.channel_id.clone().unwrap_or_default();
                let items = self.channel_videos.get(&channel_id).cloned().unwrap_or_default();
                page(&items, request.max_results, request.page_token.as_deref())
            }
        }
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListResponse<PlaylistItem>> {
        self.record("playlist_items");
        if self.failing_playlists.contains(playlist_id) {
            return Err(upstream_failure());
        }
        let items = self.playlists.get(playlist_id).cloned().unwrap_or_default();
        page(&items, max_results, page_token)
    }

    async fn videos(&self, ids: &[String]) -> Result<ListResponse<VideoItem>> {
        self.record("videos");
        self.detail_batches.lock().push(ids.to_vec());
        if self.fail_videos {
            return Err(upstream_failure());
        }
        let items: Vec<Value> = ids.iter().filter_map(|id| self.details.get(id).cloned()).collect();
        Ok(serde_json::from_value(json!({"items": items}))?)
    }
}

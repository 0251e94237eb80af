//! Video pager
//!
//! Cursor over a channel's or playlist's videos in upstream recency order.
//! Pages are fetched on demand with an explicit continuation token, so a
//! caller can stop mid-page (e.g. on reaching a watermark) without issuing
//! further requests.

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::Result;
use crate::schemas::VideoRecord;
use crate::youtube::{SearchRequest, YouTubeApi, MAX_RESULTS_PER_PAGE};

/// Where pages come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// Playlist or uploads collection (1 quota unit per page)
    Playlist(String),
    /// Recency-ordered channel search (100 quota units per page)
    ChannelSearch(String),
}

pub struct VideoPager<'a> {
    api: &'a dyn YouTubeApi,
    source: PageSource,
    limit: usize,
    produced: usize,
    page_token: Option<String>,
    exhausted: bool,
    buffer: VecDeque<VideoRecord>,
    pages_fetched: u32,
}

impl<'a> VideoPager<'a> {
    fn new(api: &'a dyn YouTubeApi, source: PageSource, limit: usize) -> Self {
        Self {
            api,
            source,
            limit,
            produced: 0,
            page_token: None,
            exhausted: limit == 0,
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }

    /// Pages a playlist directly
    pub fn playlist(api: &'a dyn YouTubeApi, playlist_id: &str, limit: usize) -> Self {
        Self::new(api, PageSource::Playlist(playlist_id.to_string()), limit)
    }

    /// Pages a channel through its uploads collection, falling back to a
    /// recency-ordered search when the channel does not expose one
    pub async fn channel(api: &'a dyn YouTubeApi, channel_id: &str, limit: usize) -> Result<Self> {
        let details = api.channel_details(channel_id).await?;
        let uploads = details
            .items
            .iter()
            .find_map(|channel| channel.uploads_playlist_id())
            .map(str::to_string);

        let source = match uploads {
            Some(playlist_id) => {
                debug!(channel_id = %channel_id, uploads = %playlist_id, "Paging uploads collection");
                PageSource::Playlist(playlist_id)
            }
            None => {
                info!(channel_id = %channel_id, "No uploads collection, falling back to search");
                PageSource::ChannelSearch(channel_id.to_string())
            }
        };
        Ok(Self::new(api, source, limit))
    }

    pub fn source(&self) -> &PageSource {
        &self.source
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Whether another record may still be produced
    pub fn has_more(&self) -> bool {
        self.produced < self.limit && (!self.buffer.is_empty() || !self.exhausted)
    }

    /// Next record, or `None` once the limit is reached or upstream runs dry
    pub async fn next(&mut self) -> Result<Option<VideoRecord>> {
        while self.produced < self.limit {
            if let Some(record) = self.buffer.pop_front() {
                self.produced += 1;
                return Ok(Some(record));
            }
            if self.exhausted {
                break;
            }
            self.fetch_page().await?;
        }
        self.buffer.clear();
        Ok(None)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let remaining = self.limit - self.produced;
        let page_size = remaining.min(MAX_RESULTS_PER_PAGE as usize) as u32;
        let token = self.page_token.take();

        let (records, next_token) = match &self.source {
            PageSource::Playlist(playlist_id) => {
                let page = self
                    .api
                    .playlist_items(playlist_id, page_size, token.as_deref())
                    .await?;
                let records: Vec<VideoRecord> = page
                    .items
                    .iter()
                    .filter_map(|item| {
                        let snippet = item.snippet.as_ref()?;
                        Some(VideoRecord::from_snippet(item.video_id()?, snippet))
                    })
                    .collect();
                (records, page.continuation().map(str::to_string))
            }
            PageSource::ChannelSearch(channel_id) => {
                let request = SearchRequest::channel_videos(channel_id.as_str(), page_size).page_token(token);
                let page = self.api.search(&request).await?;
                let records: Vec<VideoRecord> = page
                    .items
                    .iter()
                    .filter_map(|item| {
                        let video_id = item.video_id()?;
                        Some(match item.snippet.as_ref() {
                            Some(snippet) => VideoRecord::from_snippet(video_id, snippet),
                            None => VideoRecord::new(video_id),
                        })
                    })
                    .collect();
                (records, page.continuation().map(str::to_string))
            }
        };

        self.pages_fetched += 1;
        debug!(
            source = ?self.source,
            videos = records.len(),
            has_next = next_token.is_some(),
            "Fetched page"
        );

        self.buffer.extend(records);
        self.exhausted = next_token.is_none();
        self.page_token = next_token;
        Ok(())
    }

    /// Drains the pager into a vector
    pub async fn collect_all(mut self) -> Result<Vec<VideoRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeYouTube;

    fn ids(records: &[VideoRecord]) -> Vec<&str> {
        records.iter().map(|r| r.video_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_channel_pages_uploads_collection() {
        let api = FakeYouTube::new().with_uploads("UC1", &["v3", "v2", "v1"]);

        let pager = VideoPager::channel(&api, "UC1", 10).await.unwrap();
        assert_eq!(pager.source(), &PageSource::Playlist("UU1".to_string()));

        let records = pager.collect_all().await.unwrap();
        assert_eq!(ids(&records), vec!["v3", "v2", "v1"]);
        assert_eq!(records[0].channel_id.as_deref(), Some("UC1"));
        assert_eq!(api.calls_to("search"), 0);
    }

    #[tokio::test]
    async fn test_channel_without_uploads_falls_back_to_search() {
        let api = FakeYouTube::new().with_search_only_channel("UC9", &["s1", "s2", "s3"]);

        let pager = VideoPager::channel(&api, "UC9", 10).await.unwrap();
        assert_eq!(pager.source(), &PageSource::ChannelSearch("UC9".to_string()));

        let records = pager.collect_all().await.unwrap();
        // Interleaved channel results are filtered out
        assert_eq!(ids(&records), vec!["s1", "s2", "s3"]);

        let request = &api.search_requests()[0];
        assert!(request.order_by_date);
        assert_eq!(request.channel_id.as_deref(), Some("UC9"));
    }

    #[tokio::test]
    async fn test_limit_caps_page_size_and_output() {
        let videos: Vec<String> = (0..120).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = videos.iter().map(String::as_str).collect();
        let api = FakeYouTube::new().with_playlist("PL1", &refs);

        let mut pager = VideoPager::playlist(&api, "PL1", 70);
        let mut count = 0;
        while let Some(_) = pager.next().await.unwrap() {
            count += 1;
        }

        assert_eq!(count, 70);
        assert!(!pager.has_more());
        // 50 then 20
        assert_eq!(pager.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn test_stops_when_no_continuation() {
        let api = FakeYouTube::new().with_playlist("PL1", &["a", "b"]);
        let records = VideoPager::playlist(&api, "PL1", 100).collect_all().await.unwrap();
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(api.calls_to("playlist_items"), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_makes_no_calls() {
        let api = FakeYouTube::new().with_playlist("PL1", &["a"]);
        let mut pager = VideoPager::playlist(&api, "PL1", 0);
        assert!(!pager.has_more());
        assert!(pager.next().await.unwrap().is_none());
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_consumption_stops_fetching() {
        let videos: Vec<String> = (0..60).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = videos.iter().map(String::as_str).collect();
        let api = FakeYouTube::new().with_playlist("PL1", &refs);

        let mut pager = VideoPager::playlist(&api, "PL1", 100);
        let first = pager.next().await.unwrap().unwrap();
        assert_eq!(first.video_id, "v0");
        assert!(pager.has_more());
        drop(pager);

        assert_eq!(api.calls_to("playlist_items"), 1);
    }

    #[tokio::test]
    async fn test_page_error_surfaces() {
        let api = FakeYouTube::new().failing_playlist("PLbad");
        let mut pager = VideoPager::playlist(&api, "PLbad", 10);
        assert!(pager.next().await.is_err());
    }
}

//! Channel resolution
//!
//! Turns a classified reference into a canonical channel id. The cache is
//! always consulted first; only a miss reaches the network. Retries live in
//! the HTTP client, so every lookup here is a single attempt.

use tracing::{debug, info, warn};

use crate::checkpoint::ChannelReferenceCache;
use crate::error::Result;
use crate::reference::{classify, ClassifiedReference};
use crate::schemas::SourceDescriptor;
use crate::schemas::video_record::SOURCE_YOUTUBE;
use crate::youtube::{SearchRequest, YouTubeApi};

/// Candidates requested when searching for a handle
const HANDLE_SEARCH_RESULTS: u32 = 5;

/// Candidates requested for a free-text channel search
const QUERY_SEARCH_RESULTS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    NotFound,
    /// Playlist and video references never name a channel
    NotAChannel,
}

impl Resolution {
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

pub struct ChannelResolver<'a> {
    api: &'a dyn YouTubeApi,
    cache: &'a ChannelReferenceCache,
    relevance_language: Option<String>,
}

impl<'a> ChannelResolver<'a> {
    pub fn new(api: &'a dyn YouTubeApi, cache: &'a ChannelReferenceCache) -> Self {
        Self {
            api,
            cache,
            relevance_language: None,
        }
    }

    /// Biases channel searches towards a language
    pub fn with_relevance_language(mut self, language: Option<String>) -> Self {
        self.relevance_language = language;
        self
    }

    /// Resolves `reference`, where `raw` is the descriptor's original string
    pub async fn resolve(&self, raw: &str, reference: &ClassifiedReference) -> Result<Resolution> {
        if !reference.is_channel_like() {
            return Ok(Resolution::NotAChannel);
        }

        if let Some(channel_id) = self
            .cache
            .get(raw)
            .or_else(|| self.cache.get(reference.value()))
        {
            debug!(reference = %raw, channel_id = %channel_id, "Channel resolved from cache");
            return Ok(Resolution::Resolved(channel_id.to_string()));
        }

        let found = match reference {
            ClassifiedReference::ChannelId(id) => Some(id.clone()),
            ClassifiedReference::User(name) => {
                let response = self.api.channels_for_username(name).await?;
                response
                    .items
                    .into_iter()
                    .next()
                    .map(|channel| channel.id)
                    .filter(|id| !id.is_empty())
            }
            ClassifiedReference::Handle(handle) => {
                let query = handle.trim_start_matches('@');
                let request = SearchRequest::channels(query, HANDLE_SEARCH_RESULTS)
                    .relevance_language(self.relevance_language.clone());
                let response = self.api.search(&request).await?;
                response
                    .items
                    .iter()
                    .find_map(|item| item.channel_id())
                    .map(str::to_string)
            }
            ClassifiedReference::SearchQuery(query) => {
                let request = SearchRequest::channels(query.as_str(), QUERY_SEARCH_RESULTS)
                    .relevance_language(self.relevance_language.clone());
                let response = self.api.search(&request).await?;
                response
                    .items
                    .first()
                    .and_then(|item| item.channel_id())
                    .map(str::to_string)
            }
            ClassifiedReference::PlaylistId(_) | ClassifiedReference::VideoId(_) => None,
        };

        Ok(match found {
            Some(channel_id) => {
                debug!(reference = %raw, channel_id = %channel_id, "Channel resolved");
                Resolution::Resolved(channel_id)
            }
            None => Resolution::NotFound,
        })
    }
}

/// Resolve-only pass: maps every channel-like reference in `sources` to its
/// canonical id, keyed by both the extracted value and the raw reference.
///
/// Unresolvable or failing references are logged and left out.
pub async fn build_channel_map(
    sources: &[SourceDescriptor],
    api: &dyn YouTubeApi,
    relevance_language: Option<String>,
) -> ChannelReferenceCache {
    let empty = ChannelReferenceCache::new();
    let resolver = ChannelResolver::new(api, &empty).with_relevance_language(relevance_language);
    let mut map = ChannelReferenceCache::new();

    for descriptor in sources.iter().filter(|d| d.is_source(SOURCE_YOUTUBE)) {
        let reference = classify(&descriptor.reference);
        match resolver.resolve(&descriptor.reference, &reference).await {
            Ok(Resolution::Resolved(channel_id)) => {
                map.insert(reference.value(), channel_id.clone());
                map.insert(descriptor.reference.as_str(), channel_id);
            }
            Ok(Resolution::NotAChannel) => {}
            Ok(Resolution::NotFound) => {
                warn!(reference = %descriptor.reference, "Could not resolve channel");
            }
            Err(e) => {
                warn!(reference = %descriptor.reference, error = %e, "Channel resolution failed");
            }
        }
    }

    info!(entries = map.len(), "Channel map built");
    map
}

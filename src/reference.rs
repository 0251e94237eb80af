//! Reference classification
//!
//! Turns a free-form source reference (URL, `@handle`, bare id, channel
//! name) into a typed reference. Classification is pure and total: anything
//! unrecognised becomes a search query carrying the trimmed input.

use serde::{Deserialize, Serialize};
use url::Url;

/// Hosts whose URLs are understood
pub const PLATFORM_HOSTS: &[&str] = &["www.youtube.com", "youtube.com", "m.youtube.com", "youtu.be"];

/// Short-link host; its path is the video id
pub const SHORT_LINK_HOST: &str = "youtu.be";

/// Prefix of canonical channel ids
pub const CHANNEL_ID_PREFIX: &str = "UC";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ClassifiedReference {
    ChannelId(String),
    PlaylistId(String),
    VideoId(String),
    Handle(String),
    User(String),
    SearchQuery(String),
}

impl ClassifiedReference {
    /// The extracted value (handles keep their leading `@`)
    pub fn value(&self) -> &str {
        match self {
            ClassifiedReference::ChannelId(v)
            | ClassifiedReference::PlaylistId(v)
            | ClassifiedReference::VideoId(v)
            | ClassifiedReference::Handle(v)
            | ClassifiedReference::User(v)
            | ClassifiedReference::SearchQuery(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedReference::ChannelId(_) => "channel_id",
            ClassifiedReference::PlaylistId(_) => "playlist_id",
            ClassifiedReference::VideoId(_) => "video_id",
            ClassifiedReference::Handle(_) => "handle",
            ClassifiedReference::User(_) => "user",
            ClassifiedReference::SearchQuery(_) => "search_query",
        }
    }

    /// Whether this kind can name a channel at all
    pub fn is_channel_like(&self) -> bool {
        !matches!(
            self,
            ClassifiedReference::PlaylistId(_) | ClassifiedReference::VideoId(_)
        )
    }
}

/// Classifies a reference string
pub fn classify(reference: &str) -> ClassifiedReference {
    let s = reference.trim();

    if s.starts_with('@') && !s.contains('/') {
        return ClassifiedReference::Handle(s.to_string());
    }

    if let Some(classified) = Url::parse(s).ok().and_then(|url| classify_url(&url)) {
        return classified;
    }

    ClassifiedReference::SearchQuery(s.to_string())
}

fn classify_url(url: &Url) -> Option<ClassifiedReference> {
    let host = url.host_str()?;
    if !PLATFORM_HOSTS.contains(&host) {
        return None;
    }

    let parts: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    if host == SHORT_LINK_HOST {
        if let Some(video_id) = parts.first() {
            return Some(ClassifiedReference::VideoId(video_id.to_string()));
        }
    }

    if let Some(list) = query_param(url, "list") {
        return Some(ClassifiedReference::PlaylistId(list));
    }
    if let Some(video_id) = query_param(url, "v") {
        return Some(ClassifiedReference::VideoId(video_id));
    }

    match parts.as_slice() {
        ["channel", id, ..] if id.starts_with(CHANNEL_ID_PREFIX) => {
            Some(ClassifiedReference::ChannelId(id.to_string()))
        }
        ["user", name, ..] => Some(ClassifiedReference::User(name.to_string())),
        [first, ..] if first.starts_with('@') => Some(ClassifiedReference::Handle(first.to_string())),
        ["c", slug, ..] => Some(ClassifiedReference::SearchQuery(slug.to_string())),
        ["playlist", id, ..] => Some(ClassifiedReference::PlaylistId(id.to_string())),
        _ => None,
    }
}

/// First non-empty value of a query parameter
fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

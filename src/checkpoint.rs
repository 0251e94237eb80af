//! Checkpoint Module
//!
//! Persists incremental ingestion state between runs:
//! - the watermark (`channel id -> last seen video id`)
//! - the resolved-reference cache (`reference -> channel id`)
//!
//! Both are JSON documents behind the pluggable `StateStore` trait. A
//! missing document means "no prior state", never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// Document key for the watermark
pub const WATERMARK_KEY: &str = "ingest_state";

/// Document key for the resolved-reference cache
pub const CHANNEL_MAP_KEY: &str = "channel_map";

const WATERMARK_VERSION: u32 = 1;

// ============================================
// STATE STORE
// ============================================

/// Key-value store for JSON state documents
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads a document, `None` when it does not exist
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Replaces a document
    async fn save(&self, key: &str, document: &Value) -> Result<()>;

    /// Deletes a document; deleting a missing document is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per document under a directory
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_str(&contents)?;
        Ok(Some(value))
    }

    async fn save(&self, key: &str, document: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(document)?;

        // Write to temp file first, then rename (atomic on most filesystems)
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        debug!(path = %path.display(), "State document saved");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, used by tests and dry runs
#[derive(Default)]
pub struct MemoryStateStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.documents.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, document: &Value) -> Result<()> {
        self.documents.lock().insert(key.to_string(), document.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.documents.lock().remove(key);
        Ok(())
    }
}

// ============================================
// WATERMARK
// ============================================

/// Most recent video id ingested per channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalWatermark {
    channels: BTreeMap<String, String>,
}

impl IncrementalWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel_id: &str) -> Option<&str> {
        self.channels.get(channel_id).map(String::as_str)
    }

    pub fn set(&mut self, channel_id: impl Into<String>, video_id: impl Into<String>) {
        self.channels.insert(channel_id.into(), video_id.into());
    }

    pub fn remove(&mut self, channel_id: &str) -> Option<String> {
        self.channels.remove(channel_id)
    }

    /// Overlays new heads; channels without a new head keep their old value
    pub fn merged_with(&self, new_heads: &BTreeMap<String, String>) -> Self {
        let mut merged = self.clone();
        for (channel_id, video_id) in new_heads {
            merged.set(channel_id.clone(), video_id.clone());
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl FromIterator<(String, String)> for IncrementalWatermark {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}

/// Persisted form of the watermark
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatermarkDocument {
    version: u32,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    channels: BTreeMap<String, String>,
}

// ============================================
// CHANNEL REFERENCE CACHE
// ============================================

/// Reference string (handle, slug, raw ref) to canonical channel id.
///
/// Read-only during ingestion; stale entries are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelReferenceCache {
    entries: BTreeMap<String, String>,
}

impl ChannelReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<&str> {
        self.entries
            .get(reference)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn insert(&mut self, reference: impl Into<String>, channel_id: impl Into<String>) {
        self.entries.insert(reference.into(), channel_id.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================
// CHECKPOINT MANAGER
// ============================================

/// Loads and saves ingestion state through a `StateStore`
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn StateStore>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Manager backed by `<dir>/<key>.json` files
    pub fn with_dir(dir: &Path) -> Self {
        Self::new(Arc::new(FileStateStore::new(dir)))
    }

    /// Loads the watermark. An absent document means a first run; a document
    /// that exists but cannot be read is an error, since saving over it would
    /// drop every channel not harvested this run.
    pub async fn load_watermark(&self) -> Result<IncrementalWatermark> {
        let document = match self.store.load(WATERMARK_KEY).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!("No existing watermark, starting fresh");
                return Ok(IncrementalWatermark::new());
            }
            Err(e) => {
                return Err(IngestionError::StateError(format!(
                    "watermark is unreadable ({}); fix it or run `reset --all`",
                    e
                )));
            }
        };

        let doc = serde_json::from_value::<WatermarkDocument>(document).map_err(|e| {
            IngestionError::StateError(format!(
                "watermark is malformed ({}); fix it or run `reset --all`",
                e
            ))
        })?;
        info!(
            channels = doc.channels.len(),
            updated_at = %doc.updated_at,
            "Loaded existing watermark"
        );
        Ok(IncrementalWatermark {
            channels: doc.channels,
        })
    }

    /// Replaces the persisted watermark
    pub async fn save_watermark(&self, watermark: &IncrementalWatermark) -> Result<()> {
        let document = WatermarkDocument {
            version: WATERMARK_VERSION,
            updated_at: Utc::now(),
            channels: watermark.channels.clone(),
        };
        let value = serde_json::to_value(&document)?;
        self.store.save(WATERMARK_KEY, &value).await?;
        info!(channels = watermark.len(), "Watermark saved");
        Ok(())
    }

    /// Removes the watermark for one channel, or all channels when `None`
    pub async fn reset_watermark(&self, channel_id: Option<&str>) -> Result<bool> {
        match channel_id {
            None => {
                self.store.remove(WATERMARK_KEY).await?;
                Ok(true)
            }
            Some(channel_id) => {
                let mut watermark = self.load_watermark().await?;
                let removed = watermark.remove(channel_id).is_some();
                if removed {
                    self.save_watermark(&watermark).await?;
                }
                Ok(removed)
            }
        }
    }

    /// Loads the resolved-reference cache; absent or unreadable means empty
    pub async fn load_channel_cache(&self) -> ChannelReferenceCache {
        match self.store.load(CHANNEL_MAP_KEY).await {
            Ok(Some(document)) => match serde_json::from_value(document) {
                Ok(cache) => cache,
                Err(e) => {
                    warn!(error = %e, "Channel map is malformed, ignoring it");
                    ChannelReferenceCache::new()
                }
            },
            Ok(None) => ChannelReferenceCache::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load channel map, ignoring it");
                ChannelReferenceCache::new()
            }
        }
    }

    pub async fn save_channel_cache(&self, cache: &ChannelReferenceCache) -> Result<()> {
        let value = serde_json::to_value(cache)
            .map_err(|e| IngestionError::StateError(format!("channel map: {}", e)))?;
        self.store.save(CHANNEL_MAP_KEY, &value).await?;
        info!(entries = cache.len(), "Channel map saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heads(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_keeps_untouched_channels() {
        let old: IncrementalWatermark = vec![
            ("UC_a".to_string(), "a1".to_string()),
            ("UC_b".to_string(), "b1".to_string()),
        ]
        .into_iter()
        .collect();

        let merged = old.merged_with(&heads(&[("UC_b", "b2"), ("UC_c", "c1")]));

        assert_eq!(merged.get("UC_a"), Some("a1"));
        assert_eq!(merged.get("UC_b"), Some("b2"));
        assert_eq!(merged.get("UC_c"), Some("c1"));
        assert_eq!(merged.len(), 3);
        // The original is untouched
        assert_eq!(old.get("UC_b"), Some("b1"));
    }

    #[test]
    fn test_cache_ignores_empty_ids() {
        let mut cache = ChannelReferenceCache::new();
        cache.insert("@handle", "UC123");
        cache.insert("@blank", "");

        assert_eq!(cache.get("@handle"), Some("UC123"));
        assert_eq!(cache.get("@blank"), None);
        assert_eq!(cache.get("@missing"), None);
    }

    #[tokio::test]
    async fn test_watermark_round_trip_through_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::with_dir(temp_dir.path());

        assert!(manager.load_watermark().await.unwrap().is_empty());

        let mut watermark = IncrementalWatermark::new();
        watermark.set("UC1", "v5");
        manager.save_watermark(&watermark).await.unwrap();

        let loaded = CheckpointManager::with_dir(temp_dir.path())
            .load_watermark()
            .await
            .unwrap();
        assert_eq!(loaded, watermark);
        assert!(temp_dir.path().join("ingest_state.json").exists());
    }

    #[tokio::test]
    async fn test_malformed_watermark_is_an_error() {
        let store = Arc::new(MemoryStateStore::new());
        store
            .save(WATERMARK_KEY, &serde_json::json!({"unexpected": true}))
            .await
            .unwrap();

        let manager = CheckpointManager::new(store);
        let err = manager.load_watermark().await.unwrap_err();
        assert!(matches!(err, IngestionError::StateError(_)));
    }

    #[tokio::test]
    async fn test_unparseable_watermark_file_is_left_in_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ingest_state.json");
        let raw = r#"{"version":1,"updatedAt":"yesterday","channels":{"UC_other":"x1"}}"#;
        std::fs::write(&path, raw).unwrap();

        let manager = CheckpointManager::with_dir(temp_dir.path());
        assert!(manager.load_watermark().await.is_err());
        assert!(manager.reset_watermark(Some("UC_other")).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), raw);

        // A full reset is the way out
        manager.reset_watermark(None).await.unwrap();
        assert!(manager.load_watermark().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_single_channel_and_all() {
        let manager = CheckpointManager::new(Arc::new(MemoryStateStore::new()));
        let mut watermark = IncrementalWatermark::new();
        watermark.set("UC1", "v1");
        watermark.set("UC2", "v2");
        manager.save_watermark(&watermark).await.unwrap();

        assert!(manager.reset_watermark(Some("UC1")).await.unwrap());
        assert!(!manager.reset_watermark(Some("UC1")).await.unwrap());
        let loaded = manager.load_watermark().await.unwrap();
        assert_eq!(loaded.get("UC1"), None);
        assert_eq!(loaded.get("UC2"), Some("v2"));

        manager.reset_watermark(None).await.unwrap();
        assert!(manager.load_watermark().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_cache_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::with_dir(temp_dir.path());
        assert!(manager.load_channel_cache().await.is_empty());

        let mut cache = ChannelReferenceCache::new();
        cache.insert("@NoorKids", "UC42");
        manager.save_channel_cache(&cache).await.unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join("channel_map.json")).unwrap();
        assert!(raw.contains("\"@NoorKids\": \"UC42\""));
        assert_eq!(manager.load_channel_cache().await, cache);
    }

    #[tokio::test]
    async fn test_file_store_remove_missing_is_ok() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        assert!(store.remove("nope").await.is_ok());
        assert!(store.load("nope").await.unwrap().is_none());
    }
}

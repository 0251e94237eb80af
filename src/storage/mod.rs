//! Storage sink for enriched records
//!
//! Records are upserted under a stable document id (`yt:<videoId>`) with
//! merge semantics: fields already stored but absent from the incoming
//! record are kept. Writes are committed in chunks below the sink's
//! per-commit ceiling.

pub mod filesystem;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{IngestionError, Result};
use crate::schemas::VideoRecord;

pub use filesystem::FsDocumentSink;
pub use postgres::PgDocumentSink;

/// Operations per commit, with headroom under the 500-operation hard limit
pub const MAX_OPS_PER_COMMIT: usize = 400;

/// Document id prefix for this platform
pub const CONTENT_ID_PREFIX: &str = "yt";

/// Stable document id for a record, `None` when it has no video id
pub fn content_id(record: &VideoRecord) -> Option<String> {
    if record.video_id.is_empty() {
        return None;
    }
    Some(format!("{}:{}", CONTENT_ID_PREFIX, record.video_id))
}

/// Document store accepting merge-upserts
#[async_trait]
pub trait ContentSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upserts one chunk of `(id, document)` pairs
    async fn commit(&self, collection: &str, documents: &[(String, Value)]) -> Result<()>;
}

/// Deep-merges `incoming` into `existing`; nested objects merge, anything
/// else is replaced
pub fn merge_documents(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(update)) => {
            for (key, value) in update {
                match current.get_mut(&key) {
                    Some(slot) => merge_documents(slot, value),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Writes records to the sink, returning the number of documents written.
///
/// Chunks already committed stay committed when a later chunk fails.
pub async fn write_content(
    sink: &dyn ContentSink,
    collection: &str,
    records: &[VideoRecord],
) -> Result<usize> {
    let mut documents = Vec::with_capacity(records.len());
    for record in records {
        let Some(id) = content_id(record) else {
            debug!("Skipping record without video id");
            continue;
        };
        documents.push((id, serde_json::to_value(record)?));
    }

    let mut written = 0;
    for chunk in documents.chunks(MAX_OPS_PER_COMMIT) {
        sink.commit(collection, chunk).await.map_err(|e| {
            IngestionError::StorageError(format!(
                "{} sink failed after {} documents: {}",
                sink.name(),
                written,
                e
            ))
        })?;
        written += chunk.len();
        debug!(sink = sink.name(), chunk = chunk.len(), written, "Committed chunk");
    }

    info!(sink = sink.name(), collection = %collection, written, "Records stored");
    Ok(written)
}

/// Creates the sink named by `sink_type`, `None` for "none"
pub async fn create_sink(
    sink_type: &str,
    dir: &Path,
    database_url: Option<&str>,
) -> Result<Option<Box<dyn ContentSink>>> {
    match sink_type {
        "none" | "" => Ok(None),
        "filesystem" | "local" => Ok(Some(Box::new(FsDocumentSink::new(dir).await?))),
        "postgres" => {
            let url = database_url
                .ok_or_else(|| IngestionError::StorageError("Database URL not configured".to_string()))?;
            let sink = PgDocumentSink::connect(url).await?;
            sink.ensure_schema().await?;
            Ok(Some(Box::new(sink)))
        }
        _ => Err(IngestionError::StorageError(format!("Unknown sink type: {}", sink_type))),
    }
}

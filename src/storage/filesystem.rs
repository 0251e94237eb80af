//! Filesystem document sink
//!
//! One pretty-printed JSON file per document under
//! `<base>/<collection>/<id>.json`. `:` in ids becomes `_` in file names.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{merge_documents, ContentSink};
use crate::error::{IngestionError, Result};

pub struct FsDocumentSink {
    base_path: PathBuf,
}

impl FsDocumentSink {
    pub async fn new(base_path: &Path) -> Result<Self> {
        fs::create_dir_all(base_path)
            .await
            .map_err(|e| IngestionError::StorageError(format!("Failed to create sink dir: {}", e)))?;

        info!(path = %base_path.display(), "Initialized filesystem sink");
        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    pub fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.base_path
            .join(collection)
            .join(format!("{}.json", id.replace(':', "_")))
    }

    /// Reads a stored document, if present
    pub async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        match fs::read_to_string(self.document_path(collection, id)).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let merged = match self.read(collection, id).await? {
            Some(mut existing) => {
                merge_documents(&mut existing, document.clone());
                existing
            }
            None => document.clone(),
        };

        let path = self.document_path(collection, id);
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(serde_json::to_string_pretty(&merged)?.as_bytes())
            .await?;
        file.flush().await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentSink for FsDocumentSink {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn commit(&self, collection: &str, documents: &[(String, Value)]) -> Result<()> {
        let dir = self.base_path.join(collection);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| IngestionError::StorageError(format!("Failed to create collection dir: {}", e)))?;

        for (id, document) in documents {
            self.upsert(collection, id, document).await?;
        }
        debug!(collection = %collection, documents = documents.len(), "Chunk written");
        Ok(())
    }
}

//! Postgres document sink
//!
//! Documents live in a single `content_documents` table keyed by
//! `(collection, id)`. Upserts use jsonb concatenation, so top-level fields
//! missing from the incoming document are preserved. Each chunk is one
//! transaction.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info};

use super::ContentSink;
use crate::error::Result;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS content_documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    doc JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
)
"#;

const UPSERT_DOCUMENT: &str = r#"
INSERT INTO content_documents (collection, id, doc, updated_at)
VALUES ($1, $2, $3, NOW())
ON CONFLICT (collection, id) DO UPDATE SET
    doc = content_documents.doc || EXCLUDED.doc,
    updated_at = NOW()
"#;

#[derive(Clone)]
pub struct PgDocumentSink {
    db: PgPool,
}

impl PgDocumentSink {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");
        let db = PgPool::connect(database_url).await?;
        info!("Postgres sink initialized");
        Ok(Self { db })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentSink for PgDocumentSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn commit(&self, collection: &str, documents: &[(String, Value)]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (id, document) in documents {
            // Runtime query to avoid a compile-time DB requirement
            sqlx::query(UPSERT_DOCUMENT)
                .bind(collection)
                .bind(id)
                .bind(document)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(collection = %collection, documents = documents.len(), "Chunk committed");
        Ok(())
    }
}

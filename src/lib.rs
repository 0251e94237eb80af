//! Lumens video catalog ingestion
//!
//! Harvests video metadata from curated channels and playlists, keeps a
//! deduplicated and enriched batch, and tracks per-channel watermarks so
//! repeat runs only fetch what is new.

pub mod checkpoint;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod harvester;
pub mod http_client;
pub mod ingest;
pub mod metrics;
pub mod output;
pub mod pager;
pub mod reference;
pub mod resolver;
pub mod schemas;
pub mod storage;
pub mod youtube;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{IngestionError, Result};

//! Deduplication Module
//!
//! Run-scoped seen-set of video ids. A video yielded by several sources
//! survives only for the first one. The set is synchronized so per-source
//! fetching can later run concurrently without double counting.

use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::debug;

/// In-memory set of video ids seen during one run
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: RwLock<HashSet<String>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and marks in one operation (atomic check-and-set)
    /// Returns true if duplicate, false if new (and marks as seen)
    pub fn check_and_mark(&self, video_id: &str) -> bool {
        let mut seen = self.seen.write();
        if seen.contains(video_id) {
            debug!(video_id = %video_id, "Duplicate video dropped");
            return true;
        }
        seen.insert(video_id.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.read().is_empty()
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use irrigo_core::{ActivityEntry, ActivityRecord};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{ActivityLog, IdSource, sort_newest_first};

#[derive(Debug, Error)]
pub enum MemoryLogError {
    #[error("internal error: {0}")]
    Internal(String),
}

/// In-memory activity log.
///
/// With a capacity set, the oldest entries are evicted once the log is full.
#[derive(Clone, Default)]
pub struct MemoryActivityLog {
    entries: Arc<RwLock<VecDeque<ActivityEntry>>>,
    ids: IdSource,
    capacity: Option<usize>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    type Error = MemoryLogError;

    async fn append(&self, record: ActivityRecord) -> Result<ActivityEntry, Self::Error> {
        let mut entries = self.entries.write().await;
        let id = self.ids.next().map_err(MemoryLogError::Internal)?;
        let entry = record.stamp(id, jiff::Timestamp::now());

        entries.push_back(entry.clone());
        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                let _ = entries.pop_front();
            }
        }

        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, Self::Error> {
        let entries = self.entries.read().await;
        let mut all: Vec<ActivityEntry> = entries.iter().cloned().collect();
        sort_newest_first(&mut all);
        all.truncate(limit);
        Ok(all)
    }

    async fn count(&self) -> Result<usize, Self::Error> {
        Ok(self.entries.read().await.len())
    }
}

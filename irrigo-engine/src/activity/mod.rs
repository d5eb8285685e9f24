pub mod memory;
pub mod sqlite;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use irrigo_core::{ActivityEntry, ActivityId, ActivityRecord};
use ulid::Generator;

/// Append-only, bounded-recency log of pump and skip events.
///
/// `append` assigns the identifier and timestamp; ids handed out by one log
/// are strictly increasing. `recent` returns newest first, ordered by
/// timestamp and then by id.
#[async_trait]
pub trait ActivityLog: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn append(&self, record: ActivityRecord) -> Result<ActivityEntry, Self::Error>;

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, Self::Error>;

    async fn count(&self) -> Result<usize, Self::Error>;
}

/// Monotonic ULID source shared by the log implementations.
#[derive(Clone)]
pub(crate) struct IdSource {
    generator: Arc<Mutex<Generator>>,
}

impl Default for IdSource {
    fn default() -> Self {
        Self {
            generator: Arc::new(Mutex::new(Generator::new())),
        }
    }
}

impl IdSource {
    pub(crate) fn next(&self) -> Result<ActivityId, String> {
        let mut generator = self
            .generator
            .lock()
            .map_err(|_| "activity id generator mutex poisoned".to_string())?;
        generator
            .generate()
            .map(ActivityId)
            .map_err(|e| format!("activity id space exhausted: {e}"))
    }
}

/// Newest first: timestamp descending, then id descending.
pub(crate) fn sort_newest_first(entries: &mut [ActivityEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

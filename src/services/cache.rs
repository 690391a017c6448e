use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::ApodRecord;

/// In-process record cache keyed by `YYYY-MM-DD`.
///
/// Unbounded and never evicted: there is one record per calendar day. Callers
/// only see `get`/`insert`, so an eviction policy can be added here later
/// without touching them.
#[derive(Default)]
pub struct ApodCache {
    entries: RwLock<HashMap<String, Arc<ApodRecord>>>,
}

impl ApodCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ApodRecord>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Stores `record` under `key` unless the key is already present.
    /// Returns the record that ends up cached.
    pub async fn insert(&self, key: impl Into<String>, record: Arc<ApodRecord>) -> Arc<ApodRecord> {
        let mut entries = self.entries.write().await;
        entries.entry(key.into()).or_insert(record).clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

//! Per-source discovery cache

use crate::models::{ModelRecord, ModelSource};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;

/// Result of the most recent successful adapter call for one source
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub records: Vec<ModelRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Time-bounded cache of adapter results, keyed by source
///
/// An entry is fresh while `now - fetched_at < ttl`. Entries are replaced
/// wholesale, never merged.
pub struct DiscoveryCache {
    ttl: Duration,
    entries: RwLock<HashMap<ModelSource, CacheEntry>>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached records for `source` if the entry has not expired
    pub async fn get_fresh(&self, source: ModelSource) -> Option<Vec<ModelRecord>> {
        let entries = self.entries.read().await;
        let entry = entries.get(&source)?;

        // A fetched_at in the future (clock moved back) counts as fresh
        let fresh = (Utc::now() - entry.fetched_at)
            .to_std()
            .map_or(true, |age| age < self.ttl);

        fresh.then(|| entry.records.clone())
    }

    pub async fn insert(&self, source: ModelSource, records: Vec<ModelRecord>) {
        self.insert_at(source, records, Utc::now()).await;
    }

    /// Insert with an explicit fetch time
    pub async fn insert_at(
        &self,
        source: ModelSource,
        records: Vec<ModelRecord>,
        fetched_at: DateTime<Utc>,
    ) {
        self.entries
            .write()
            .await
            .insert(source, CacheEntry { records, fetched_at });
    }

    /// Fetch time of every cached source
    pub async fn timestamps(&self) -> BTreeMap<ModelSource, DateTime<Utc>> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(source, entry)| (*source, entry.fetched_at))
            .collect()
    }
}

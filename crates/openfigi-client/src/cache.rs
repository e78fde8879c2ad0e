use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fiscal_core::IdentifierRecord;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Store of enriched identifier records, keyed by normalized code
#[async_trait]
pub trait IdentifierCache: Send + Sync {
    async fn get(&self, code: &str) -> Result<Option<IdentifierRecord>, CacheError>;

    async fn set(&self, code: &str, record: &IdentifierRecord) -> Result<(), CacheError>;
}

struct CacheEntry {
    record: IdentifierRecord,
    cached_at: Instant,
}

/// Process-local cache with a fixed time-to-live
pub struct InMemoryIdentifierCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl InMemoryIdentifierCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        before - self.entries.len()
    }
}

#[async_trait]
impl IdentifierCache for InMemoryIdentifierCache {
    async fn get(&self, code: &str) -> Result<Option<IdentifierRecord>, CacheError> {
        if let Some(entry) = self.entries.get(code) {
            if entry.cached_at.elapsed() < self.ttl {
                return Ok(Some(entry.record.clone()));
            }
        }
        // Expired entries are removed lazily
        self.entries
            .remove_if(code, |_, entry| entry.cached_at.elapsed() >= self.ttl);
        Ok(None)
    }

    async fn set(&self, code: &str, record: &IdentifierRecord) -> Result<(), CacheError> {
        self.entries.insert(
            code.to_string(),
            CacheEntry {
                record: record.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(())
    }
}

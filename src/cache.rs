use async_trait::async_trait;
use moka::future::Cache;

use crate::cache_validator::ValidatedCacheEntry;
use crate::config::CacheConfig;
use crate::errors::StoreError;
use crate::models::BankIntegration;

/// Name of the cache region holding integration records.
pub const BUCKET: &str = "bank_integration";

/// Key-value mirror of the record store, keyed by record id.
///
/// The cache is not guaranteed to be complete: `list` may return fewer records
/// than the store holds.
#[async_trait]
pub trait IntegrationCache: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<BankIntegration>, StoreError>;

    /// Idempotent overwrite.
    async fn put(&self, id: &str, record: &BankIntegration) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<BankIntegration>, StoreError>;

    async fn invalidate(&self, id: &str) -> Result<(), StoreError>;
}

/// In-process cache region backed by moka.
///
/// Values are stored as checksummed envelopes; an entry that fails validation is
/// dropped and reported as a miss.
pub struct MokaIntegrationCache {
    cache: Cache<String, String>,
}

impl MokaIntegrationCache {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().name(BUCKET);
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
        }
    }
}

#[async_trait]
impl IntegrationCache for MokaIntegrationCache {
    async fn get(&self, id: &str) -> Result<Option<BankIntegration>, StoreError> {
        let Some(raw) = self.cache.get(id).await else {
            return Ok(None);
        };

        match ValidatedCacheEntry::open::<BankIntegration>(&raw) {
            Some(record) => Ok(Some(record)),
            None => {
                tracing::warn!("Dropping corrupted cache entry {}:{}", BUCKET, id);
                self.cache.invalidate(id).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, id: &str, record: &BankIntegration) -> Result<(), StoreError> {
        let sealed = ValidatedCacheEntry::seal(record)
            .map_err(|e| StoreError::Cache(format!("failed to serialize record {}: {}", id, e)))?;
        self.cache.insert(id.to_string(), sealed).await;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BankIntegration>, StoreError> {
        let records = self
            .cache
            .iter()
            .filter_map(|(key, raw)| {
                let record = ValidatedCacheEntry::open::<BankIntegration>(&raw);
                if record.is_none() {
                    tracing::warn!("Skipping corrupted cache entry {}:{}", BUCKET, key);
                }
                record
            })
            .collect();
        Ok(records)
    }

    async fn invalidate(&self, id: &str) -> Result<(), StoreError> {
        self.cache.invalidate(id).await;
        Ok(())
    }
}

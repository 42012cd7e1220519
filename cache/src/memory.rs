use std::time::{Duration, Instant};

use async_trait::async_trait;
use chunkvault_common::CacheTtls;
use dashmap::DashMap;

use crate::{Cache, CacheNamespace};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process implementation of the read-through cache contract, backed by
/// a sharded concurrent map rather than a mutex-guarded `HashMap`. Entries
/// carry their own expiry instant so a read past TTL is a plain miss
/// without a background sweeper.
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
    ttls: CacheTtls,
}

impl InMemoryCache {
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            entries: DashMap::new(),
            ttls,
        }
    }

    fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        let secs = match namespace {
            CacheNamespace::ChunkData => self.ttls.chunk_data_secs,
            CacheNamespace::FileMetadata => self.ttls.file_metadata_secs,
            CacheNamespace::UserFiles => self.ttls.user_files_secs,
            CacheNamespace::ShareInfo => self.ttls.share_info_secs,
            CacheNamespace::NodesHealth => self.ttls.nodes_health_secs,
        };
        Duration::from_secs(secs)
    }

    fn compose(namespace: CacheNamespace, key: &str) -> String {
        format!("{}:{key}", namespace.as_str())
    }

    /// Number of live (non-expired) entries. Used by tests and by the
    /// storage-stats-style introspection a cache-backed service might want.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(CacheTtls::default())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, namespace: CacheNamespace, key: &str) -> Option<Vec<u8>> {
        let composite = Self::compose(namespace, key);
        let hit = self.entries.get(&composite)?;
        if hit.expires_at <= Instant::now() {
            drop(hit);
            self.entries.remove(&composite);
            return None;
        }
        Some(hit.value.clone())
    }

    async fn set(&self, namespace: CacheNamespace, key: &str, value: Vec<u8>) {
        let composite = Self::compose(namespace, key);
        let expires_at = Instant::now() + self.ttl_for(namespace);
        self.entries.insert(composite, Entry { value, expires_at });
    }

    async fn invalidate(&self, namespace: CacheNamespace, key: &str) {
        self.entries.remove(&Self::compose(namespace, key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips_within_namespace() {
        let cache = InMemoryCache::default();
        cache
            .set(CacheNamespace::FileMetadata, "file-1", b"payload".to_vec())
            .await;

        let hit = cache.get(CacheNamespace::FileMetadata, "file-1").await;
        assert_eq!(hit, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn same_key_in_different_namespaces_does_not_collide() {
        let cache = InMemoryCache::default();
        cache
            .set(CacheNamespace::FileMetadata, "id-1", b"metadata".to_vec())
            .await;
        cache
            .set(CacheNamespace::ShareInfo, "id-1", b"share".to_vec())
            .await;

        assert_eq!(
            cache.get(CacheNamespace::FileMetadata, "id-1").await,
            Some(b"metadata".to_vec())
        );
        assert_eq!(
            cache.get(CacheNamespace::ShareInfo, "id-1").await,
            Some(b"share".to_vec())
        );
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let mut ttls = CacheTtls::default();
        ttls.share_info_secs = 0;
        let cache = InMemoryCache::new(ttls);

        cache
            .set(CacheNamespace::ShareInfo, "token-1", b"v".to_vec())
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(cache.get(CacheNamespace::ShareInfo, "token-1").await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_the_entry() {
        let cache = InMemoryCache::default();
        cache
            .set(CacheNamespace::UserFiles, "owner-1", b"listing".to_vec())
            .await;
        cache.invalidate(CacheNamespace::UserFiles, "owner-1").await;

        assert_eq!(cache.get(CacheNamespace::UserFiles, "owner-1").await, None);
    }
}

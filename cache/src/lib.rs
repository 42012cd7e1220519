mod memory;
mod namespace;

pub use memory::InMemoryCache;
pub use namespace::CacheNamespace;

use async_trait::async_trait;

/// Read-through cache contract (§4.5): string keys, binary values, TTL,
/// atomic set-with-expiry. The core depends on this trait, never on a
/// specific backing engine.
///
/// Cache faults are never surfaced to callers — every method returns a
/// plain `Option`/`()`, not a `Result`. A cache that is down looks
/// identical to an empty cache.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetches a value if present and not expired.
    async fn get(&self, namespace: CacheNamespace, key: &str) -> Option<Vec<u8>>;

    /// Stores a value under the namespace's configured TTL.
    async fn set(&self, namespace: CacheNamespace, key: &str, value: Vec<u8>);

    /// Removes a single key, used by mutation-triggered invalidation.
    async fn invalidate(&self, namespace: CacheNamespace, key: &str);
}

/// Serializes `value` as JSON and stores it, logging rather than failing on
/// a serialization error (cache faults degrade, they never propagate).
pub async fn set_json<C: Cache + ?Sized, T: serde::Serialize + Sync>(
    cache: &C,
    namespace: CacheNamespace,
    key: &str,
    value: &T,
) {
    match serde_json::to_vec(value) {
        Ok(bytes) => cache.set(namespace, key, bytes).await,
        Err(err) => log::warn!("failed to serialize cache entry {namespace:?}/{key}: {err}"),
    }
}

/// Fetches and deserializes a JSON value, treating any decode failure as a
/// plain miss.
pub async fn get_json<C: Cache + ?Sized, T: serde::de::DeserializeOwned>(
    cache: &C,
    namespace: CacheNamespace,
    key: &str,
) -> Option<T> {
    let bytes = cache.get(namespace, key).await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("failed to deserialize cache entry {namespace:?}/{key}: {err}");
            None
        }
    }
}

//! Verification key material and the memoizing key cache
//!
//! Keys are resolved once per key id and trusted for the lifetime of the
//! [`KeyCache`]. There is no TTL and no refresh: a key id always names the
//! same key material, so a cached entry never goes stale.
//!
//! Concurrent misses for the same key id share a single in-flight fetch.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::authority::KeySource;
use crate::error::{FeatherError, Result};

/// Encoding of a verification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// PEM-encoded RSA public key.
    Pem,
    /// JSON Web Key.
    Jwk,
}

/// Raw key data, exactly as the API returned it.
///
/// The data is not parsed until a signature is verified, so a malformed key
/// surfaces as an invalid token rather than a fetch failure.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyData {
    /// PEM text.
    Pem(String),
    /// JWK object.
    Jwk(serde_json::Value),
}

/// A verification key and the id it was published under.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMaterial {
    key_id: String,
    data: KeyData,
}

impl KeyMaterial {
    /// PEM-encoded key.
    pub fn pem(key_id: impl Into<String>, pem: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            data: KeyData::Pem(pem.into()),
        }
    }

    /// JWK-encoded key.
    pub fn jwk(key_id: impl Into<String>, jwk: serde_json::Value) -> Self {
        Self {
            key_id: key_id.into(),
            data: KeyData::Jwk(jwk),
        }
    }

    /// Key id.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Encoding of the key data.
    pub fn format(&self) -> KeyFormat {
        match self.data {
            KeyData::Pem(_) => KeyFormat::Pem,
            KeyData::Jwk(_) => KeyFormat::Jwk,
        }
    }

    /// Raw key data.
    pub fn data(&self) -> &KeyData {
        &self.data
    }
}

/// Storage backing a [`KeyCache`].
pub trait KeyStore: Send + Sync {
    /// Look up a previously stored key.
    fn get(&self, key_id: &str) -> Option<Arc<KeyMaterial>>;

    /// Store `key` under `key_id`. Overwriting an existing entry is allowed.
    fn insert(&self, key_id: &str, key: Arc<KeyMaterial>);

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process key store. Entries are never evicted.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: DashMap<String, Arc<KeyMaterial>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, key_id: &str) -> Option<Arc<KeyMaterial>> {
        self.keys.get(key_id).map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, key_id: &str, key: Arc<KeyMaterial>) {
        self.keys.insert(key_id.to_string(), key);
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Resolves key ids to key material, fetching on first use.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    store: Arc<dyn KeyStore>,
    in_flight: DashMap<String, Arc<OnceCell<Arc<KeyMaterial>>>>,
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("cached_keys", &self.store.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl KeyCache {
    /// Cache backed by a fresh [`MemoryKeyStore`].
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self::with_store(source, Arc::new(MemoryKeyStore::new()))
    }

    /// Cache backed by `store`, e.g. one shared between several verifiers.
    pub fn with_store(source: Arc<dyn KeySource>, store: Arc<dyn KeyStore>) -> Self {
        Self {
            source,
            store,
            in_flight: DashMap::new(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Resolve `key_id`, fetching it from the source on a miss.
    ///
    /// # Errors
    ///
    /// - [`FeatherError::ParameterMissing`] if `key_id` is empty
    /// - any error from the [`KeySource`], unchanged; failures are not cached
    pub async fn resolve(&self, key_id: &str) -> Result<Arc<KeyMaterial>> {
        if key_id.is_empty() {
            return Err(FeatherError::ParameterMissing(
                "required param not provided: 'key_id'".to_string(),
            ));
        }

        if let Some(key) = self.store.get(key_id) {
            debug!(key_id, "Key cache hit");
            return Ok(key);
        }

        let cell = Arc::clone(self.in_flight.entry(key_id.to_string()).or_default().value());
        let fetched = cell
            .get_or_try_init(|| async {
                // Another resolver may have finished between the lookup above and here.
                if let Some(key) = self.store.get(key_id) {
                    return Ok::<_, FeatherError>(key);
                }
                info!(key_id, "Fetching verification key");
                let key = self.source.fetch_key(key_id).await?;
                let key = Arc::new(key);
                self.store.insert(key_id, Arc::clone(&key));
                Ok(key)
            })
            .await
            .map(Arc::clone);

        self.in_flight.remove(key_id);
        fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl KeySource for CountingSource {
        async fn fetch_key(&self, key_id: &str) -> Result<KeyMaterial> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(FeatherError::ApiConnection("connection refused".to_string()));
            }
            Ok(KeyMaterial::pem(key_id, "-----BEGIN PUBLIC KEY-----"))
        }
    }

    #[tokio::test]
    async fn test_resolve_memoizes_per_key_id() {
        let source = Arc::new(CountingSource::default());
        let cache = KeyCache::new(source.clone());

        let first = cache.resolve("KEY_1").await.unwrap();
        let second = cache.resolve("KEY_1").await.unwrap();
        cache.resolve("KEY_2").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(cache.store().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_key_id_without_fetching() {
        let source = Arc::new(CountingSource::default());
        let cache = KeyCache::new(source.clone());

        let err = cache.resolve("").await.unwrap_err();
        assert!(matches!(err, FeatherError::ParameterMissing(_)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_and_is_not_cached() {
        let source = Arc::new(CountingSource {
            fail: true,
            ..Default::default()
        });
        let cache = KeyCache::new(source.clone());

        for _ in 0..2 {
            let err = cache.resolve("KEY_1").await.unwrap_err();
            assert_eq!(
                err,
                FeatherError::ApiConnection("connection refused".to_string())
            );
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(cache.store().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_fetch() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(KeyCache::new(source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("KEY_1").await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_injected_store_is_consulted_first() {
        let store = Arc::new(MemoryKeyStore::new());
        store.insert("KEY_1", Arc::new(KeyMaterial::pem("KEY_1", "seeded")));
        let source = Arc::new(CountingSource::default());
        let cache = KeyCache::with_store(source.clone(), store);

        let key = cache.resolve("KEY_1").await.unwrap();
        assert_eq!(key.data(), &KeyData::Pem("seeded".to_string()));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_key_format() {
        assert_eq!(KeyMaterial::pem("a", "pem").format(), KeyFormat::Pem);
        assert_eq!(
            KeyMaterial::jwk("a", serde_json::json!({"kty": "RSA"})).format(),
            KeyFormat::Jwk
        );
    }
}

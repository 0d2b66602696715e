//! Resolved signing keys with TTL caching
//!
//! - **TTL-based caching**: default 10 minutes
//! - **Single-flight**: concurrent misses trigger one upstream fetch
//! - **Rate-limited refresh**: forced refreshes are spaced by
//!   `min_refresh_interval`, protecting the provider when tokens fail en masse
//! - **Fail-open**: a failed fetch keeps the previous keys, or yields none
//!
//! A failed fetch is not retried before `min_refresh_interval` has passed;
//! until then the stale (or empty) set is served.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{KeySource, VerificationKey, resolve_all};
use crate::config::AadConfig;
use crate::error::Result;

/// Cache entry with metadata
#[derive(Debug, Clone)]
struct CachedKeys {
    keys: Arc<Vec<VerificationKey>>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedKeys {
    fn is_valid(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Key cache for one [`KeySource`]
///
/// Share it between requests behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// # use azure_ad_auth::{AadConfig, keys::KeyCache};
/// # async fn demo() -> azure_ad_auth::Result<()> {
/// let config = AadConfig::new("contoso.onmicrosoft.com", "my-client-id");
/// let cache = KeyCache::from_config(&config)?;
///
/// // Fetched on first use, then served from memory for the TTL
/// let keys = cache.get().await;
/// println!("{} signing keys", keys.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct KeyCache {
    source: KeySource,
    cache: RwLock<Option<CachedKeys>>,
    /// Serializes upstream fetches
    fetch_lock: Mutex<()>,
    last_refresh: RwLock<Option<Instant>>,
    ttl: Duration,
    min_refresh_interval: Duration,
}

impl KeyCache {
    /// Wrap a key source
    pub fn new(source: KeySource, ttl: Duration, min_refresh_interval: Duration) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(()),
            last_refresh: RwLock::new(None),
            ttl,
            min_refresh_interval,
        }
    }

    /// Build the source and cache described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the key source cannot be built.
    pub fn from_config(config: &AadConfig) -> Result<Self> {
        Ok(Self::new(
            KeySource::from_config(config)?,
            config.key_cache_ttl(),
            config.min_refresh_interval(),
        ))
    }

    /// The underlying key source
    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// Cache time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current keys, fetching when the cache is empty or expired
    pub async fn get(&self) -> Arc<Vec<VerificationKey>> {
        if let Some(keys) = self.fresh().await {
            debug!(endpoint = %self.source.endpoint(), "Using cached signing keys");
            return keys;
        }

        let _guard = self.fetch_lock.lock().await;

        // Another task may have loaded the keys while we waited
        if let Some(keys) = self.fresh().await {
            return keys;
        }

        self.load().await
    }

    /// Fetch again regardless of the TTL, subject to rate limiting
    ///
    /// Used when a token fails signature verification: the provider may have
    /// rotated its keys. When called within `min_refresh_interval` of the
    /// previous fetch, the current keys are returned unchanged.
    pub async fn refresh(&self) -> Arc<Vec<VerificationKey>> {
        let _guard = self.fetch_lock.lock().await;

        {
            let last_refresh = self.last_refresh.read().await;
            if let Some(last) = *last_refresh
                && last.elapsed() < self.min_refresh_interval
            {
                debug!(
                    endpoint = %self.source.endpoint(),
                    since_last_ms = last.elapsed().as_millis(),
                    "Signing key refresh rate limited, using cache"
                );
                return self.current().await;
            }
        }

        self.load().await
    }

    /// Drop cached keys
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
        debug!(endpoint = %self.source.endpoint(), "Signing key cache cleared");
    }

    async fn fresh(&self) -> Option<Arc<Vec<VerificationKey>>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.is_valid())
            .map(|cached| Arc::clone(&cached.keys))
    }

    /// Cached keys even when expired
    async fn current(&self) -> Arc<Vec<VerificationKey>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .map(|cached| Arc::clone(&cached.keys))
            .unwrap_or_default()
    }

    /// Fetch, resolve and store. Caller holds `fetch_lock`.
    async fn load(&self) -> Arc<Vec<VerificationKey>> {
        {
            let mut last_refresh = self.last_refresh.write().await;
            *last_refresh = Some(Instant::now());
        }

        let keys = match self.source.try_fetch().await {
            Ok(raw) => resolve_all(&raw),
            Err(e) => {
                warn!(
                    endpoint = %self.source.endpoint(),
                    error = %e,
                    "Signing key fetch failed"
                );
                return self.keep_previous().await;
            }
        };

        if keys.is_empty() {
            warn!(
                endpoint = %self.source.endpoint(),
                "Provider published no usable signing keys"
            );
            return self.keep_previous().await;
        }

        info!(
            endpoint = %self.source.endpoint(),
            key_count = keys.len(),
            ttl_secs = self.ttl.as_secs(),
            "Cached signing keys"
        );

        let keys = Arc::new(keys);
        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys: Arc::clone(&keys),
            cached_at: Instant::now(),
            ttl: self.ttl,
        });
        keys
    }

    /// Serve the previous keys (or none) until the next retry is allowed
    async fn keep_previous(&self) -> Arc<Vec<VerificationKey>> {
        let mut cache = self.cache.write().await;
        let keys = cache
            .as_ref()
            .map(|cached| Arc::clone(&cached.keys))
            .unwrap_or_default();

        if !keys.is_empty() {
            warn!(
                endpoint = %self.source.endpoint(),
                key_count = keys.len(),
                "Continuing with stale signing keys"
            );
        }

        *cache = Some(CachedKeys {
            keys: Arc::clone(&keys),
            cached_at: Instant::now(),
            ttl: self.min_refresh_interval.min(self.ttl),
        });
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeySourceKind;

    fn unreachable_source() -> KeySource {
        // Nothing listens on port 9 locally; connect fails immediately
        KeySource::with_endpoint(
            KeySourceKind::Jwks,
            "http://127.0.0.1:9/.well-known/openid-configuration",
            Duration::from_secs(2),
            1024,
        )
        .unwrap()
    }

    #[test]
    fn test_cached_keys_validity() {
        let cached = CachedKeys {
            keys: Arc::default(),
            cached_at: Instant::now(),
            ttl: Duration::from_secs(600),
        };
        assert!(cached.is_valid());

        let expired = CachedKeys {
            ttl: Duration::ZERO,
            ..cached
        };
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_from_config_uses_configured_ttl() {
        let mut config = AadConfig::new("contoso.onmicrosoft.com", "app");
        config.key_cache_ttl_secs = 300;
        let cache = KeyCache::from_config(&config).unwrap();
        assert_eq!(cache.ttl(), Duration::from_secs(300));
        assert_eq!(cache.source().kind(), KeySourceKind::Jwks);
    }

    #[tokio::test]
    async fn test_unreachable_source_fails_open() {
        let cache = KeyCache::new(
            unreachable_source(),
            Duration::from_secs(600),
            Duration::from_secs(5),
        );
        assert!(cache.get().await.is_empty());
        // Rate limited: no second connection attempt, still empty
        assert!(cache.refresh().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_drops_entry() {
        let cache = KeyCache::new(unreachable_source(), Duration::from_secs(600), Duration::ZERO);
        let _ = cache.get().await;
        assert!(cache.cache.read().await.is_some());
        cache.clear().await;
        assert!(cache.cache.read().await.is_none());
    }
}

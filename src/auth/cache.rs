//! Two-legged token cache.
//!
//! Entries are keyed by scope set. Each entry holds a shared token future so that
//! concurrent callers asking for the same scopes wait on one outbound request. While
//! that request is in flight the entry's expiry is unset, which counts as "never
//! expires"; the fetch itself records the real expiry once the token endpoint answers.

use crate::errors::ForgeResult;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared access-token future.
pub type TokenFuture = Shared<BoxFuture<'static, ForgeResult<String>>>;

/// Expiry of a cache entry. `None` while the token fetch is in flight.
#[derive(Debug, Clone, Default)]
pub struct Expiry(Arc<Mutex<Option<DateTime<Utc>>>>);

impl Expiry {
    /// Records the absolute expiry of a resolved token.
    pub fn resolve(&self, at: DateTime<Utc>) {
        *self.0.lock() = Some(at);
    }

    /// Returns the expiry, or `None` while pending.
    pub fn get(&self) -> Option<DateTime<Utc>> {
        *self.0.lock()
    }

    /// True if the entry may still be served at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.get() {
            Some(at) => at > now,
            None => true,
        }
    }

    fn same_slot(&self, other: &Expiry) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Handle to a cache entry returned by [`TokenCache::lease`].
pub struct Lease {
    /// Token future to await.
    pub token: TokenFuture,
    /// Expiry of the entry.
    pub expiry: Expiry,
    /// True if this lease started a new fetch.
    pub fetched: bool,
}

struct CacheEntry {
    token: TokenFuture,
    expiry: Expiry,
}

/// Scope-set keyed token cache.
#[derive(Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the cache key for a scope set.
    ///
    /// Scopes are joined in the order given, so `["a", "b"]` and `["b", "a"]` are
    /// different entries.
    pub fn key(scopes: &[&str]) -> String {
        format!("two-legged/{}", scopes.join("/"))
    }

    /// Returns the live entry for `key`, or installs a new one built by `fetch`.
    ///
    /// The new entry is inserted before anyone awaits it. `fetch` receives the entry's
    /// expiry and must resolve it when the token arrives.
    pub fn lease<F>(&self, key: &str, now: DateTime<Utc>, force: bool, fetch: F) -> Lease
    where
        F: FnOnce(Expiry) -> BoxFuture<'static, ForgeResult<String>>,
    {
        let mut entries = self.entries.lock();

        if !force {
            if let Some(entry) = entries.get(key) {
                if entry.expiry.is_live(now) {
                    return Lease {
                        token: entry.token.clone(),
                        expiry: entry.expiry.clone(),
                        fetched: false,
                    };
                }
            }
        }

        let expiry = Expiry::default();
        let token = fetch(expiry.clone()).shared();
        entries.insert(
            key.to_string(),
            CacheEntry {
                token: token.clone(),
                expiry: expiry.clone(),
            },
        );

        Lease {
            token,
            expiry,
            fetched: true,
        }
    }

    /// Removes the entry for `key` if it is still the one identified by `expiry`.
    pub fn evict(&self, key: &str, expiry: &Expiry) {
        let mut entries = self.entries.lock();
        if entries
            .get(key)
            .map_or(false, |entry| entry.expiry.same_slot(expiry))
        {
            entries.remove(key);
        }
    }

    /// Number of cached scope sets.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetch(
        counter: Arc<AtomicUsize>,
        token: &'static str,
        at: DateTime<Utc>,
    ) -> impl FnOnce(Expiry) -> BoxFuture<'static, ForgeResult<String>> {
        move |expiry| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                expiry.resolve(at);
                Ok(token.to_string())
            }
            .boxed()
        }
    }

    #[test]
    fn test_key_preserves_order() {
        assert_eq!(TokenCache::key(&["a", "b"]), "two-legged/a/b");
        assert_ne!(TokenCache::key(&["a", "b"]), TokenCache::key(&["b", "a"]));
    }

    #[test]
    fn test_pending_expiry_is_live() {
        let expiry = Expiry::default();
        assert!(expiry.is_live(Utc::now() + Duration::days(365)));

        let now = Utc::now();
        expiry.resolve(now);
        assert!(!expiry.is_live(now));
        assert!(expiry.is_live(now - Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_lease_reuses_live_entry() {
        let cache = TokenCache::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();
        let later = now + Duration::hours(1);

        let first = cache.lease("k", now, false, counting_fetch(counter.clone(), "T1", later));
        assert!(first.fetched);
        assert_eq!(first.token.await.unwrap(), "T1");

        let second = cache.lease("k", now, false, counting_fetch(counter.clone(), "T2", later));
        assert!(!second.fetched);
        assert_eq!(second.token.await.unwrap(), "T1");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lease_replaces_expired_or_forced_entry() {
        let cache = TokenCache::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();

        let first = cache.lease("k", now, false, counting_fetch(counter.clone(), "T1", now + Duration::seconds(10)));
        first.token.await.unwrap();

        let expired = cache.lease(
            "k",
            now + Duration::seconds(10),
            false,
            counting_fetch(counter.clone(), "T2", now + Duration::hours(1)),
        );
        assert!(expired.fetched);
        assert_eq!(expired.token.await.unwrap(), "T2");

        let forced = cache.lease("k", now, true, counting_fetch(counter.clone(), "T3", now + Duration::hours(1)));
        assert!(forced.fetched);
        assert_eq!(forced.token.await.unwrap(), "T3");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_only_matching_entry() {
        let cache = TokenCache::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();

        let stale = cache.lease("k", now, false, counting_fetch(counter.clone(), "T1", now + Duration::hours(1)));
        let fresh = cache.lease("k", now, true, counting_fetch(counter.clone(), "T2", now + Duration::hours(1)));

        cache.evict("k", &stale.expiry);
        assert_eq!(cache.len(), 1);

        cache.evict("k", &fresh.expiry);
        assert!(cache.is_empty());
    }
}

//! Tiered in-memory cache with per-entry time-to-live
//!
//! The cache itself is category-agnostic: callers pass a [`Ttl`] on every
//! write and expiry is checked lazily at read time. [`TtlPolicy`] maps data
//! categories (artist aggregates, entity audits, AI analysis...) to the TTL
//! each one should be written with.
//!
//! Entries are replaced wholesale on every write; a failed fetch in
//! [`TtlCache::get_or_fetch`] never touches the stored entry.

use labeldeck_common::config::TtlPolicyConfig;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Lifetime of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Expires once this much time has elapsed since the write
    Expires(Duration),
    /// Only explicit invalidation removes the entry
    Indefinite,
}

impl Ttl {
    /// `0` seconds means indefinite, not "expire immediately"
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Ttl::Indefinite
        } else {
            Ttl::Expires(Duration::from_secs(secs))
        }
    }
}

/// Data categories with distinct freshness requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    /// Merged artist snapshot built from external sources
    Aggregate,
    /// Cross-platform entity audit report
    EntityAudit,
    /// AI-generated analysis text
    AiAnalysis,
    /// Wikipedia bio enrichment
    WikiBio,
}

/// Category → TTL table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub aggregate: Ttl,
    pub entity_audit: Ttl,
    pub ai_analysis: Ttl,
    pub wiki_bio: Ttl,
}

impl TtlPolicy {
    pub fn ttl(&self, category: CacheCategory) -> Ttl {
        match category {
            CacheCategory::Aggregate => self.aggregate,
            CacheCategory::EntityAudit => self.entity_audit,
            CacheCategory::AiAnalysis => self.ai_analysis,
            CacheCategory::WikiBio => self.wiki_bio,
        }
    }
}

impl From<&TtlPolicyConfig> for TtlPolicy {
    fn from(config: &TtlPolicyConfig) -> Self {
        Self {
            aggregate: Ttl::from_secs(config.aggregate_secs),
            entity_audit: Ttl::from_secs(config.entity_audit_secs),
            ai_analysis: Ttl::from_secs(config.ai_analysis_secs),
            wiki_bio: Ttl::from_secs(config.wiki_bio_secs),
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::from(&TtlPolicyConfig::default())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Ttl,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        match self.ttl {
            Ttl::Indefinite => true,
            Ttl::Expires(ttl) => now.saturating_duration_since(self.created_at) < ttl,
        }
    }
}

/// Key → value cache with lazy expiry
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key` unless it was never set or has expired
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let hit = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());

        debug!(key = key, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Store `value` under `key`, replacing any previous entry
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Ttl) {
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Cached value for `key`, or the result of `fetch` written through.
    ///
    /// `fetch` runs outside any lock. Its error is returned to the caller
    /// and nothing is stored.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Ttl,
        force_refresh: bool,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !force_refresh {
            if let Some(value) = self.get(key).await {
                return Ok(value);
            }
        }

        let value = fetch().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Remove `key`; returns whether an entry (live or stale) was present
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every expired entry; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including stale ones not yet purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Periodically purge expired entries from `cache`.
///
/// Housekeeping only: reads never depend on the sweep having run.
pub fn spawn_sweeper<V>(cache: Arc<TtlCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired().await;
            if removed > 0 {
                debug!(removed = removed, "Cache sweep removed expired entries");
            }
        }
    })
}

//! Artist aggregate orchestrator
//!
//! Builds the merged view of one artist: baseline record from the store,
//! enriched by every configured external source.
//!
//! # Flow
//! 1. Cache lookup under `aggregate:{id}` (skipped on force refresh)
//! 2. Baseline lookup; a missing baseline is the only fatal outcome
//! 3. Mock mode returns the baseline as-is, uncached
//! 4. All configured sources run concurrently, each throttled then bounded by
//!    the fetch timeout; failures are logged and dropped
//! 5. Successful patches fold in registration order, restricted to each
//!    source's domains, then overlay the baseline
//! 6. The result is stamped with its contributing sources and cached

use crate::access::{self, Principal};
use crate::cache::{Ttl, TtlCache};
use crate::error::GateError;
use crate::rate_limit::RateLimiter;
use crate::record::{ArtistRecord, SourcePatch};
use crate::sources::{Fetcher, IntegrationStatus, SourceError};
use crate::store::ArtistStore;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache key for an artist aggregate
pub fn aggregate_key(artist_id: &str) -> String {
    format!("aggregate:{}", artist_id)
}

/// Orchestrator settings
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    /// Call external sources; otherwise serve the baseline
    pub use_real_data: bool,
    pub fetch_timeout: Duration,
    pub aggregate_ttl: Ttl,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            use_real_data: false,
            fetch_timeout: Duration::from_secs(5),
            aggregate_ttl: Ttl::from_secs(86_400),
        }
    }
}

/// One page of visible aggregates
#[derive(Debug, Clone, Serialize)]
pub struct AggregatePage {
    /// Visible artists matching the search, before pagination
    pub total: usize,
    pub offset: usize,
    pub items: Vec<ArtistRecord>,
}

/// Outcome of one source for one artist
struct SourceOutcome {
    name: String,
    result: Result<SourcePatch, SourceError>,
}

/// Fan-out/merge over the configured sources
pub struct Aggregator {
    store: Arc<dyn ArtistStore>,
    fetchers: Vec<Arc<dyn Fetcher>>,
    limiter: Arc<RateLimiter>,
    cache: Arc<TtlCache<ArtistRecord>>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn ArtistStore>,
        fetchers: Vec<Arc<dyn Fetcher>>,
        limiter: Arc<RateLimiter>,
        cache: Arc<TtlCache<ArtistRecord>>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            store,
            fetchers,
            limiter,
            cache,
            settings,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn use_real_data(&self) -> bool {
        self.settings.use_real_data
    }

    /// Merged record for `artist_id`
    pub async fn get_aggregate(
        &self,
        artist_id: &str,
        force_refresh: bool,
    ) -> Result<ArtistRecord, GateError> {
        if !self.settings.use_real_data {
            return self.baseline(artist_id).await;
        }

        self.cache
            .get_or_fetch(
                &aggregate_key(artist_id),
                self.settings.aggregate_ttl,
                force_refresh,
                || async {
                    let baseline = self.baseline(artist_id).await?;
                    Ok::<_, GateError>(self.enrich(baseline).await)
                },
            )
            .await
    }

    /// Access-checked [`Self::get_aggregate`].
    ///
    /// Authorization runs before the baseline lookup, so a denied caller
    /// cannot tell whether `artist_id` exists.
    pub async fn get_for(
        &self,
        principal: &Principal,
        artist_id: &str,
        force_refresh: bool,
    ) -> Result<ArtistRecord, GateError> {
        access::authorize(principal, artist_id)?;
        self.get_aggregate(artist_id, force_refresh).await
    }

    /// Aggregates for every roster entry `principal` may see.
    ///
    /// `search` matches a case-insensitive substring of the artist name.
    pub async fn list_aggregates(
        &self,
        principal: &Principal,
        search: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> AggregatePage {
        let roster = self.store.list_all().await;
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let visible: Vec<&ArtistRecord> = access::filter_collection(principal, &roster)
            .into_iter()
            .filter(|record| match &needle {
                Some(needle) => record.name.to_lowercase().contains(needle),
                None => true,
            })
            .collect();
        let total = visible.len();

        let page = visible
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX));

        let items = join_all(page.map(|record| self.get_aggregate(&record.id, false)))
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    // Removed from the roster between listing and lookup
                    debug!(error = %e, "Skipping roster entry");
                    None
                }
            })
            .collect();

        AggregatePage {
            total,
            offset,
            items,
        }
    }

    /// Drop the cached aggregate for `artist_id`
    pub async fn invalidate(&self, artist_id: &str) -> bool {
        self.cache.invalidate(&aggregate_key(artist_id)).await
    }

    pub fn integration_status(&self) -> IntegrationStatus {
        IntegrationStatus::from_fetchers(&self.fetchers).with_rate_limits(&self.limiter)
    }

    async fn baseline(&self, artist_id: &str) -> Result<ArtistRecord, GateError> {
        self.store
            .get_by_id(artist_id)
            .await
            .ok_or_else(|| GateError::NotFound(format!("Artist {}", artist_id)))
    }

    async fn enrich(&self, baseline: ArtistRecord) -> ArtistRecord {
        let artist_id = baseline.id.as_str();

        let configured: Vec<&Arc<dyn Fetcher>> = self
            .fetchers
            .iter()
            .filter(|fetcher| fetcher.is_configured())
            .collect();

        let outcomes = join_all(
            configured
                .iter()
                .map(|fetcher| self.run_source(fetcher, artist_id)),
        )
        .await;

        let mut accumulated = SourcePatch::default();
        let mut data_sources = Vec::new();

        for (fetcher, outcome) in configured.iter().zip(outcomes) {
            match outcome.result {
                Ok(mut patch) => {
                    let dropped = patch.restrict_to(fetcher.domains());
                    if !dropped.is_empty() {
                        warn!(
                            source = %outcome.name,
                            artist_id = artist_id,
                            dropped = ?dropped,
                            "Source returned fields outside its domains"
                        );
                    }
                    accumulated.absorb(&patch);
                    data_sources.push(outcome.name);
                }
                Err(e) => {
                    warn!(
                        source = %outcome.name,
                        artist_id = artist_id,
                        error = %e,
                        "Source fetch failed, skipping"
                    );
                }
            }
        }

        let mut merged = accumulated.apply_to(&baseline);
        merged.meta.data_sources = data_sources;
        merged.meta.last_updated = Some(Utc::now());

        info!(
            artist_id = artist_id,
            sources = ?merged.meta.data_sources,
            attempted = configured.len(),
            "Assembled artist aggregate"
        );

        merged
    }

    async fn run_source(&self, fetcher: &Arc<dyn Fetcher>, artist_id: &str) -> SourceOutcome {
        let name = fetcher.name().to_string();

        let result = match self.limiter.throttle(&name).await {
            Ok(waited) => {
                if !waited.is_zero() {
                    debug!(source = %name, waited_ms = waited.as_millis() as u64, "Throttled");
                }
                match tokio::time::timeout(self.settings.fetch_timeout, fetcher.fetch(artist_id))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(
                        self.settings.fetch_timeout.as_millis() as u64,
                    )),
                }
            }
            Err(e) => Err(SourceError::Throttle(e.to_string())),
        };

        SourceOutcome { name, result }
    }
}

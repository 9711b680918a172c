//! External data sources
//!
//! Every source implements [`Fetcher`]; the orchestrator treats them
//! uniformly. A source is registered with the record [`Domain`]s it owns and
//! anything it returns outside those domains is discarded at merge time.
//!
//! # Sources
//! - **http_source** - config-driven JSON source over reqwest

pub mod http_source;

pub use http_source::HttpSource;

use crate::rate_limit::RateLimiter;
use crate::record::{Domain, SourcePatch};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Source fetch errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),

    #[error("Rate limiter rejected source: {0}")]
    Throttle(String),
}

/// One external data source
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Source name; doubles as the rate limiter service id
    fn name(&self) -> &str;

    /// Record domains this source may write
    fn domains(&self) -> &[Domain];

    /// Whether credentials/handles are present; unconfigured sources are skipped
    fn is_configured(&self) -> bool;

    /// Partial record for `artist_id`
    async fn fetch(&self, artist_id: &str) -> Result<SourcePatch, SourceError>;
}

/// Which sources can currently be called
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationStatus {
    pub sources: BTreeMap<String, bool>,
    pub any_configured: bool,
    /// Services with a limiter bucket, sorted
    pub rate_limited: Vec<String>,
}

impl IntegrationStatus {
    pub fn from_fetchers(fetchers: &[Arc<dyn Fetcher>]) -> Self {
        let sources: BTreeMap<String, bool> = fetchers
            .iter()
            .map(|fetcher| (fetcher.name().to_string(), fetcher.is_configured()))
            .collect();
        let any_configured = sources.values().any(|configured| *configured);

        Self {
            sources,
            any_configured,
            rate_limited: Vec::new(),
        }
    }

    pub fn with_rate_limits(mut self, limiter: &RateLimiter) -> Self {
        self.rate_limited = limiter.services().into_iter().map(str::to_string).collect();
        self
    }
}

// ============================================================================
// Mock Fetcher for Testing
// ============================================================================

//! Per-period strategic insight text
//!
//! Text comes from an [`Analyst`] and is cached under
//! `insight:{id}:{period}` with the AI-analysis TTL (indefinite by default),
//! so each artist's monthly insight is generated once. A failing analyst
//! yields [`FALLBACK_INSIGHT`], which is never cached. Periods are limited
//! to [`EARLIEST_YEAR`] through the current month so the cache stays bounded.

use crate::access::{self, Principal};
use crate::cache::{Ttl, TtlCache};
use crate::error::GateError;
use crate::orchestrator::Aggregator;
use crate::record::ArtistRecord;
use crate::sources::SourceError;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use labeldeck_common::time;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

pub const FALLBACK_INSIGHT: &str = "AI insights unavailable at this time.";

/// First year an insight can be requested for
pub const EARLIEST_YEAR: i32 = 2000;

pub fn insight_key(artist_id: &str, period: &str) -> String {
    format!("insight:{}:{}", artist_id, period)
}

/// Text generator for artist insights
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, artist: &ArtistRecord, period: &str) -> Result<String, SourceError>;
}

/// Rule-based analyst working from the aggregate's own numbers
#[derive(Debug, Default)]
pub struct TemplateAnalyst;

#[async_trait]
impl Analyst for TemplateAnalyst {
    async fn analyze(&self, artist: &ArtistRecord, period: &str) -> Result<String, SourceError> {
        let trend = if artist.growth_rate > 0.0 {
            "positive"
        } else if artist.growth_rate < 0.0 {
            "declining"
        } else {
            "stable"
        };

        let revenue = &artist.revenue;
        let lines = [
            ("streaming", revenue.streaming),
            ("touring", revenue.touring),
            ("merch", revenue.merch),
            ("sync", revenue.sync),
            ("branding", revenue.branding),
            ("youtube", revenue.youtube),
        ];
        let top = lines
            .iter()
            .filter_map(|(name, amount)| amount.map(|amount| (*name, amount)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or("streaming", |(name, _)| name);

        Ok(format!(
            "{} ({}): {} monthly listeners with a {} trend ({:.1}%). \
             Focus investment on {}, the largest revenue line.",
            artist.name, period, artist.monthly_listeners, trend, artist.growth_rate, top
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub artist_id: String,
    pub period: String,
    pub text: String,
    /// `false` when the fallback text was served
    pub generated: bool,
}

pub struct InsightService {
    aggregator: Arc<Aggregator>,
    analyst: Arc<dyn Analyst>,
    cache: Arc<TtlCache<String>>,
    ttl: Ttl,
}

impl InsightService {
    pub fn new(aggregator: Arc<Aggregator>, analyst: Arc<dyn Analyst>, ttl: Ttl) -> Self {
        Self {
            aggregator,
            analyst,
            cache: Arc::new(TtlCache::new()),
            ttl,
        }
    }

    /// Insight cache, for the expiry sweeper
    pub fn cache(&self) -> Arc<TtlCache<String>> {
        Arc::clone(&self.cache)
    }

    /// `"current"` or a `YYYY-MM` month between [`EARLIEST_YEAR`] and now
    pub fn normalize_period(period: &str) -> Result<String, GateError> {
        let period = period.trim();
        let now = time::now();
        if period.eq_ignore_ascii_case("current") {
            return Ok(time::month_key(now));
        }

        let date = NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d")
            .map_err(|_| GateError::InvalidInput(format!("Invalid period: {}", period)))?;

        if date.year() < EARLIEST_YEAR || (date.year(), date.month()) > (now.year(), now.month()) {
            return Err(GateError::InvalidInput(format!(
                "Period out of range: {}",
                period
            )));
        }
        Ok(date.format("%Y-%m").to_string())
    }

    pub async fn insight_for(
        &self,
        principal: &Principal,
        artist_id: &str,
        period: &str,
        force_refresh: bool,
    ) -> Result<Insight, GateError> {
        access::authorize(principal, artist_id)?;
        self.insight(artist_id, period, force_refresh).await
    }

    pub async fn insight(
        &self,
        artist_id: &str,
        period: &str,
        force_refresh: bool,
    ) -> Result<Insight, GateError> {
        let period = Self::normalize_period(period)?;
        let key = insight_key(artist_id, &period);

        if !force_refresh {
            if let Some(text) = self.cache.get(&key).await {
                return Ok(Insight {
                    artist_id: artist_id.to_string(),
                    period,
                    text,
                    generated: true,
                });
            }
        }

        let artist = self.aggregator.get_aggregate(artist_id, false).await?;

        let (text, generated) = match self.analyst.analyze(&artist, &period).await {
            Ok(text) => {
                self.cache.set(key, text.clone(), self.ttl).await;
                (text, true)
            }
            Err(e) => {
                warn!(artist_id = artist_id, period = %period, error = %e, "Analyst failed");
                (FALLBACK_INSIGHT.to_string(), false)
            }
        };

        Ok(Insight {
            artist_id: artist_id.to_string(),
            period,
            text,
            generated,
        })
    }
}

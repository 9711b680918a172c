//! Artist record model and per-domain merge
//!
//! Baseline records come from the roster store. External sources return a
//! [`SourcePatch`]; a source may only write the [`Domain`]s it is registered
//! for, and within a domain only the fields it actually sets. Fields a source
//! leaves `None` never clobber what an earlier source or the baseline provided.

use crate::access::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Record areas an external source can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Listener/stream headline numbers
    Streaming,
    /// Follower counts and engagement
    Social,
    Revenue,
    Touring,
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" => Ok(Domain::Streaming),
            "social" => Ok(Domain::Social),
            "revenue" => Ok(Domain::Revenue),
            "touring" => Ok(Domain::Touring),
            other => Err(format!("Unknown record domain: {}", other)),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Streaming => "streaming",
            Domain::Social => "social",
            Domain::Revenue => "revenue",
            Domain::Touring => "touring",
        };
        f.write_str(name)
    }
}

fn overlay<T: Clone>(target: &mut Option<T>, patch: &Option<T>) {
    if patch.is_some() {
        target.clone_from(patch);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_listeners: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_streams: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
}

impl StreamingPatch {
    fn overlay(&mut self, patch: &Self) {
        overlay(&mut self.monthly_listeners, &patch.monthly_listeners);
        overlay(&mut self.total_streams, &patch.total_streams);
        overlay(&mut self.growth_rate, &patch.growth_rate);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_subscribers: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<u64>,
    /// Percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_rate: Option<f64>,
}

impl SocialMetrics {
    fn overlay(&mut self, patch: &Self) {
        overlay(&mut self.spotify, &patch.spotify);
        overlay(&mut self.instagram, &patch.instagram);
        overlay(&mut self.youtube_subscribers, &patch.youtube_subscribers);
        overlay(&mut self.youtube_views, &patch.youtube_views);
        overlay(&mut self.twitter, &patch.twitter);
        overlay(&mut self.tiktok, &patch.tiktok);
        overlay(&mut self.engagement_rate, &patch.engagement_rate);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevenueBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touring: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<f64>,
    /// Baseline-only detail (e.g. regional breakdowns); sources cannot write it
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RevenueBreakdown {
    fn overlay(&mut self, patch: &Self) {
        overlay(&mut self.streaming, &patch.streaming);
        overlay(&mut self.touring, &patch.touring);
        overlay(&mut self.merch, &patch.merch);
        overlay(&mut self.sync, &patch.sync);
        overlay(&mut self.branding, &patch.branding);
        overlay(&mut self.youtube, &patch.youtube);
    }

    /// Sum of all known revenue lines
    pub fn total(&self) -> f64 {
        [
            self.streaming,
            self.touring,
            self.merch,
            self.sync,
            self.branding,
            self.youtube,
        ]
        .iter()
        .flatten()
        .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub date: String,
    pub venue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TouringStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_shows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_ticket_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<Show>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_show: Option<Show>,
}

impl TouringStats {
    fn overlay(&mut self, patch: &Self) {
        overlay(&mut self.upcoming_shows, &patch.upcoming_shows);
        overlay(&mut self.avg_ticket_price, &patch.avg_ticket_price);
        overlay(&mut self.shows, &patch.shows);
        overlay(&mut self.next_show, &patch.next_show);
    }
}

/// Provenance block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Sources that contributed to this aggregate
    pub data_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// External identifiers and links reported by sources
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub external: BTreeMap<String, String>,
}

/// Roster entry / merged aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default)]
    pub monthly_listeners: u64,
    #[serde(default)]
    pub total_streams: u64,
    #[serde(default)]
    pub growth_rate: f64,
    #[serde(default)]
    pub social: SocialMetrics,
    #[serde(default)]
    pub revenue: RevenueBreakdown,
    #[serde(default)]
    pub touring: TouringStats,
    #[serde(default)]
    pub meta: RecordMeta,
    /// Remaining roster fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArtistRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tier: None,
            monthly_listeners: 0,
            total_streams: 0,
            growth_rate: 0.0,
            social: SocialMetrics::default(),
            revenue: RevenueBreakdown::default(),
            touring: TouringStats::default(),
            meta: RecordMeta::default(),
            extra: Map::new(),
        }
    }
}

impl Resource for ArtistRecord {
    fn resource_id(&self) -> &str {
        &self.id
    }
}

/// What one external source contributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourcePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social: Option<SocialMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<RevenueBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touring: Option<TouringStats>,
    /// External ids / links; always accepted
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl SourcePatch {
    /// Domains this patch writes to
    pub fn domains(&self) -> Vec<Domain> {
        let mut domains = Vec::new();
        if self.streaming.is_some() {
            domains.push(Domain::Streaming);
        }
        if self.social.is_some() {
            domains.push(Domain::Social);
        }
        if self.revenue.is_some() {
            domains.push(Domain::Revenue);
        }
        if self.touring.is_some() {
            domains.push(Domain::Touring);
        }
        domains
    }

    /// Drop every domain not in `owned`; returns the dropped ones
    pub fn restrict_to(&mut self, owned: &[Domain]) -> Vec<Domain> {
        let dropped: Vec<Domain> = self
            .domains()
            .into_iter()
            .filter(|domain| !owned.contains(domain))
            .collect();

        for domain in &dropped {
            match domain {
                Domain::Streaming => self.streaming = None,
                Domain::Social => self.social = None,
                Domain::Revenue => self.revenue = None,
                Domain::Touring => self.touring = None,
            }
        }

        dropped
    }

    /// Fold a later source's patch into this accumulator
    pub fn absorb(&mut self, patch: &SourcePatch) {
        if let Some(streaming) = &patch.streaming {
            self.streaming
                .get_or_insert_with(StreamingPatch::default)
                .overlay(streaming);
        }
        if let Some(social) = &patch.social {
            self.social
                .get_or_insert_with(SocialMetrics::default)
                .overlay(social);
        }
        if let Some(revenue) = &patch.revenue {
            self.revenue
                .get_or_insert_with(RevenueBreakdown::default)
                .overlay(revenue);
        }
        if let Some(touring) = &patch.touring {
            self.touring
                .get_or_insert_with(TouringStats::default)
                .overlay(touring);
        }
        self.meta
            .extend(patch.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Apply over `baseline`: patch fields win where set, baseline fills gaps
    pub fn apply_to(&self, baseline: &ArtistRecord) -> ArtistRecord {
        let mut merged = baseline.clone();

        if let Some(streaming) = &self.streaming {
            if let Some(listeners) = streaming.monthly_listeners {
                merged.monthly_listeners = listeners;
            }
            if let Some(streams) = streaming.total_streams {
                merged.total_streams = streams;
            }
            if let Some(growth) = streaming.growth_rate {
                merged.growth_rate = growth;
            }
        }
        if let Some(social) = &self.social {
            merged.social.overlay(social);
        }
        if let Some(revenue) = &self.revenue {
            merged.revenue.overlay(revenue);
        }
        if let Some(touring) = &self.touring {
            merged.touring.overlay(touring);
        }
        merged
            .meta
            .external
            .extend(self.meta.iter().map(|(k, v)| (k.clone(), v.clone())));

        merged
    }
}

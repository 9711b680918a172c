//! Cross-platform entity audit
//!
//! Checks how an artist is represented on knowledge platforms (knowledge
//! graph, encyclopedia, discography databases, lyrics sites) and scores the
//! overall entity health.
//!
//! Reports are cached under `entity_audit:{id}` with the entity-audit TTL.
//! Auditors flagged [`EntityAuditor::pinned`] hit strict third-party quotas;
//! their settled findings are cached indefinitely under
//! `audit_pinned:{platform}:{id}` and a forced refresh of the report reuses them.

use crate::access::{self, Principal};
use crate::cache::{Ttl, TtlCache};
use crate::error::GateError;
use crate::record::ArtistRecord;
use crate::sources::SourceError;
use crate::store::ArtistStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn report_key(artist_id: &str) -> String {
    format!("entity_audit:{}", artist_id)
}

pub fn pinned_key(platform: &str, artist_id: &str) -> String {
    format!("audit_pinned:{}:{}", platform, artist_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// Profile found and matched
    Verified,
    NotFound,
    /// Auditor lacks credentials
    Unconfigured,
    /// Auditor failed before producing a finding
    Unavailable,
}

impl FindingStatus {
    /// Definitive answer from the platform, worth pinning
    pub fn is_settled(self) -> bool {
        matches!(self, FindingStatus::Verified | FindingStatus::NotFound)
    }
}

/// One platform's audit result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub platform: String,
    pub status: FindingStatus,
    pub score: u32,
    pub max_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Platform-specific detail (verification badge, infobox presence...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl AuditFinding {
    pub fn new(platform: impl Into<String>, status: FindingStatus, score: u32, max_score: u32) -> Self {
        Self {
            platform: platform.into(),
            status,
            score,
            max_score,
            url: None,
            details: Map::new(),
        }
    }

    fn unavailable(platform: &str, max_score: u32, error: &SourceError) -> Self {
        let mut finding = Self::new(platform, FindingStatus::Unavailable, 0, max_score);
        finding
            .details
            .insert("error".to_string(), Value::String(error.to_string()));
        finding
    }
}

/// Audit report for one artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub artist_id: String,
    pub artist_name: String,
    pub findings: Vec<AuditFinding>,
    /// 0-100
    pub health_score: u8,
    pub audited_at: DateTime<Utc>,
    /// Served from cache
    pub cached: bool,
}

/// `round(100 * Σscore / Σmax_score)`; scores are capped at their maximum
pub fn health_score(findings: &[AuditFinding]) -> u8 {
    let max: u32 = findings.iter().map(|f| f.max_score).sum();
    if max == 0 {
        return 0;
    }
    let earned: u32 = findings.iter().map(|f| f.score.min(f.max_score)).sum();
    (100.0 * earned as f64 / max as f64).round() as u8
}

/// One platform checker
#[async_trait]
pub trait EntityAuditor: Send + Sync {
    fn platform(&self) -> &str;

    /// Points this platform contributes to the health score
    fn max_score(&self) -> u32;

    /// Cache settled findings indefinitely and skip them on forced refresh
    fn pinned(&self) -> bool {
        false
    }

    async fn audit(&self, artist: &ArtistRecord) -> Result<AuditFinding, SourceError>;
}

pub struct AuditService {
    store: Arc<dyn ArtistStore>,
    auditors: Vec<Arc<dyn EntityAuditor>>,
    reports: Arc<TtlCache<AuditReport>>,
    pinned: TtlCache<AuditFinding>,
    report_ttl: Ttl,
}

impl AuditService {
    pub fn new(
        store: Arc<dyn ArtistStore>,
        auditors: Vec<Arc<dyn EntityAuditor>>,
        report_ttl: Ttl,
    ) -> Self {
        Self {
            store,
            auditors,
            reports: Arc::new(TtlCache::new()),
            pinned: TtlCache::new(),
            report_ttl,
        }
    }

    /// Report cache, for the expiry sweeper. Pinned findings never expire
    /// and are bounded by roster size.
    pub fn report_cache(&self) -> Arc<TtlCache<AuditReport>> {
        Arc::clone(&self.reports)
    }

    /// Access-checked [`Self::audit`]
    pub async fn audit_for(
        &self,
        principal: &Principal,
        artist_id: &str,
        force_refresh: bool,
    ) -> Result<AuditReport, GateError> {
        access::authorize(principal, artist_id)?;
        self.audit(artist_id, force_refresh).await
    }

    pub async fn audit(&self, artist_id: &str, force_refresh: bool) -> Result<AuditReport, GateError> {
        let key = report_key(artist_id);
        if !force_refresh {
            if let Some(mut report) = self.reports.get(&key).await {
                report.cached = true;
                return Ok(report);
            }
        }

        let artist = self
            .store
            .get_by_id(artist_id)
            .await
            .ok_or_else(|| GateError::NotFound(format!("Artist {}", artist_id)))?;

        let findings = join_all(
            self.auditors
                .iter()
                .map(|auditor| self.run_auditor(auditor, &artist)),
        )
        .await;

        let report = AuditReport {
            artist_id: artist.id.clone(),
            artist_name: artist.name.clone(),
            health_score: health_score(&findings),
            findings,
            audited_at: Utc::now(),
            cached: false,
        };

        info!(
            artist_id = artist_id,
            health_score = report.health_score,
            "Entity audit complete"
        );

        self.reports.set(key, report.clone(), self.report_ttl).await;
        Ok(report)
    }

    async fn run_auditor(&self, auditor: &Arc<dyn EntityAuditor>, artist: &ArtistRecord) -> AuditFinding {
        let platform = auditor.platform();
        let pin_key = auditor.pinned().then(|| pinned_key(platform, &artist.id));

        if let Some(pin_key) = &pin_key {
            if let Some(finding) = self.pinned.get(pin_key).await {
                debug!(platform = platform, artist_id = %artist.id, "Using pinned finding");
                return finding;
            }
        }

        match auditor.audit(artist).await {
            Ok(finding) => {
                if let Some(pin_key) = pin_key.filter(|_| finding.status.is_settled()) {
                    self.pinned.set(pin_key, finding.clone(), Ttl::Indefinite).await;
                }
                finding
            }
            Err(e) => {
                warn!(
                    platform = platform,
                    artist_id = %artist.id,
                    error = %e,
                    "Auditor failed"
                );
                AuditFinding::unavailable(platform, auditor.max_score(), &e)
            }
        }
    }
}

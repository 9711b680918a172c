//! Platform auditors backing the entity audit
//!
//! - [`WikipediaAuditor`] - REST page summary, no credentials (max 25);
//!   summaries are cached under `wiki_bio:{title}` with the wiki-bio TTL
//! - [`GeniusAuditor`] - artist search, `GENIUS_API_TOKEN` (max 15, pinned)

use crate::audit::{AuditFinding, EntityAuditor, FindingStatus};
use crate::cache::{Ttl, TtlCache};
use crate::record::ArtistRecord;
use crate::sources::SourceError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("LabelDeck/", env!("CARGO_PKG_VERSION"));
const WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org/api/rest_v1";
const GENIUS_BASE_URL: &str = "https://api.genius.com";
pub const GENIUS_TOKEN_ENV: &str = "GENIUS_API_TOKEN";

const MUSIC_TERMS: [&str; 5] = ["musician", "dj", "producer", "music", "singer"];

fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

// ============================================================================
// Wikipedia
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WikiSummary {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<WikiThumbnail>,
    #[serde(default)]
    pub content_urls: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiThumbnail {
    pub source: String,
}

/// 15 for an existing page, +5 music related, +3 short description, +2 image
pub fn score_wikipedia(summary: &WikiSummary) -> AuditFinding {
    let text = format!(
        "{} {}",
        summary.description.as_deref().unwrap_or_default(),
        summary.extract.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    let music_related = MUSIC_TERMS.iter().any(|term| text.contains(term));

    let mut score = 15;
    if music_related {
        score += 5;
    }
    if summary.description.is_some() {
        score += 3;
    }
    if summary.thumbnail.is_some() {
        score += 2;
    }

    let mut finding = AuditFinding::new("wikipedia", FindingStatus::Verified, score, 25);
    finding.url = summary
        .content_urls
        .as_ref()
        .and_then(|urls| urls.pointer("/desktop/page"))
        .and_then(Value::as_str)
        .map(str::to_string);
    finding
        .details
        .insert("title".to_string(), Value::String(summary.title.clone()));
    finding
        .details
        .insert("music_related".to_string(), Value::Bool(music_related));
    finding
}

pub fn wiki_bio_key(title: &str) -> String {
    format!("wiki_bio:{}", title)
}

pub struct WikipediaAuditor {
    base_url: String,
    http_client: reqwest::Client,
    /// `None` records a missing page
    bios: Arc<TtlCache<Option<WikiSummary>>>,
    bio_ttl: Ttl,
}

impl WikipediaAuditor {
    pub fn new(timeout: Duration, bio_ttl: Ttl) -> Result<Self, SourceError> {
        Self::with_base_url(WIKIPEDIA_BASE_URL, timeout, bio_ttl)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration, bio_ttl: Ttl) -> Result<Self, SourceError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: http_client(timeout)?,
            bios: Arc::new(TtlCache::new()),
            bio_ttl,
        })
    }

    /// Bio cache, for the expiry sweeper
    pub fn bio_cache(&self) -> Arc<TtlCache<Option<WikiSummary>>> {
        Arc::clone(&self.bios)
    }

    async fn fetch_summary(&self, title: &str) -> Result<Option<WikiSummary>, SourceError> {
        let url = format!(
            "{}/page/summary/{}",
            self.base_url,
            urlencoding::encode(title)
        );
        tracing::debug!(url = %url, "Querying Wikipedia");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Status(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl EntityAuditor for WikipediaAuditor {
    fn platform(&self) -> &str {
        "wikipedia"
    }

    fn max_score(&self) -> u32 {
        25
    }

    async fn audit(&self, artist: &ArtistRecord) -> Result<AuditFinding, SourceError> {
        let title = artist.name.trim().replace(' ', "_");
        let summary = self
            .bios
            .get_or_fetch(&wiki_bio_key(&title), self.bio_ttl, false, || {
                self.fetch_summary(&title)
            })
            .await?;

        Ok(match summary {
            Some(summary) => score_wikipedia(&summary),
            None => AuditFinding::new("wikipedia", FindingStatus::NotFound, 0, 25),
        })
    }
}

// ============================================================================
// Genius
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeniusSearch {
    pub response: GeniusHits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeniusHits {
    #[serde(default)]
    pub hits: Vec<GeniusHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeniusHit {
    pub result: GeniusSong,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeniusSong {
    pub primary_artist: Option<GeniusArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeniusArtist {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

/// 10 when a hit's primary artist matches by name, +5 for a verified profile
pub fn match_genius(artist_name: &str, search: &GeniusSearch) -> AuditFinding {
    let matched = search
        .response
        .hits
        .iter()
        .filter_map(|hit| hit.result.primary_artist.as_ref())
        .find(|primary| primary.name.eq_ignore_ascii_case(artist_name.trim()));

    match matched {
        Some(primary) => {
            let score = if primary.is_verified { 15 } else { 10 };
            let mut finding = AuditFinding::new("genius", FindingStatus::Verified, score, 15);
            finding.url = primary.url.clone();
            finding
                .details
                .insert("verified".to_string(), Value::Bool(primary.is_verified));
            finding
        }
        None => AuditFinding::new("genius", FindingStatus::NotFound, 0, 15),
    }
}

pub struct GeniusAuditor {
    base_url: String,
    token_env: String,
    http_client: reqwest::Client,
}

impl GeniusAuditor {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(GENIUS_BASE_URL, GENIUS_TOKEN_ENV, timeout)
    }

    pub fn with_base_url(base_url: &str, token_env: &str, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token_env: token_env.to_string(),
            http_client: http_client(timeout)?,
        })
    }

    fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

#[async_trait]
impl EntityAuditor for GeniusAuditor {
    fn platform(&self) -> &str {
        "genius"
    }

    fn max_score(&self) -> u32 {
        15
    }

    /// Search quota is tight
    fn pinned(&self) -> bool {
        true
    }

    async fn audit(&self, artist: &ArtistRecord) -> Result<AuditFinding, SourceError> {
        let Some(token) = self.token() else {
            return Ok(AuditFinding::new("genius", FindingStatus::Unconfigured, 0, 15));
        };

        let response = self
            .http_client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", artist.name.as_str())])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Status(status.as_u16(), error_text));
        }

        let search: GeniusSearch = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(match_genius(&artist.name, &search))
    }
}

//! Config-driven HTTP source
//!
//! GETs `url_template` with `{id}` replaced by the artist's handle on that
//! platform and decodes the body as a [`SourcePatch`]. When `api_key_env`
//! names a variable, its value is sent as a bearer token and the source only
//! counts as configured while the variable is non-empty.

use super::{Fetcher, SourceError};
use crate::record::{Domain, SourcePatch};
use async_trait::async_trait;
use labeldeck_common::config::SourceConfig;
use labeldeck_common::{Error, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("LabelDeck/", env!("CARGO_PKG_VERSION"));

/// HTTP-backed [`Fetcher`]
pub struct HttpSource {
    name: String,
    url_template: String,
    domains: Vec<Domain>,
    api_key_env: Option<String>,
    handles: BTreeMap<String, String>,
    http_client: reqwest::Client,
}

impl HttpSource {
    pub fn from_config(config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let domains = config
            .domains
            .iter()
            .map(|domain| {
                domain.parse::<Domain>().map_err(|e| {
                    Error::Config(format!("Source {}: {}", config.name, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client for {}: {}", config.name, e)))?;

        Ok(Self {
            name: config.name.clone(),
            url_template: config.url_template.clone(),
            domains,
            api_key_env: config.api_key_env.clone(),
            handles: config.handles.clone(),
            http_client,
        })
    }

    /// Request URL for `artist_id`; the handle is percent-encoded
    pub fn url_for(&self, artist_id: &str) -> String {
        let handle = self
            .handles
            .get(artist_id)
            .map(String::as_str)
            .unwrap_or(artist_id);
        self.url_template
            .replace("{id}", &urlencoding::encode(handle))
    }

    fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[async_trait]
impl Fetcher for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn domains(&self) -> &[Domain] {
        &self.domains
    }

    fn is_configured(&self) -> bool {
        self.api_key_env.is_none() || self.api_key().is_some()
    }

    async fn fetch(&self, artist_id: &str) -> std::result::Result<SourcePatch, SourceError> {
        if !self.is_configured() {
            return Err(SourceError::NotConfigured(self.name.clone()));
        }

        let url = self.url_for(artist_id);
        debug!(source = %self.name, artist_id = artist_id, url = %url, "Querying source");

        let mut request = self.http_client.get(&url);
        if let Some(key) = self.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Status(status.as_u16(), error_text));
        }

        response
            .json::<SourcePatch>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

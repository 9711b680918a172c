//! Configuration loading for LabelDeck services
//!
//! Resolution priority:
//! 1. Environment variables (highest priority)
//! 2. TOML config file
//! 3. Compiled defaults (fallback)
//!
//! A missing config file is not fatal: compiled defaults are used. Where the
//! configuration came from is reported through [`ConfigOrigin::log`] once the
//! caller has a subscriber installed.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "LABELDECK_CONFIG";

/// Slowest accepted refill rate; one token roughly every 11.5 days
pub const MIN_RATE_PER_SECOND: f64 = 1e-6;

/// Where [`ServiceConfig::load_from`] takes its values from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// Path resolved but nothing there
    Missing(PathBuf),
    /// No config directory on this platform
    Unresolved,
}

impl ConfigOrigin {
    pub fn of(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path.exists() => ConfigOrigin::File(path.to_path_buf()),
            Some(path) => ConfigOrigin::Missing(path.to_path_buf()),
            None => ConfigOrigin::Unresolved,
        }
    }

    /// Report the origin; call after the tracing subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigOrigin::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigOrigin::Unresolved => {
                warn!("Could not determine config directory, using compiled defaults")
            }
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info", "labeldeck_gate=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Token bucket parameters for one outbound service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained refill rate (tokens per second)
    pub rate_per_second: f64,
    /// Bucket capacity
    pub burst: f64,
}

impl RateLimitConfig {
    pub const fn new(rate_per_second: f64, burst: f64) -> Self {
        Self {
            rate_per_second,
            burst,
        }
    }
}

/// Per-category time-to-live policy, in seconds.
///
/// `0` means the category never expires by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicyConfig {
    /// Merged artist snapshots (24h)
    pub aggregate_secs: u64,
    /// Entity audit reports (14 days)
    pub entity_audit_secs: u64,
    /// AI-generated analysis text (indefinite)
    pub ai_analysis_secs: u64,
    /// Wikipedia bio enrichment (24h)
    pub wiki_bio_secs: u64,
}

impl Default for TtlPolicyConfig {
    fn default() -> Self {
        Self {
            aggregate_secs: 86_400,
            entity_audit_secs: 1_209_600,
            ai_analysis_secs: 0,
            wiki_bio_secs: 86_400,
        }
    }
}

/// A&R demo opened for voting at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSeed {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

/// One HTTP-backed external data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name; also the rate limiter service id
    pub name: String,
    /// URL with `{id}` placeholder for the artist handle
    pub url_template: String,
    /// Record domains this source is allowed to write
    /// ("streaming", "social", "revenue", "touring")
    #[serde(default)]
    pub domains: Vec<String>,
    /// Environment variable holding the source's API key.
    /// When set, the source is only configured if the variable is non-empty.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Artist id → handle on this source; the artist id is used when absent
    #[serde(default)]
    pub handles: BTreeMap<String, String>,
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listen address
    pub bind_addr: String,
    /// Enrich baseline records from external sources
    pub use_real_data: bool,
    /// Per-source fetch timeout
    pub fetch_timeout_ms: u64,
    /// Interval of the expired-entry cache sweep
    pub sweep_interval_secs: u64,
    /// JSON file with the baseline artist roster
    pub roster_path: Option<PathBuf>,
    /// Registered voters; denominator of demo star ratings
    pub voter_pool: u64,
    /// Demos open for A&R voting at startup
    pub anr_demos: Vec<DemoSeed>,
    pub logging: LoggingConfig,
    pub rate_limits: BTreeMap<String, RateLimitConfig>,
    pub ttl: TtlPolicyConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
            use_real_data: false,
            fetch_timeout_ms: 5_000,
            sweep_interval_secs: 600,
            roster_path: None,
            voter_pool: 10,
            anr_demos: Vec::new(),
            logging: LoggingConfig::default(),
            rate_limits: default_rate_limits(),
            ttl: TtlPolicyConfig::default(),
            sources: Vec::new(),
        }
    }
}

/// Compiled per-service quota table
pub fn default_rate_limits() -> BTreeMap<String, RateLimitConfig> {
    [
        ("spotify", RateLimitConfig::new(10.0, 50.0)),
        ("youtube", RateLimitConfig::new(5.0, 20.0)),
        ("tiktok", RateLimitConfig::new(5.0, 20.0)),
        ("twitter", RateLimitConfig::new(5.0, 20.0)),
        ("instagram", RateLimitConfig::new(2.0, 10.0)),
        ("shopify", RateLimitConfig::new(2.0, 4.0)),
        ("ticketmaster", RateLimitConfig::new(5.0, 10.0)),
        ("bandsintown", RateLimitConfig::new(10.0, 20.0)),
        ("chartmetric", RateLimitConfig::new(2.0, 10.0)),
        ("revelator", RateLimitConfig::new(5.0, 20.0)),
    ]
    .into_iter()
    .map(|(name, limit)| (name.to_string(), limit))
    .collect()
}

impl ServiceConfig {
    /// Resolve and load the configuration for this process
    pub fn load() -> Result<Self> {
        Self::load_from(resolve_config_path())
    }

    /// Load from `path` (defaults when absent or missing), then apply
    /// environment overrides and validate
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match ConfigOrigin::of(path.as_deref()) {
            ConfigOrigin::File(path) => Self::from_path(&path)?,
            ConfigOrigin::Missing(_) | ConfigOrigin::Unresolved => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML content; services missing from `[rate_limits]` keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ServiceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

        for (name, limit) in default_rate_limits() {
            config.rate_limits.entry(name).or_insert(limit);
        }

        Ok(config)
    }

    /// Apply environment overrides on top of file/default values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("USE_REAL_DATA") {
            self.use_real_data = value.trim().eq_ignore_ascii_case("true");
        }

        if let Ok(addr) = std::env::var("LABELDECK_BIND_ADDR") {
            self.bind_addr = addr;
        }

        if let Ok(value) = std::env::var("LABELDECK_FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = value.trim().parse().map_err(|e| {
                Error::Config(format!("LABELDECK_FETCH_TIMEOUT_MS '{}': {}", value, e))
            })?;
        }

        if let Ok(path) = std::env::var("LABELDECK_ROSTER") {
            self.roster_path = Some(PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("LABELDECK_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Reject quota and source entries that cannot work
    pub fn validate(&self) -> Result<()> {
        for (name, limit) in &self.rate_limits {
            if !(limit.rate_per_second.is_finite() && limit.rate_per_second >= MIN_RATE_PER_SECOND) {
                return Err(Error::Config(format!(
                    "rate_limits.{}: rate_per_second must be finite and at least {}",
                    name, MIN_RATE_PER_SECOND
                )));
            }
            if !(limit.burst.is_finite() && limit.burst >= 1.0) {
                return Err(Error::Config(format!(
                    "rate_limits.{}: burst must be finite and at least 1",
                    name
                )));
            }
        }

        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(Error::Config("sources: name must not be empty".to_string()));
            }
            if !source.url_template.contains("{id}") {
                return Err(Error::Config(format!(
                    "sources.{}: url_template must contain {{id}}",
                    source.name
                )));
            }
        }

        for demo in &self.anr_demos {
            if demo.id.trim().is_empty() {
                return Err(Error::Config("anr_demos: id must not be empty".to_string()));
            }
        }

        if self.fetch_timeout_ms == 0 {
            return Err(Error::Config("fetch_timeout_ms must be positive".to_string()));
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        crate::time::millis_to_duration(self.fetch_timeout_ms)
    }
}

/// Config file location: `LABELDECK_CONFIG`, then the platform config dir
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|d| d.join("labeldeck").join("labeldeck.toml"))
}

/// Write a config back out as TOML
pub fn write_toml_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_policy_table() {
        let config = ServiceConfig::default();
        assert_eq!(config.ttl.aggregate_secs, 86_400);
        assert_eq!(config.ttl.entity_audit_secs, 1_209_600);
        assert_eq!(config.ttl.ai_analysis_secs, 0);
        assert_eq!(
            config.rate_limits.get("instagram"),
            Some(&RateLimitConfig::new(2.0, 10.0))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_rate_table_keeps_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [rate_limits.spotify]
            rate_per_second = 1.0
            burst = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(
            config.rate_limits.get("spotify"),
            Some(&RateLimitConfig::new(1.0, 2.0))
        );
        assert_eq!(
            config.rate_limits.get("youtube"),
            Some(&RateLimitConfig::new(5.0, 20.0))
        );
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = ServiceConfig::default();
        config
            .rate_limits
            .insert("broken".to_string(), RateLimitConfig::new(0.0, 5.0));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_rates_the_limiter_cannot_schedule() {
        for rate in [1e-20, f64::NAN, f64::INFINITY] {
            let mut config = ServiceConfig::default();
            config
                .rate_limits
                .insert("slow".to_string(), RateLimitConfig::new(rate, 1.0));
            assert!(matches!(config.validate(), Err(Error::Config(_))), "rate {}", rate);
        }

        let mut config = ServiceConfig::default();
        config
            .rate_limits
            .insert("slow".to_string(), RateLimitConfig::new(MIN_RATE_PER_SECOND, 1.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_origin_distinguishes_missing_and_unresolved() {
        let here = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let nowhere = here.with_file_name("no-such-labeldeck.toml");

        assert_eq!(ConfigOrigin::of(Some(here.as_path())), ConfigOrigin::File(here.clone()));
        assert_eq!(ConfigOrigin::of(Some(nowhere.as_path())), ConfigOrigin::Missing(nowhere.clone()));
        assert_eq!(ConfigOrigin::of(None), ConfigOrigin::Unresolved);
    }

    #[test]
    fn test_validate_rejects_template_without_placeholder() {
        let mut config = ServiceConfig::default();
        config.sources.push(SourceConfig {
            name: "spotify".to_string(),
            url_template: "http://localhost/artists".to_string(),
            domains: vec!["streaming".to_string()],
            handles: BTreeMap::new(),
            api_key_env: None,
        });
        assert!(config.validate().is_err());
    }
}

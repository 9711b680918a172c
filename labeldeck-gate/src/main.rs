//! labeldeck-gate - label dashboard data gateway
//!
//! Serves merged artist aggregates, entity audits, insights and A&R voting
//! behind role/entitlement checks, with per-service rate limiting and tiered
//! caching in front of every external platform.

use anyhow::{Context, Result};
use clap::Parser;
use labeldeck_common::config::{resolve_config_path, write_toml_config, ConfigOrigin, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use labeldeck_gate::anr::AnrDesk;
use labeldeck_gate::audit::{AuditService, EntityAuditor};
use labeldeck_gate::auditors::{GeniusAuditor, WikipediaAuditor};
use labeldeck_gate::cache::{spawn_sweeper, CacheCategory, TtlCache, TtlPolicy};
use labeldeck_gate::insight::{InsightService, TemplateAnalyst};
use labeldeck_gate::orchestrator::{Aggregator, AggregatorSettings};
use labeldeck_gate::rate_limit::RateLimiter;
use labeldeck_gate::sources::{Fetcher, HttpSource};
use labeldeck_gate::store::MemoryStore;
use labeldeck_gate::AppState;

/// Command-line arguments for labeldeck-gate
#[derive(Parser, Debug)]
#[command(name = "labeldeck-gate")]
#[command(about = "Label dashboard data gateway")]
#[command(version)]
struct Args {
    /// TOML config file (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long, env = "LABELDECK_BIND_ADDR")]
    bind: Option<String>,

    /// Write the effective configuration as TOML to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.or_else(resolve_config_path);
    let origin = ConfigOrigin::of(config_path.as_deref());
    let mut config = ServiceConfig::load_from(config_path).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    labeldeck_common::logging::init(&config.logging)?;
    origin.log();

    if let Some(path) = args.write_config {
        write_toml_config(&config, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Effective configuration written to {}", path.display());
        return Ok(());
    }

    info!("Starting labeldeck-gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(use_real_data = config.use_real_data, "Data mode");

    let roster = Arc::new(match &config.roster_path {
        Some(path) => MemoryStore::from_json_file(path)?,
        None => {
            warn!("No roster configured, starting with an empty roster");
            MemoryStore::default()
        }
    });

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
    let ttl = TtlPolicy::from(&config.ttl);
    let sweep_interval = std::time::Duration::from_secs(config.sweep_interval_secs.max(1));

    let fetchers = config
        .sources
        .iter()
        .map(|source| {
            HttpSource::from_config(source, config.fetch_timeout())
                .map(|fetcher| Arc::new(fetcher) as Arc<dyn Fetcher>)
        })
        .collect::<labeldeck_common::Result<Vec<_>>>()?;
    for fetcher in &fetchers {
        if !limiter.is_configured(fetcher.name()) {
            warn!(source = fetcher.name(), "Source has no rate limit entry and will always fail");
        }
    }
    info!(sources = fetchers.len(), "External sources registered");

    let aggregate_cache = Arc::new(TtlCache::new());
    let _sweeper = spawn_sweeper(Arc::clone(&aggregate_cache), sweep_interval);

    let aggregator = Arc::new(Aggregator::new(
        roster.clone(),
        fetchers,
        limiter,
        aggregate_cache,
        AggregatorSettings {
            use_real_data: config.use_real_data,
            fetch_timeout: config.fetch_timeout(),
            aggregate_ttl: ttl.ttl(CacheCategory::Aggregate),
        },
    ));

    let wikipedia = Arc::new(WikipediaAuditor::new(
        config.fetch_timeout(),
        ttl.ttl(CacheCategory::WikiBio),
    )?);
    let _bio_sweeper = spawn_sweeper(wikipedia.bio_cache(), sweep_interval);
    let auditors: Vec<Arc<dyn EntityAuditor>> = vec![
        wikipedia as Arc<dyn EntityAuditor>,
        Arc::new(GeniusAuditor::new(config.fetch_timeout())?),
    ];
    let audits = Arc::new(AuditService::new(
        roster.clone(),
        auditors,
        ttl.ttl(CacheCategory::EntityAudit),
    ));
    let _report_sweeper = spawn_sweeper(audits.report_cache(), sweep_interval);

    let insights = Arc::new(InsightService::new(
        Arc::clone(&aggregator),
        Arc::new(TemplateAnalyst),
        ttl.ttl(CacheCategory::AiAnalysis),
    ));
    let _insight_sweeper = spawn_sweeper(insights.cache(), sweep_interval);

    let anr = Arc::new(AnrDesk::new(config.voter_pool));
    for demo in &config.anr_demos {
        anr.seed_demo(demo).await;
    }
    info!(demos = config.anr_demos.len(), voter_pool = config.voter_pool, "A&R desk ready");

    let state = AppState::new(aggregator, roster, audits, insights, anr);
    let app = labeldeck_gate::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

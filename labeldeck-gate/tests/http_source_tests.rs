//! HttpSource against a local upstream
//!
//! Spins up a throwaway axum server on 127.0.0.1:0 standing in for an
//! external platform and checks fetch outcomes plus the merged aggregate.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use labeldeck_common::config::{RateLimitConfig, SourceConfig};
use labeldeck_gate::cache::TtlCache;
use labeldeck_gate::orchestrator::{Aggregator, AggregatorSettings};
use labeldeck_gate::rate_limit::RateLimiter;
use labeldeck_gate::record::ArtistRecord;
use labeldeck_gate::sources::{Fetcher, HttpSource, SourceError};
use labeldeck_gate::store::MemoryStore;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

async fn profile(Path(handle): Path<String>) -> Json<Value> {
    Json(json!({
        "streaming": { "monthlyListeners": 2_400_000, "growthRate": 4.5 },
        "social": { "spotify": 1_100_000 },
        // Not owned by a streaming/social source
        "revenue": { "merch": 99_999.0 },
        "meta": { "spotifyHandle": handle }
    }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn garbage() -> &'static str {
    "<html>definitely not json</html>"
}

async fn guarded(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer s3cret") => Ok(Json(json!({ "social": { "tiktok": 42 } }))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/profiles/:handle", get(profile))
        .route("/broken/:handle", get(broken))
        .route("/garbage/:handle", get(garbage))
        .route("/guarded/:handle", get(guarded));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn source(name: &str, url_template: String, domains: &[&str], api_key_env: Option<&str>) -> HttpSource {
    let config = SourceConfig {
        name: name.to_string(),
        url_template,
        domains: domains.iter().map(|d| d.to_string()).collect(),
        api_key_env: api_key_env.map(str::to_string),
        handles: BTreeMap::from([("art_rezz".to_string(), "rezz_official".to_string())]),
    };
    HttpSource::from_config(&config, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetch_decodes_patch_using_handle() {
    let base = spawn_upstream().await;
    let spotify = source("spotify", format!("{}/profiles/{{id}}", base), &["streaming", "social"], None);

    let patch = spotify.fetch("art_rezz").await.unwrap();

    assert_eq!(patch.streaming.unwrap().monthly_listeners, Some(2_400_000));
    assert_eq!(patch.social.unwrap().spotify, Some(1_100_000));
    assert_eq!(patch.meta.get("spotifyHandle").map(String::as_str), Some("rezz_official"));
}

#[tokio::test]
async fn handle_with_reserved_characters_reaches_upstream_intact() {
    let base = spawn_upstream().await;
    let config = SourceConfig {
        name: "spotify".to_string(),
        url_template: format!("{}/profiles/{{id}}", base),
        domains: vec!["streaming".to_string()],
        api_key_env: None,
        handles: BTreeMap::from([("art_acdc".to_string(), "AC/DC".to_string())]),
    };
    let spotify = HttpSource::from_config(&config, Duration::from_secs(5)).unwrap();

    let patch = spotify.fetch("art_acdc").await.unwrap();

    assert_eq!(patch.meta.get("spotifyHandle").map(String::as_str), Some("AC/DC"));
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let base = spawn_upstream().await;
    let broken = source("spotify", format!("{}/broken/{{id}}", base), &["streaming"], None);

    match broken.fetch("art_rezz").await {
        Err(SourceError::Status(code, body)) => {
            assert_eq!(code, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn undecodable_body_is_parse_error() {
    let base = spawn_upstream().await;
    let garbage = source("spotify", format!("{}/garbage/{{id}}", base), &["streaming"], None);

    assert!(matches!(garbage.fetch("art_rezz").await, Err(SourceError::Parse(_))));
}

#[tokio::test]
async fn unreachable_upstream_is_network_error() {
    let dead = source("spotify", "http://127.0.0.1:9/profiles/{id}".to_string(), &["streaming"], None);

    assert!(matches!(dead.fetch("art_rezz").await, Err(SourceError::Network(_))));
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let base = spawn_upstream().await;
    let env_var = "LABELDECK_TEST_TIKTOK_KEY";
    let tiktok = source("tiktok", format!("{}/guarded/{{id}}", base), &["social"], Some(env_var));

    std::env::remove_var(env_var);
    assert!(!tiktok.is_configured());
    assert!(matches!(tiktok.fetch("art_rezz").await, Err(SourceError::NotConfigured(_))));

    std::env::set_var(env_var, "s3cret");
    assert!(tiktok.is_configured());
    let patch = tiktok.fetch("art_rezz").await.unwrap();
    assert_eq!(patch.social.unwrap().tiktok, Some(42));
    std::env::remove_var(env_var);
}

#[tokio::test]
async fn aggregate_merges_owned_domains_and_survives_failing_source() {
    let base = spawn_upstream().await;

    let mut baseline = ArtistRecord::new("art_rezz", "REZZ");
    baseline.monthly_listeners = 1_000_000;
    baseline.revenue.merch = Some(5_000.0);
    let store = Arc::new(MemoryStore::new(vec![baseline]));

    let limits = BTreeMap::from([
        ("spotify".to_string(), RateLimitConfig::new(10.0, 10.0)),
        ("chartmetric".to_string(), RateLimitConfig::new(10.0, 10.0)),
    ]);
    let fetchers: Vec<Arc<dyn Fetcher>> = vec![
        Arc::new(source(
            "spotify",
            format!("{}/profiles/{{id}}", base),
            &["streaming", "social"],
            None,
        )),
        Arc::new(source(
            "chartmetric",
            format!("{}/broken/{{id}}", base),
            &["streaming"],
            None,
        )),
    ];

    let aggregator = Aggregator::new(
        store,
        fetchers,
        Arc::new(RateLimiter::from_config(&limits)),
        Arc::new(TtlCache::new()),
        AggregatorSettings {
            use_real_data: true,
            ..Default::default()
        },
    );

    let merged = aggregator.get_aggregate("art_rezz", false).await.unwrap();

    assert_eq!(merged.monthly_listeners, 2_400_000);
    assert_eq!(merged.social.spotify, Some(1_100_000));
    // Revenue stays with the baseline
    assert_eq!(merged.revenue.merch, Some(5_000.0));
    assert_eq!(merged.meta.data_sources, vec!["spotify".to_string()]);
    assert!(merged.meta.last_updated.is_some());
}

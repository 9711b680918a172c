//! Configuration loading tests
//!
//! Tests that manipulate environment variables are marked with #[serial]
//! so they never run in parallel with each other.

use labeldeck_common::config::{
    write_toml_config, DemoSeed, RateLimitConfig, ServiceConfig, SourceConfig, CONFIG_PATH_ENV,
};
use serial_test::serial;
use std::collections::BTreeMap;
use std::env;
use tempfile::TempDir;

fn clear_env() {
    for var in [
        CONFIG_PATH_ENV,
        "USE_REAL_DATA",
        "LABELDECK_BIND_ADDR",
        "LABELDECK_FETCH_TIMEOUT_MS",
        "LABELDECK_ROSTER",
        "LABELDECK_LOG_LEVEL",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var(CONFIG_PATH_ENV, temp_dir.path().join("absent.toml"));

    let config = ServiceConfig::load().unwrap();

    assert_eq!(config, ServiceConfig::default());
    clear_env();
}

#[test]
#[serial]
fn test_file_values_are_loaded() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("labeldeck.toml");
    std::fs::write(
        &path,
        r#"
        bind_addr = "0.0.0.0:9000"
        use_real_data = true

        [ttl]
        aggregate_secs = 60

        [[sources]]
        name = "spotify"
        url_template = "http://127.0.0.1:7001/artists/{id}"
        domains = ["streaming", "social"]

        [sources.handles]
        art_deadmau5 = "2CIMQHirSU0MQqyYHq0eOx"
        "#,
    )
    .unwrap();
    env::set_var(CONFIG_PATH_ENV, &path);

    let config = ServiceConfig::load().unwrap();

    assert_eq!(config.bind_addr, "0.0.0.0:9000");
    assert!(config.use_real_data);
    assert_eq!(config.ttl.aggregate_secs, 60);
    assert_eq!(config.ttl.entity_audit_secs, 1_209_600);
    assert_eq!(config.sources.len(), 1);
    assert_eq!(
        config.sources[0].handles.get("art_deadmau5").map(String::as_str),
        Some("2CIMQHirSU0MQqyYHq0eOx")
    );
    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("labeldeck.toml");
    std::fs::write(&path, "use_real_data = true\nfetch_timeout_ms = 1000\n").unwrap();
    env::set_var(CONFIG_PATH_ENV, &path);
    env::set_var("USE_REAL_DATA", "false");
    env::set_var("LABELDECK_FETCH_TIMEOUT_MS", "2500");
    env::set_var("LABELDECK_LOG_LEVEL", "debug");

    let config = ServiceConfig::load().unwrap();

    assert!(!config.use_real_data);
    assert_eq!(config.fetch_timeout_ms, 2500);
    assert_eq!(config.logging.level, "debug");
    clear_env();
}

#[test]
#[serial]
fn test_bad_timeout_env_is_config_error() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var(CONFIG_PATH_ENV, temp_dir.path().join("absent.toml"));
    env::set_var("LABELDECK_FETCH_TIMEOUT_MS", "soon");

    assert!(ServiceConfig::load().is_err());
    clear_env();
}

#[test]
fn test_written_config_reads_back() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("labeldeck.toml");

    let mut config = ServiceConfig::default();
    config
        .rate_limits
        .insert("discogs".to_string(), RateLimitConfig::new(1.0, 5.0));
    config.sources.push(SourceConfig {
        name: "discogs".to_string(),
        url_template: "http://127.0.0.1:7002/{id}".to_string(),
        domains: vec!["revenue".to_string()],
        handles: BTreeMap::new(),
        api_key_env: Some("DISCOGS_TOKEN".to_string()),
    });

    write_toml_config(&config, &path).unwrap();
    let loaded = ServiceConfig::from_path(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_explicit_path_skips_resolution() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var(CONFIG_PATH_ENV, temp_dir.path().join("ignored.toml"));
    let path = temp_dir.path().join("cli.toml");
    std::fs::write(
        &path,
        "voter_pool = 25\n\n[[anr_demos]]\nid = \"demo_a\"\ntitle = \"Ghosts n Stuff\"\n",
    )
    .unwrap();

    let config = ServiceConfig::load_from(Some(path)).unwrap();

    assert_eq!(config.voter_pool, 25);
    assert_eq!(
        config.anr_demos,
        vec![DemoSeed {
            id: "demo_a".to_string(),
            title: Some("Ghosts n Stuff".to_string()),
            artist: None,
        }]
    );
    clear_env();
}

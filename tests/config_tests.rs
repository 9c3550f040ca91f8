// tests/config_tests.rs
use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use submission_vault::enums::{KeyProviderKind, StoreBackend};
use submission_vault::error::VaultError;
use submission_vault::Config;
use tempfile::tempdir;

const ENV_VARS: [&str; 4] = ["SV_CONFIG", "SV_STORE_PATH", "SV_ADMIN_SECRET", "SV_LOCAL_KEY_HEX"];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn defaults_are_safe() {
    let config = Config::default();
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert!(config.store.path.ends_with("submissions.db"));
    assert_eq!(config.keys.provider, KeyProviderKind::Unconfigured);
    assert!(config.admin.secret.is_none());
    assert_eq!(config.admin.rate_limit_max, 10);
    assert_eq!(config.admin.rate_limit_window(), Duration::from_secs(60));
    assert_eq!(config.decrypt.concurrency, 8);
    assert_eq!(config.analytics.recent_window().num_days(), 7);
    config.validate().unwrap();
}

#[test]
fn parses_full_toml() {
    let config = Config::from_toml_str(
        r#"
        [store]
        backend = "json-files"
        path = "/var/lib/sv/records"

        [keys]
        provider = "local"
        local_key_hex = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff"
        previous_key_hex = ["ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100"]

        [admin]
        secret = "hunter2"
        rate_limit_max = 3
        rate_limit_window_secs = 10

        [decrypt]
        concurrency = 2
        timeout_ms = 500

        [analytics]
        recent_window_days = 30
        "#,
    )
    .unwrap();
    assert_eq!(config.store.backend, StoreBackend::JsonFiles);
    assert_eq!(config.store.path, PathBuf::from("/var/lib/sv/records"));
    assert_eq!(config.keys.provider, KeyProviderKind::Local);
    assert_eq!(config.keys.previous_key_hex.len(), 1);
    assert_eq!(config.admin.rate_limit_max, 3);
    assert_eq!(config.decrypt.timeout(), Duration::from_millis(500));
    assert_eq!(config.analytics.recent_window_days, 30);
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = Config::from_toml_str("[admin]\nsecret = \"x\"\n").unwrap();
    assert_eq!(config.admin.secret.as_deref(), Some("x"));
    assert_eq!(config.admin.rate_limit_max, 10);
    assert_eq!(config.decrypt.concurrency, 8);
}

#[test]
fn invalid_values_are_rejected() {
    for bad in [
        "[decrypt]\nconcurrency = 0",
        "[decrypt]\ntimeout_ms = 0",
        "[admin]\nrate_limit_max = 0",
        "[analytics]\nrecent_window_days = -1",
        "[keys]\nprovider = \"cloud-hsm\"",
        "not toml at all [",
    ] {
        assert!(
            matches!(Config::from_toml_str(bad), Err(VaultError::Config(_))),
            "{bad:?} accepted"
        );
    }
}

#[test]
fn debug_output_redacts_secrets() {
    let config = Config::from_toml_str(
        "[admin]\nsecret = \"hunter2\"\n[keys]\nlocal_key_hex = \"abcdef0123\"\n",
    )
    .unwrap();
    let dump = format!("{config:?}");
    assert!(!dump.contains("hunter2"));
    assert!(!dump.contains("abcdef0123"));
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert!(config.admin.secret.is_none());
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let dir = tempdir().unwrap();
    let file = dir.path().join("sv.toml");
    std::fs::write(&file, "[admin]\nsecret = \"from-file\"\n").unwrap();

    std::env::set_var("SV_ADMIN_SECRET", "from-env");
    std::env::set_var("SV_STORE_PATH", dir.path().join("env.db"));
    std::env::set_var("SV_LOCAL_KEY_HEX", "  ");
    let config = Config::load_from(&file).unwrap();
    clear_env();

    assert_eq!(config.admin.secret.as_deref(), Some("from-env"));
    assert_eq!(config.store.path, dir.path().join("env.db"));
    // Blank values do not override
    assert!(config.keys.local_key_hex.is_none());
}

#[test]
#[serial]
fn load_reads_the_file_named_by_env() {
    clear_env();
    let dir = tempdir().unwrap();
    let file = dir.path().join("custom.toml");
    std::fs::write(&file, "[decrypt]\nconcurrency = 3\n").unwrap();
    std::env::set_var("SV_CONFIG", &file);
    let config = Config::load().unwrap();
    clear_env();
    assert_eq!(config.decrypt.concurrency, 3);
}

use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_when_environment_is_empty() {
    let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg.host, DEFAULT_HOST);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.data_root, PathBuf::from("."));
    assert!(cfg.service_account_json.is_none());
    assert_eq!(cfg.notifications.cadence, "* * * * *");
    assert!(cfg.notifications.dispatch_url.is_none());
    assert_eq!(cfg.notifications.dispatch_timeout_secs, DEFAULT_DISPATCH_TIMEOUT_SECS);
    assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
}

#[test]
fn overrides_are_applied() {
    let cfg = AppConfig::from_lookup(lookup_from(&[
        ("HOST", "127.0.0.1"),
        ("PORT", "9000"),
        ("DATA_ROOT", "/var/lib/backend"),
        ("NOTIFICATIONS_CRON", "*/5 * * * *"),
        ("NOTIFICATIONS_DISPATCH_URL", "http://dispatch.internal/run"),
        ("NOTIFICATIONS_DISPATCH_TIMEOUT_SECS", "5"),
    ]))
    .unwrap();
    assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    assert_eq!(cfg.data_root, PathBuf::from("/var/lib/backend"));
    assert_eq!(cfg.notifications.cadence, "*/5 * * * *");
    assert_eq!(cfg.notifications.dispatch_url.as_deref(), Some("http://dispatch.internal/run"));
    assert_eq!(cfg.notifications.dispatch_timeout_secs, 5);
}

#[test]
fn invalid_port_is_rejected() {
    let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "PORT", value: "eighty".into() });
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("PORT", "  "), ("NOTIFICATIONS_DISPATCH_URL", "")])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(cfg.notifications.dispatch_url.is_none());
}

#[test]
fn service_account_json_is_passed_through_untouched() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("SERVICE_ACCOUNT_JSON", "not-json")])).unwrap();
    assert_eq!(cfg.service_account_json.as_deref(), Some("not-json"));
}

#[test]
fn zero_dispatch_timeout_is_rejected() {
    let err = AppConfig::from_lookup(lookup_from(&[("NOTIFICATIONS_DISPATCH_TIMEOUT_SECS", "0")])).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "NOTIFICATIONS_DISPATCH_TIMEOUT_SECS", value: "0".into() });
}

// =============================================================================
// ENV FILE
// =============================================================================

fn scratch_file(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("backend-dotenv-{}", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn missing_env_file_is_not_an_error() {
    let path = std::env::temp_dir().join(format!("backend-dotenv-{}", uuid::Uuid::new_v4()));
    let loaded = missing_is_ok(dotenvy::from_path(&path)).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn malformed_env_file_is_reported() {
    let path = scratch_file("BACKEND_DOTENV_BROKEN=\"unterminated\n");
    let err = missing_is_ok(dotenvy::from_path(&path)).unwrap_err();
    assert!(!err.not_found());
    assert!(std::env::var("BACKEND_DOTENV_BROKEN").is_err());
    std::fs::remove_file(path).unwrap();
}

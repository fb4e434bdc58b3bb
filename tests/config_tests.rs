use std::collections::HashMap;

use inventory_bot::config::{BotConfig, DEFAULT_PORT, DEFAULT_SELF_PING_INTERVAL_SECS};
use inventory_bot::errors::BotError;

fn config_from(pairs: &[(&str, &str)]) -> Result<BotConfig, BotError> {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    BotConfig::from_lookup(|key| env.get(key).cloned())
}

const REQUIRED: &[(&str, &str)] = &[
    ("TELEGRAM_BOT_TOKEN", "123:abc"),
    ("DATABASE_URL", "sqlite://inventory.db"),
];

#[test]
fn test_defaults() {
    let config = config_from(REQUIRED).unwrap();

    assert_eq!(config.bot_token, "123:abc");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.language, "ru");
    assert!(config.webhook_url.is_none());
    assert!(config.has_single_storage());
    assert_eq!(config.storages[0].key, "main");
    assert_eq!(
        config.self_ping_interval().as_secs(),
        DEFAULT_SELF_PING_INTERVAL_SECS
    );
    assert_eq!(config.session.state_ttl().as_secs(), 3600);
}

#[test]
fn test_missing_required_variables() {
    assert_eq!(
        config_from(&[("DATABASE_URL", "sqlite::memory:")]).unwrap_err(),
        BotError::MissingEnv("TELEGRAM_BOT_TOKEN".to_string())
    );
    assert_eq!(
        config_from(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap_err(),
        BotError::MissingEnv("DATABASE_URL".to_string())
    );
    // Blank values count as missing
    assert!(config_from(&[("TELEGRAM_BOT_TOKEN", "  "), ("DATABASE_URL", "x")]).is_err());
}

#[test]
fn test_bot_token_alias() {
    let config = config_from(&[("BOT_TOKEN", "456:def"), ("DATABASE_URL", "x")]).unwrap();
    assert_eq!(config.bot_token, "456:def");
}

#[test]
fn test_overrides() {
    let mut pairs = REQUIRED.to_vec();
    pairs.extend_from_slice(&[
        ("WEBHOOK_URL", "https://bot.example.com/webhook"),
        ("PORT", "8080"),
        ("STORAGES", "main:Main, garage:Garage"),
        ("BOT_LANGUAGE", "EN"),
        ("STATE_TTL_SECS", "60"),
    ]);
    let config = config_from(&pairs).unwrap();

    assert_eq!(
        config.webhook_url.as_ref().map(|url| url.path()),
        Some("/webhook")
    );
    assert_eq!(config.listen_addr().port(), 8080);
    assert_eq!(config.language, "en");
    assert_eq!(config.session.state_ttl_secs, 60);
    assert!(!config.has_single_storage());
    assert_eq!(config.storage("garage").map(|s| s.title.as_str()), Some("Garage"));
    assert_eq!(config.storage_by_title(" main ").map(|s| s.key.as_str()), Some("main"));
}

#[test]
fn test_invalid_values() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("PORT", "eighty"));
    assert!(matches!(
        config_from(&pairs),
        Err(BotError::InvalidEnv { key, .. }) if key == "PORT"
    ));

    let mut pairs = REQUIRED.to_vec();
    pairs.push(("WEBHOOK_URL", "not a url"));
    assert!(config_from(&pairs).is_err());

    let mut pairs = REQUIRED.to_vec();
    pairs.push(("STORAGES", "a:One,a:Two"));
    assert!(config_from(&pairs).is_err());
}

//! # Configuration Module
//!
//! Runtime configuration read once at startup from the environment
//! (after `.env` has been loaded by `dotenv`).

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::errors::BotError;
use crate::localization::DEFAULT_LANGUAGE;

// Constants for bot configuration
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_STORAGES: &str = "main:Основной склад";
pub const DEFAULT_STATE_TTL_SECS: u64 = 3600; // 1 hour
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3600; // 1 hour
pub const DEFAULT_SELF_PING_INTERVAL_SECS: u64 = 600; // 10 minutes

/// A physical location that partitions the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    /// Key stored in the database
    pub key: String,
    /// Name shown on buttons and in listings
    pub title: String,
}

/// Conversation state expiry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Idle time after which a chat's state is dropped
    pub state_ttl_secs: u64,
    /// How often the cleanup task runs
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: DEFAULT_STATE_TTL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl SessionConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Configuration structure for the bot process
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// sqlx connection string for the SQLite file
    pub database_url: String,
    /// Public webhook URL; `None` means long polling
    pub webhook_url: Option<Url>,
    /// Port the webhook server listens on
    pub port: u16,
    /// Configured storage locations, never empty
    pub storages: Vec<StorageLocation>,
    /// Fallback language for users without a supported Telegram language
    pub language: String,
    /// Conversation state expiry
    pub session: SessionConfig,
    /// Interval of the keep-alive ping in webhook mode
    pub self_ping_interval_secs: u64,
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bot_token = non_empty("TELEGRAM_BOT_TOKEN")
            .or_else(|| non_empty("BOT_TOKEN"))
            .ok_or_else(|| BotError::MissingEnv("TELEGRAM_BOT_TOKEN".to_string()))?;

        let database_url = non_empty("DATABASE_URL")
            .ok_or_else(|| BotError::MissingEnv("DATABASE_URL".to_string()))?;

        let webhook_url = match non_empty("WEBHOOK_URL") {
            Some(raw) => Some(Url::parse(raw.trim()).map_err(|e| BotError::InvalidEnv {
                key: "WEBHOOK_URL".to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let port = parse_number(non_empty("PORT"), "PORT", DEFAULT_PORT)?;

        let storages = parse_storages(
            non_empty("STORAGES")
                .as_deref()
                .unwrap_or(DEFAULT_STORAGES),
        )?;

        let language = non_empty("BOT_LANGUAGE")
            .map(|lang| lang.trim().to_lowercase())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let session = SessionConfig {
            state_ttl_secs: parse_number(
                non_empty("STATE_TTL_SECS"),
                "STATE_TTL_SECS",
                DEFAULT_STATE_TTL_SECS,
            )?,
            cleanup_interval_secs: parse_number(
                non_empty("STATE_CLEANUP_INTERVAL_SECS"),
                "STATE_CLEANUP_INTERVAL_SECS",
                DEFAULT_CLEANUP_INTERVAL_SECS,
            )?,
        };

        let self_ping_interval_secs = parse_number(
            non_empty("SELF_PING_INTERVAL_SECS"),
            "SELF_PING_INTERVAL_SECS",
            DEFAULT_SELF_PING_INTERVAL_SECS,
        )?;

        Ok(Self {
            bot_token,
            database_url,
            webhook_url,
            port,
            storages,
            language,
            session,
            self_ping_interval_secs,
        })
    }

    /// Address the webhook server binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn self_ping_interval(&self) -> Duration {
        Duration::from_secs(self.self_ping_interval_secs)
    }

    /// Look up a storage by its key
    pub fn storage(&self, key: &str) -> Option<&StorageLocation> {
        self.storages.iter().find(|storage| storage.key == key)
    }

    /// Look up a storage by the title shown on its button
    pub fn storage_by_title(&self, title: &str) -> Option<&StorageLocation> {
        let wanted = crate::text_processing::normalize_text(title);
        self.storages
            .iter()
            .find(|storage| crate::text_processing::normalize_text(&storage.title) == wanted)
    }

    /// Whether the storage selection step is skipped
    pub fn has_single_storage(&self) -> bool {
        self.storages.len() == 1
    }
}

fn parse_number<T>(raw: Option<String>, key: &str, default: T) -> Result<T, BotError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse::<T>().map_err(|e| BotError::InvalidEnv {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse `key:Title` pairs separated by commas.
///
/// An entry without a colon uses its lower-cased title as the key.
pub fn parse_storages(raw: &str) -> Result<Vec<StorageLocation>, BotError> {
    let mut storages: Vec<StorageLocation> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (key, title) = match entry.split_once(':') {
            Some((key, title)) => (key.trim().to_string(), title.trim().to_string()),
            None => (crate::text_processing::normalize_text(entry), entry.to_string()),
        };

        if key.is_empty() || title.is_empty() {
            return Err(BotError::InvalidEnv {
                key: "STORAGES".to_string(),
                reason: format!("empty key or title in {entry:?}"),
            });
        }

        if storages.iter().any(|existing| existing.key == key) {
            return Err(BotError::InvalidEnv {
                key: "STORAGES".to_string(),
                reason: format!("duplicate storage key {key:?}"),
            });
        }

        storages.push(StorageLocation { key, title });
    }

    if storages.is_empty() {
        return Err(BotError::InvalidEnv {
            key: "STORAGES".to_string(),
            reason: "no storages configured".to_string(),
        });
    }

    Ok(storages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storages_pairs() {
        let storages = parse_storages("a:Склад А, b:Склад Б").unwrap();
        assert_eq!(storages.len(), 2);
        assert_eq!(storages[0].key, "a");
        assert_eq!(storages[1].title, "Склад Б");
    }

    #[test]
    fn test_parse_storages_without_key() {
        let storages = parse_storages("Garage").unwrap();
        assert_eq!(storages[0].key, "garage");
        assert_eq!(storages[0].title, "Garage");
    }

    #[test]
    fn test_parse_storages_rejects_duplicates() {
        assert!(parse_storages("a:One,a:Two").is_err());
        assert!(parse_storages(" , ").is_err());
    }
}

//! # Keep-alive Module
//!
//! Hosting platforms put idle web services to sleep. In webhook mode the bot
//! periodically requests its own `/health` endpoint through the public URL.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Path of the health endpoint served next to the webhook
pub const HEALTH_PATH: &str = "/health";

/// Body returned by the health endpoint
pub const HEALTH_RESPONSE: &str = "OK";

/// Health URL on the same host as the webhook URL
pub fn health_url(webhook_url: &Url) -> Result<Url> {
    webhook_url
        .join(HEALTH_PATH)
        .with_context(|| format!("Failed to build health URL from {webhook_url}"))
}

/// Handler for `GET /health`
pub async fn health() -> &'static str {
    HEALTH_RESPONSE
}

/// Request `url` every `interval` until the process exits
pub fn spawn_self_ping(url: Url, interval: Duration) -> JoinHandle<()> {
    info!(url = %url, interval_secs = interval.as_secs(), "Starting self-ping");

    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; the server is still starting
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(status = %response.status(), "Self-ping succeeded");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Self-ping returned an error status");
                }
                Err(e) => warn!(error = %e, "Self-ping failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_replaces_path() {
        let webhook = Url::parse("https://bot.example.com/webhook").unwrap();
        assert_eq!(
            health_url(&webhook).unwrap().as_str(),
            "https://bot.example.com/health"
        );
    }

    #[tokio::test]
    async fn test_health_handler() {
        assert_eq!(health().await, "OK");
    }
}

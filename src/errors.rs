//! # Error Types Module
//!
//! Named failures of the inventory bot. Everything else travels as
//! `anyhow::Error` with context attached at the call site.

/// Custom error types for configuration and update parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// A required environment variable is absent
    MissingEnv(String),
    /// An environment variable is present but cannot be parsed
    InvalidEnv { key: String, reason: String },
    /// Callback data that does not match any known action
    MalformedCallback(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::MissingEnv(key) => write!(f, "Missing environment variable: {key}"),
            BotError::InvalidEnv { key, reason } => {
                write!(f, "Invalid environment variable {key}: {reason}")
            }
            BotError::MalformedCallback(data) => write!(f, "Malformed callback data: {data:?}"),
        }
    }
}

impl std::error::Error for BotError {}

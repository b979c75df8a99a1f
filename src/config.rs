use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "Sprout";

/// Maximum user-authored messages per chat session.
pub const DEFAULT_MESSAGE_LIMIT: usize = 10;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LONG_PRESS_MILLIS: u64 = 1500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the farm-management backend, without trailing slash.
    pub backend_base_url: String,
    /// Full URL of the AI generate endpoint (the API key is appended as a
    /// query parameter, not sent as a bearer token).
    pub ai_endpoint: String,
    pub ai_api_key: String,
    pub message_limit: usize,
    pub request_timeout_secs: u64,
    pub long_press_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:3000/v1".to_string(),
            ai_endpoint:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
                    .to_string(),
            ai_api_key: String::new(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            long_press_millis: DEFAULT_LONG_PRESS_MILLIS,
        }
    }
}

impl AppConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_base_url: std::env::var("SPROUT_BACKEND_URL")
                .unwrap_or(defaults.backend_base_url),
            ai_endpoint: std::env::var("SPROUT_AI_ENDPOINT").unwrap_or(defaults.ai_endpoint),
            ai_api_key: std::env::var("SPROUT_AI_KEY").unwrap_or(defaults.ai_api_key),
            message_limit: std::env::var("SPROUT_MESSAGE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.message_limit),
            request_timeout_secs: std::env::var("SPROUT_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            long_press_millis: defaults.long_press_millis,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn long_press_threshold(&self) -> Duration {
        Duration::from_millis(self.long_press_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.message_limit, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.long_press_threshold(), Duration::from_millis(1500));
    }
}

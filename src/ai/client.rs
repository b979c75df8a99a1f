use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::wire::{Content, GenerateRequest, GenerateResponse, Part};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Seam between the prompt-building layers and the AI transport, so the
/// pipeline and namer can run against a scripted generator in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, parts: Vec<Part>) -> Result<String, AiError>;
}

/// Transport to the AI endpoint. The provider key travels as a query
/// parameter on the endpoint URL, not as a bearer header.
pub struct AiClient {
    http: Client,
    endpoint: Url,
}

impl AiClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, AiError> {
        let mut endpoint =
            Url::parse(endpoint).map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        if !api_key.is_empty() {
            endpoint.query_pairs_mut().append_pair("key", api_key);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self { http, endpoint })
    }

    /// Pull a readable message out of the provider's JSON error body.
    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(msg) = parsed["error"]["message"].as_str() {
                return format!("HTTP {}: {}", status.as_u16(), msg);
            }
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }
}

#[async_trait]
impl TextGenerator for AiClient {
    async fn generate(&self, parts: Vec<Part>) -> Result<String, AiError> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(AiError::RequestFailed(
                error.message.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        parsed
            .first_text()
            .ok_or_else(|| AiError::InvalidResponse("No content in response".to_string()))
    }
}

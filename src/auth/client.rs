use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;
use super::token_store::{StoredAuth, TokenStore};
use super::wire::RefreshResponse;

const REFRESH_PATH: &str = "/auth/refresh-tokens";

/// HTTP client for the farm-management backend. Attaches the bearer token
/// from the store and, on a 401, performs exactly one refresh-and-retry
/// cycle per logical request. Every authenticated call in the system goes
/// through here.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    store: TokenStore,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, store: TokenStore, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into(),
            store,
        }
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Issue an authenticated request and return the 2xx response body.
    ///
    /// A 401 triggers a single refresh-and-retry; any other non-2xx status
    /// is surfaced unmodified as `Server {status, body}`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        let token = self.store.get().await.map(|a| a.tokens.access_token);

        let response = self
            .execute(method.clone(), path, body, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::into_body(response).await;
        }

        // 401: refresh once, then retry the original request once.
        let access = self.refresh_tokens().await?;
        let response = self.execute(method, path, body, Some(access.as_str())).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // The freshly minted token was rejected too; no second refresh.
            return Err(ApiError::AuthExpired);
        }
        Self::into_body(response).await
    }

    /// Request without bearer attachment or refresh handling, for the auth
    /// endpoints themselves (login, register).
    pub async fn request_public(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        let response = self.execute(method, path, body, None).await?;
        Self::into_body(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.request(Method::GET, path, None).await?;
        Self::parse(&body)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        let text = self.request(Method::POST, path, Some(body)).await?;
        Self::parse(&text)
    }

    pub async fn delete_with_body(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        self.request(Method::DELETE, path, Some(body)).await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, &url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(json) = body {
            builder = builder.json(json);
        }
        builder.send().await.map_err(ApiError::from_transport)
    }

    /// Exchange the stored refresh token for a new pair. Any failure here is
    /// unrecoverable for the session: the store is cleared and the caller
    /// gets `AuthExpired`. Returns the new access token on success.
    async fn refresh_tokens(&self) -> Result<String, ApiError> {
        let stored = self.store.get().await;
        let Some(stored) = stored else {
            return Err(ApiError::AuthExpired);
        };

        tracing::debug!("Access token rejected, attempting refresh");

        let body = serde_json::json!({ "refreshToken": stored.tokens.refresh_token });
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let response = match self.http.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                self.expire().await;
                tracing::warn!(error = %e, "Token refresh failed");
                return Err(ApiError::AuthExpired);
            }
        };

        if !response.status().is_success() {
            self.expire().await;
            tracing::warn!(status = %response.status(), "Token refresh rejected");
            return Err(ApiError::AuthExpired);
        }

        let refreshed: RefreshResponse = match response.json().await {
            Ok(r) => r,
            Err(_) => {
                self.expire().await;
                return Err(ApiError::AuthExpired);
            }
        };

        let pair = refreshed.tokens.into_pair();
        let access = pair.access_token.clone();
        if let Err(e) = self
            .store
            .set(StoredAuth {
                tokens: pair,
                user: stored.user,
            })
            .await
        {
            tracing::warn!(error = %e, "Failed to persist refreshed tokens");
        }

        Ok(access)
    }

    async fn expire(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "Failed to clear token store");
        }
    }

    async fn into_body(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Server {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn parse<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

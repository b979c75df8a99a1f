use reqwest::Method;

use super::client::BackendClient;
use super::error::ApiError;
use super::token_store::StoredAuth;
use super::wire::AuthResponse;
use crate::models::Session;

/// Login, registration and logout against the backend's auth resource.
/// The only component besides `BackendClient` that writes the token store.
pub struct AuthService {
    client: BackendClient,
}

impl AuthService {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.authenticate("/auth/login", &body).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        self.authenticate("/auth/register", &body).await
    }

    /// Best-effort server-side logout; the local store is cleared regardless
    /// of whether the backend call succeeds.
    pub async fn logout(&self) {
        if let Some(auth) = self.client.token_store().get().await {
            let body = serde_json::json!({ "refreshToken": auth.tokens.refresh_token });
            if let Err(e) = self
                .client
                .request_public(Method::POST, "/auth/logout", Some(&body))
                .await
            {
                tracing::debug!(error = %e, "Server-side logout failed");
            }
        }
        if let Err(e) = self.client.token_store().clear().await {
            tracing::warn!(error = %e, "Failed to clear token store on logout");
        }
    }

    /// Authentication state derived from the store.
    pub async fn session(&self) -> Session {
        match self.client.token_store().get().await {
            Some(auth) => Session {
                is_authenticated: true,
                user: auth.user,
            },
            None => Session::unauthenticated(),
        }
    }

    async fn authenticate(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Session, ApiError> {
        let text = self
            .client
            .request_public(Method::POST, path, Some(body))
            .await?;
        let parsed: AuthResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let user = parsed.user;
        if let Err(e) = self
            .client
            .token_store()
            .set(StoredAuth {
                tokens: parsed.tokens.into_pair(),
                user: Some(user.clone()),
            })
            .await
        {
            tracing::warn!(error = %e, "Failed to persist credentials");
        }

        Ok(Session {
            is_authenticated: true,
            user: Some(user),
        })
    }
}

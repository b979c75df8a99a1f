use serde::Deserialize;

use crate::models::{TokenPair, UserProfile};

// Wire shapes for the backend's auth resource. The token envelope nests
// each token one level deep: {tokens: {access: {token}, refresh: {token}}}.

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub user: UserProfile,
    pub tokens: TokenEnvelope,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub tokens: TokenEnvelope,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenEnvelope {
    pub access: TokenValue,
    pub refresh: TokenValue,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenValue {
    pub token: String,
}

impl TokenEnvelope {
    pub fn into_pair(self) -> TokenPair {
        TokenPair {
            access_token: self.access.token,
            refresh_token: self.refresh.token,
        }
    }
}

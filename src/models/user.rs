use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Opaque access/refresh token pair. Owned by the token store; no other
/// component keeps a copy beyond the lifetime of a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication state derived from the token store. Recomputed on
/// startup and after every refresh attempt, never stored.
#[derive(Debug, Clone)]
pub struct Session {
    pub is_authenticated: bool,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            user: None,
        }
    }
}

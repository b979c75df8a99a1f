use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::{TokenPair, UserProfile};

/// Everything the client persists about an authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAuth {
    pub tokens: TokenPair,
    pub user: Option<UserProfile>,
}

/// Durable holder of the access/refresh token pair, backed by a JSON file.
///
/// The path is injectable so the refresh contract can be tested against a
/// temporary directory. Writers are the auth service (login, logout) and the
/// backend client (refresh); every other component treats the store as
/// read-only.
#[derive(Clone)]
pub struct TokenStore {
    path: Arc<PathBuf>,
    cached: Arc<RwLock<Option<StoredAuth>>>,
}

impl TokenStore {
    /// Open the store at `path`, loading any persisted auth from a previous
    /// run. A missing or unreadable file starts the store empty.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let cached = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StoredAuth>(&bytes) {
                Ok(auth) => Some(auth),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable auth file");
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            path: Arc::new(path),
            cached: Arc::new(RwLock::new(cached)),
        }
    }

    /// Default on-disk location under the user's config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sprout")
            .join("auth.json")
    }

    pub async fn get(&self) -> Option<StoredAuth> {
        self.cached.read().await.clone()
    }

    pub async fn set(&self, auth: StoredAuth) -> Result<()> {
        {
            let mut cached = self.cached.write().await;
            *cached = Some(auth.clone());
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create auth directory")?;
        }
        let json = serde_json::to_vec_pretty(&auth).context("Failed to serialize auth")?;
        tokio::fs::write(self.path.as_ref(), json)
            .await
            .context("Failed to persist auth file")?;

        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        {
            let mut cached = self.cached.write().await;
            *cached = None;
        }

        match tokio::fs::remove_file(self.path.as_ref()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove auth file"),
        }
    }
}

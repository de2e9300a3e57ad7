//! Token Store: the persisted credential for the control server.
//!
//! The token lives in a small JSON file, `{ "authenticationToken": "..." }`,
//! written once by the bootstrap flow and read on every trigger. Reads never
//! lock: concurrent triggers may load the same file at once.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::AvatarError;

/// An authentication token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the authentication request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("AuthToken(<empty>)")
        } else {
            f.write_str("AuthToken(***)")
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenFile {
    authentication_token: String,
}

/// Reads and writes the token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// A store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::MissingToken`] if the file is absent, unreadable,
    /// malformed, or holds an empty token.
    pub async fn load(&self) -> Result<AuthToken, AvatarError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AvatarError::MissingToken(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let file: TokenFile = serde_json::from_str(&content).map_err(|e| {
            AvatarError::MissingToken(format!("malformed {}: {e}", self.path.display()))
        })?;
        if file.authentication_token.trim().is_empty() {
            return Err(AvatarError::MissingToken(format!(
                "empty token in {}",
                self.path.display()
            )));
        }
        debug!(path = %self.path.display(), "loaded authentication token");
        Ok(AuthToken(file.authentication_token))
    }

    /// Persist `token`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::Storage`] if the file cannot be written.
    pub async fn save(&self, token: &AuthToken) -> Result<(), AvatarError> {
        let write_err =
            |e: std::io::Error| AvatarError::Storage(format!("cannot write {}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(&TokenFile {
            authentication_token: token.0.clone(),
        })
        .map_err(|e| AvatarError::Storage(format!("cannot encode token: {e}")))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(write_err)?;
        info!(path = %self.path.display(), "saved authentication token");
        Ok(())
    }
}

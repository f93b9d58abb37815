//! Identity provider.
//!
//! Turns a bearer credential into a [`Principal`]. Issuing and validating
//! real tokens is someone else's job; the shipped [`TokenDirectory`] maps
//! opaque tokens to users from a JSON file.

use crate::types::{Principal, Role, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The credential matches no user
    #[error("Invalid or expired token")]
    UnknownToken,
    /// The directory could not be loaded
    #[error("Identity directory error: {0}")]
    Directory(String),
}

/// Contact details shown to the other party of a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name
    pub name: String,
    /// Phone number
    pub phone: String,
    /// Account role
    pub role: Role,
}

/// Resolves credentials and user profiles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Who is behind `token`.
    ///
    /// Deactivated accounts still authenticate; the policy gate refuses
    /// them with `AccountInactive`.
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownToken`] if the token is not recognised.
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;

    /// Profile of a user, if known.
    async fn profile(&self, user_id: UserId) -> Option<Profile>;
}

/// One directory entry as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Opaque bearer token
    pub token: String,
    /// User it belongs to
    pub user_id: UserId,
    /// Role
    pub role: Role,
    /// Account flag
    #[serde(default = "default_active")]
    pub active: bool,
    /// Display name
    pub name: String,
    /// Phone number
    #[serde(default)]
    pub phone: String,
}

const fn default_active() -> bool {
    true
}

#[derive(Default)]
struct Directory {
    by_token: HashMap<String, Principal>,
    profiles: HashMap<UserId, Profile>,
}

/// Static token → user table.
#[derive(Default)]
pub struct TokenDirectory {
    inner: RwLock<Directory>,
}

impl TokenDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of [`DirectoryEntry`].
    ///
    /// # Errors
    ///
    /// [`AuthError::Directory`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let entries: Vec<DirectoryEntry> =
            serde_json::from_str(json).map_err(|e| AuthError::Directory(e.to_string()))?;
        let directory = Self::new();
        for entry in entries {
            directory.insert(entry);
        }
        Ok(directory)
    }

    /// Load a JSON file of [`DirectoryEntry`].
    ///
    /// # Errors
    ///
    /// [`AuthError::Directory`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Directory(format!("{}: {e}", path.display())))?;
        let directory = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), users = directory.len(), "Identity directory loaded");
        Ok(directory)
    }

    /// Add or replace an entry.
    pub fn insert(&self, entry: DirectoryEntry) {
        let mut directory = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        directory.by_token.insert(
            entry.token,
            Principal {
                user_id: entry.user_id,
                role: entry.role,
                active: entry.active,
            },
        );
        directory.profiles.insert(
            entry.user_id,
            Profile {
                name: entry.name,
                phone: entry.phone,
                role: entry.role,
            },
        );
    }

    /// Number of known users
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .profiles
            .len()
    }

    /// Whether the directory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentityProvider for TokenDirectory {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_token
            .get(token)
            .copied()
            .ok_or(AuthError::UnknownToken)
    }

    async fn profile(&self, user_id: UserId) -> Option<Profile> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .profiles
            .get(&user_id)
            .cloned()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"[
        {"token": "tok-p", "user_id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff", "role": "passenger", "name": "Rahim", "phone": "01700000000"},
        {"token": "tok-s", "user_id": "7f9619ff-8b86-d011-b42d-00cf4fc964ff", "role": "supervisor", "active": false, "name": "Karim"}
    ]"#;

    #[tokio::test]
    async fn tokens_resolve_to_principals() {
        let directory = TokenDirectory::from_json(DIRECTORY).expect("valid json");
        assert_eq!(directory.len(), 2);

        let passenger = directory.authenticate("tok-p").await.expect("known");
        assert_eq!(passenger.role, Role::Passenger);
        assert!(passenger.active);

        let supervisor = directory.authenticate("tok-s").await.expect("known");
        assert!(!supervisor.active);

        assert_eq!(directory.authenticate("nope").await, Err(AuthError::UnknownToken));
    }

    #[tokio::test]
    async fn profiles_are_kept() {
        let directory = TokenDirectory::from_json(DIRECTORY).expect("valid json");
        let passenger = directory.authenticate("tok-p").await.expect("known");

        let profile = directory.profile(passenger.user_id).await.expect("profile");
        assert_eq!(profile.name, "Rahim");
        assert_eq!(profile.phone, "01700000000");
    }

    #[test]
    fn malformed_directory_is_an_error() {
        assert!(matches!(
            TokenDirectory::from_json("{not json"),
            Err(AuthError::Directory(_))
        ));
    }
}

//! Session store - auth token and user identity, persisted across runs
//!
//! The session is written once at login, read by every outbound request and
//! cleared at logout. It is an explicit object handed to the API client at
//! construction; nothing reads it through globals.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::models::Role;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub full_name: String,
}

/// Loads and saves the session file under the user's config directory
#[derive(Clone)]
pub struct SessionStore {
    config_dir: PathBuf,
}

impl SessionStore {
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prontui");
        SessionStore { config_dir }
    }

    #[allow(dead_code)] // used by tests to avoid touching the real home dir
    pub fn with_dir(config_dir: PathBuf) -> Self {
        SessionStore { config_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.config_dir.join("session.yaml")
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Load the persisted session, if any. Unreadable or stale files are
    /// treated as no session rather than an error.
    pub fn load(&self) -> Option<Session> {
        let content = fs::read_to_string(self.session_path()).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        self.ensure_dir()?;
        let content = serde_yaml::to_string(session)?;
        fs::write(self.session_path(), content)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory where downloaded PDFs are written
pub fn download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn sample() -> Session {
        Session {
            token: "abc123".to_string(),
            role: Role::Medico,
            full_name: "Dra. Ana Souza".to_string(),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path().join("cfg"));

        assert!(store.load().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), Some(sample()));
    }

    #[test]
    fn test_clear_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        store.save(&sample()).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("session.yaml"), "{not yaml: [").unwrap();
        assert!(store.load().is_none());
    }
}

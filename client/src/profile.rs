use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Client-local settings that outlive the process. Only the display name
/// for now; the transient session id is deliberately NOT here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub player_name: Option<String>,
}

/// Reads and writes the profile under the platform config directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new() -> Option<Self> {
        ProjectDirs::from("", "", "keyduel")
            .map(|dirs| Self {
                path: dirs.config_dir().join("profile.json"),
            })
    }

    /// Explicit location, used by tests.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing or unreadable file is just an empty profile.
    pub fn load(&self) -> Profile {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, profile: &Profile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create profile dir {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(profile).context("encode profile")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("write profile {}", self.path.display()))
    }

    /// Stores the trimmed name; a blank name is ignored, matching the UI
    /// contract that you cannot save an empty display name.
    pub fn set_player_name(&self, name: &str) -> Result<Profile> {
        let trimmed = name.trim();
        let mut profile = self.load();
        if !trimmed.is_empty() {
            profile.player_name = Some(trimmed.to_string());
            self.save(&profile)?;
        }
        Ok(profile)
    }

    pub fn reset_player_name(&self) -> Result<Profile> {
        let mut profile = self.load();
        profile.player_name = None;
        self.save(&profile)?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("profile.json"));
        let saved = store.set_player_name("  Ann  ").unwrap();
        assert_eq!(saved.player_name.as_deref(), Some("Ann"));
        assert_eq!(store.load().player_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn blank_names_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("profile.json"));
        store.set_player_name("Ann").unwrap();
        store.set_player_name("   ").unwrap();
        assert_eq!(store.load().player_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn reset_clears_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("profile.json"));
        store.set_player_name("Ann").unwrap();
        store.reset_player_name().unwrap();
        assert_eq!(store.load().player_name, None);
    }

    #[test]
    fn missing_file_loads_an_empty_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("nope.json"));
        assert_eq!(store.load(), Profile::default());
    }
}

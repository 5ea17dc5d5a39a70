use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::DEFAULT_RANK_LIMIT;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredPreferences {
    pub chart_visible: bool,
    pub menu_visible: bool,
    pub real_name_visible: bool,
    pub rank_limit: u32,
}

impl Default for StoredPreferences {
    fn default() -> Self {
        Self {
            chart_visible: true,
            menu_visible: true,
            real_name_visible: false,
            rank_limit: DEFAULT_RANK_LIMIT,
        }
    }
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> StoredPreferences;
    fn save(&self, preferences: &StoredPreferences);
}

#[derive(Default)]
pub struct MemoryPreferences {
    inner: Mutex<StoredPreferences>,
}

impl MemoryPreferences {
    pub fn new(preferences: StoredPreferences) -> Self {
        Self {
            inner: Mutex::new(preferences),
        }
    }

    pub fn current(&self) -> StoredPreferences {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> StoredPreferences {
        self.current()
    }

    fn save(&self, preferences: &StoredPreferences) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = *preferences;
    }
}

pub struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn load(&self) -> StoredPreferences {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored rank preferences");
                return StoredPreferences::default();
            }
            Err(err) => {
                warn!(?err, path = %self.path.display(), "failed to read rank preferences");
                return StoredPreferences::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(preferences) => preferences,
            Err(err) => {
                warn!(?err, path = %self.path.display(), "ignoring malformed rank preferences");
                StoredPreferences::default()
            }
        }
    }

    fn save(&self, preferences: &StoredPreferences) {
        let body = match serde_json::to_vec_pretty(preferences) {
            Ok(body) => body,
            Err(err) => {
                warn!(?err, "failed to encode rank preferences");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, body) {
            warn!(?err, path = %self.path.display(), "failed to persist rank preferences");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_preferences_round_trip_and_fall_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        let store = JsonFilePreferences::new(&path);
        assert_eq!(store.load(), StoredPreferences::default());

        let custom = StoredPreferences {
            chart_visible: false,
            menu_visible: true,
            real_name_visible: true,
            rank_limit: 50,
        };
        store.save(&custom);
        assert_eq!(store.load(), custom);

        fs::write(&path, b"{not json").expect("write garbage");
        assert_eq!(store.load(), StoredPreferences::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, br#"{"rankLimit": 100}"#).expect("write prefs");
        let loaded = JsonFilePreferences::new(&path).load();
        assert_eq!(loaded.rank_limit, 100);
        assert!(loaded.chart_visible);
        assert!(!loaded.real_name_visible);
    }
}

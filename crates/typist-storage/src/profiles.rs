//! Profile lookup and persistence of the mutable Custom profile.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use typist_core::error::{Result, TypistError};
use typist_core::types::{LastUsedSettings, Profile, ProfileEntry, CUSTOM_PROFILE};

use crate::settings::SettingsStore;

const CUSTOM_PROFILE_KEY: &str = "profiles.custom";
const LAST_USED_KEY: &str = "session.last_used";

/// Serves the four built-in profiles plus the persisted Custom profile.
pub struct ProfileStore {
    backend: Arc<dyn SettingsStore>,
    custom: RwLock<Profile>,
}

impl ProfileStore {
    /// Load the Custom profile from `backend`.
    ///
    /// A missing or unreadable record falls back to the default Custom profile.
    pub fn load(backend: Arc<dyn SettingsStore>) -> Self {
        let custom = match backend.get(CUSTOM_PROFILE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Profile>(&raw) {
                Ok(mut profile) if profile.validate().is_ok() => {
                    profile.name = CUSTOM_PROFILE.to_string();
                    profile
                }
                Ok(_) => {
                    warn!("Stored custom profile is invalid, using defaults");
                    Profile::default_custom()
                }
                Err(e) => {
                    warn!("Failed to parse stored custom profile: {}", e);
                    Profile::default_custom()
                }
            },
            Ok(None) => Profile::default_custom(),
            Err(e) => {
                warn!("Failed to read custom profile: {}", e);
                Profile::default_custom()
            }
        };

        Self {
            backend,
            custom: RwLock::new(custom),
        }
    }

    /// Built-ins first, then Custom.
    pub fn list(&self) -> Result<Vec<ProfileEntry>> {
        let mut entries: Vec<ProfileEntry> = Profile::builtins()
            .into_iter()
            .map(|profile| ProfileEntry {
                builtin: true,
                profile,
            })
            .collect();
        entries.push(ProfileEntry {
            builtin: false,
            profile: self.custom()?,
        });
        Ok(entries)
    }

    /// Look up a profile by name, ignoring case.
    pub fn get(&self, name: &str) -> Result<Profile> {
        let wanted = name.trim();
        if wanted.eq_ignore_ascii_case(CUSTOM_PROFILE) {
            return self.custom();
        }
        Profile::builtins()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TypistError::NotFound(format!("profile {}", name)))
    }

    pub fn custom(&self) -> Result<Profile> {
        self.custom
            .read()
            .map(|p| p.clone())
            .map_err(|e| TypistError::Internal(format!("Profile lock poisoned: {}", e)))
    }

    /// Replace the Custom profile.
    ///
    /// The in-memory copy is always updated once validation passes; a failed
    /// write to the backend is logged and otherwise ignored.
    pub fn save_custom(&self, mut profile: Profile) -> Result<Profile> {
        profile.name = CUSTOM_PROFILE.to_string();
        profile.validate()?;

        {
            let mut custom = self
                .custom
                .write()
                .map_err(|e| TypistError::Internal(format!("Profile lock poisoned: {}", e)))?;
            *custom = profile.clone();
        }

        let raw = serde_json::to_string(&profile)?;
        if let Err(e) = self.backend.set(CUSTOM_PROFILE_KEY, &raw) {
            warn!("Failed to persist custom profile: {}", e);
        } else {
            debug!("Custom profile saved");
        }
        Ok(profile)
    }

    /// Record the settings of the most recent start. Failures are logged only.
    pub fn remember_last_used(&self, settings: &LastUsedSettings) {
        let raw = match serde_json::to_string(settings) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialise last-used settings: {}", e);
                return;
            }
        };
        if let Err(e) = self.backend.set(LAST_USED_KEY, &raw) {
            warn!("Failed to persist last-used settings: {}", e);
        }
    }

    pub fn last_used(&self) -> Option<LastUsedSettings> {
        match self.backend.get(LAST_USED_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map_err(|e| warn!("Failed to parse last-used settings: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read last-used settings: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::settings::{MemorySettings, SettingsRepository};
    use typist_core::types::SessionOverrides;

    /// Backend whose writes always fail.
    struct ReadOnlySettings;

    impl SettingsStore for ReadOnlySettings {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(TypistError::Storage("read-only".to_string()))
        }
    }

    fn memory_store() -> ProfileStore {
        ProfileStore::load(Arc::new(MemorySettings::new()))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[test]
    fn test_list_has_builtins_and_custom() {
        let store = memory_store();
        let entries = store.list().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.profile.name.as_str()).collect();
        assert_eq!(names, vec!["Slow", "Medium", "Fast", "Lightning", "Custom"]);
        assert!(entries[..4].iter().all(|e| e.builtin));
        assert!(!entries[4].builtin);
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let store = memory_store();
        assert_eq!(store.get("fast").unwrap().name, "Fast");
        assert_eq!(store.get("LIGHTNING").unwrap().name, "Lightning");
        assert_eq!(store.get("custom").unwrap().name, "Custom");
    }

    #[test]
    fn test_get_unknown_profile() {
        let store = memory_store();
        let err = store.get("Turbo").unwrap_err();
        assert!(matches!(err, TypistError::NotFound(_)));
    }

    // =========================================================================
    // Custom profile
    // =========================================================================

    #[test]
    fn test_save_custom_renames_and_persists() {
        let backend = Arc::new(MemorySettings::new());
        let store = ProfileStore::load(backend.clone());

        let saved = store
            .save_custom(Profile {
                name: "Mine".to_string(),
                min_delay_ms: 90,
                max_delay_ms: 120,
                ..Profile::fast()
            })
            .unwrap();
        assert_eq!(saved.name, "Custom");
        assert_eq!(store.get("Custom").unwrap().min_delay_ms, 90);

        let reloaded = ProfileStore::load(backend);
        assert_eq!(reloaded.custom().unwrap().max_delay_ms, 120);
    }

    #[test]
    fn test_save_custom_rejects_invalid() {
        let store = memory_store();
        let err = store
            .save_custom(Profile {
                min_delay_ms: 500,
                max_delay_ms: 10,
                ..Profile::medium()
            })
            .unwrap_err();
        assert!(matches!(err, TypistError::Validation(_)));
        assert_eq!(store.custom().unwrap(), Profile::default_custom());
    }

    #[test]
    fn test_save_custom_survives_backend_failure() {
        let store = ProfileStore::load(Arc::new(ReadOnlySettings));
        let saved = store
            .save_custom(Profile {
                typo_chance: 0.1,
                ..Profile::medium()
            })
            .unwrap();
        assert_eq!(saved.typo_chance, 0.1);
        assert_eq!(store.custom().unwrap().typo_chance, 0.1);
    }

    #[test]
    fn test_load_ignores_corrupt_record() {
        let backend = Arc::new(MemorySettings::new());
        backend.set(CUSTOM_PROFILE_KEY, "not json").unwrap();
        let store = ProfileStore::load(backend);
        assert_eq!(store.custom().unwrap(), Profile::default_custom());
    }

    #[test]
    fn test_custom_persists_in_sqlite() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = ProfileStore::load(Arc::new(SettingsRepository::new(db.clone())));
        store
            .save_custom(Profile {
                pause_frequency: 0,
                ..Profile::slow()
            })
            .unwrap();

        let reloaded = ProfileStore::load(Arc::new(SettingsRepository::new(db)));
        assert_eq!(reloaded.custom().unwrap().pause_frequency, 0);
    }

    // =========================================================================
    // Last used
    // =========================================================================

    #[test]
    fn test_last_used_round_trip() {
        let store = memory_store();
        assert!(store.last_used().is_none());

        let settings = LastUsedSettings {
            profile_name: "Fast".to_string(),
            overrides: SessionOverrides {
                custom_wpm: Some(95.0),
                ..SessionOverrides::default()
            },
        };
        store.remember_last_used(&settings);
        assert_eq!(store.last_used(), Some(settings));
    }
}

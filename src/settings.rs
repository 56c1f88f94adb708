//! Session settings
//!
//! Native builds read `config.local.json`, then `dungeon.json`, falling back
//! to defaults. Web builds keep the record in LocalStorage.

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEBOUNCE_MS, DEFAULT_NAMESPACE, DEFAULT_ROSTER_SIZE, DEFAULT_SLOT, FACES_ON_DIE,
};
use crate::persistence::{ACTIVE_SUFFIX, RegistryConfig};

/// Settings loading failure
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Key prefix for every slot
    pub namespace: String,
    /// Slot used on first run and after the active slot is deleted
    pub default_slot: String,
    /// Faces on the initiative die
    pub faces_on_die: u32,
    /// Quiet period before an edit is written
    pub debounce_ms: u64,
    /// Placeholder participants in a fresh slot
    pub default_roster_size: usize,
    /// End the fresh roster with a dungeon master
    pub include_dungeon_master: bool,
    /// Fixed RNG seed for reproducible sessions
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_slot: DEFAULT_SLOT.to_string(),
            faces_on_die: FACES_ON_DIE,
            debounce_ms: DEBOUNCE_MS,
            default_roster_size: DEFAULT_ROSTER_SIZE,
            include_dungeon_master: false,
            seed: None,
        }
    }
}

impl Settings {
    /// Local override, checked first
    pub const LOCAL_CONFIG: &'static str = "config.local.json";
    /// Shipped configuration
    pub const DEFAULT_CONFIG: &'static str = "dungeon.json";
    /// LocalStorage key
    pub const STORAGE_KEY: &'static str = "roll_keeper_settings";

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.namespace.trim().is_empty() {
            return Err(SettingsError::Invalid("namespace is empty".to_string()));
        }
        if self.default_slot.trim().is_empty() {
            return Err(SettingsError::Invalid("default_slot is empty".to_string()));
        }
        if self.default_slot == ACTIVE_SUFFIX {
            return Err(SettingsError::Invalid(format!(
                "default_slot {:?} is reserved",
                ACTIVE_SUFFIX
            )));
        }
        if self.faces_on_die < 2 {
            return Err(SettingsError::Invalid(format!(
                "faces_on_die must be at least 2, got {}",
                self.faces_on_die
            )));
        }
        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            namespace: self.namespace.clone(),
            default_slot: self.default_slot.clone(),
            default_roster_size: self.default_roster_size,
            include_dungeon_master: self.include_dungeon_master,
            seed: self.seed,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from the first readable config file (native)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        for path in [Self::LOCAL_CONFIG, Self::DEFAULT_CONFIG] {
            match Self::load_from(path) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path);
                    return settings;
                }
                Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Ignoring {}: {}", path, e),
            }
        }
        log::info!("Using default settings");
        Self::default()
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        use crate::platform::{KeyValueStore, LocalStorage};

        if let Some(json) = LocalStorage::open().and_then(|s| s.get_item(Self::STORAGE_KEY)) {
            match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
                Err(e) => log::warn!("Ignoring stored settings: {}", e),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        use crate::platform::{KeyValueStore, LocalStorage};

        let Some(storage) = LocalStorage::open() else {
            return;
        };
        match serde_json::to_string(self) {
            Ok(json) => match storage.set_item(Self::STORAGE_KEY, &json) {
                Ok(()) => log::info!("Settings saved"),
                Err(e) => log::warn!("Failed to save settings: {}", e),
            },
            Err(e) => log::warn!("Failed to encode settings: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = Settings::from_json(r#"{"namespace": "crypt", "seed": 7}"#).unwrap();
        assert_eq!(settings.namespace, "crypt");
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.faces_on_die, 20);
        assert_eq!(settings.debounce_ms, 500);
        assert_eq!(settings.default_slot, "default");
    }

    #[test]
    fn rejects_unusable_values() {
        for json in [
            r#"{"namespace": ""}"#,
            r#"{"default_slot": " "}"#,
            r#"{"default_slot": "active"}"#,
            r#"{"faces_on_die": 1}"#,
        ] {
            assert!(
                matches!(Settings::from_json(json), Err(SettingsError::Invalid(_))),
                "{} should be rejected",
                json
            );
        }
        assert!(matches!(
            Settings::from_json("not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn registry_config_carries_roster_options() {
        let settings = Settings {
            include_dungeon_master: true,
            default_roster_size: 3,
            seed: Some(5),
            ..Settings::default()
        };
        let config = settings.registry_config();
        assert!(config.include_dungeon_master);
        assert_eq!(config.default_roster_size, 3);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.namespace, "default");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn load_from_reads_a_file() {
        let path = std::env::temp_dir()
            .join(format!("roll-keeper-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"debounce_ms": 50}"#).unwrap();
        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.debounce_ms, 50);

        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Io(_))
        ));
    }
}

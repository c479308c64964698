//! Save blob persistence
//!
//! The blob is a flat JSON record: meta currency, purchased upgrade levels,
//! settings and lifetime stats. Loading never fails toward the caller;
//! damaged data is repaired field by field against the defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::settings::Settings;

/// Storage key / file stem
pub const SAVE_KEY: &str = "bulletcore_save";

/// Save backend failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Backend missing in this environment (no window, storage disabled)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Lifetime statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaStats {
    pub runs_played: u32,
    pub best_wave: u32,
    pub boss1_defeated: bool,
    pub boss2_defeated: bool,
}

impl MetaStats {
    fn repair(value: &Value) -> Self {
        let mut stats = Self::default();
        let Some(obj) = value.as_object() else {
            return stats;
        };
        if let Some(v) = obj.get("runsPlayed").and_then(as_count) {
            stats.runs_played = v;
        }
        if let Some(v) = obj.get("bestWave").and_then(as_count) {
            stats.best_wave = v;
        }
        if let Some(v) = obj.get("boss1Defeated").and_then(Value::as_bool) {
            stats.boss1_defeated = v;
        }
        if let Some(v) = obj.get("boss2Defeated").and_then(Value::as_bool) {
            stats.boss2_defeated = v;
        }
        stats
    }
}

/// Everything that outlives a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBlob {
    pub meta_currency: u32,
    pub meta_upgrades: BTreeMap<String, u32>,
    pub settings: Settings,
    pub stats: MetaStats,
}

/// Non-negative whole number, rounding fractional input
fn as_count(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, u32::MAX as f64) as u32)
}

impl SaveBlob {
    /// Parse save text; unreadable text yields the defaults
    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::repair(&value),
            Err(e) => {
                log::warn!("Save data unreadable, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Merge loose JSON over the defaults, one field at a time
    pub fn repair(value: &Value) -> Self {
        let mut blob = Self::default();
        let Some(obj) = value.as_object() else {
            log::warn!("Save data is not an object, using defaults");
            return blob;
        };
        if let Some(v) = obj.get("metaCurrency").and_then(as_count) {
            blob.meta_currency = v;
        }
        if let Some(upgrades) = obj.get("metaUpgrades").and_then(Value::as_object) {
            for (id, level) in upgrades {
                match as_count(level) {
                    Some(level) => {
                        blob.meta_upgrades.insert(id.clone(), level);
                    }
                    None => log::warn!("Dropping invalid level for upgrade '{id}'"),
                }
            }
        }
        if let Some(settings) = obj.get("settings") {
            blob.settings = Settings::repair(settings);
        }
        if let Some(stats) = obj.get("stats") {
            blob.stats = MetaStats::repair(stats);
        }
        blob
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Key-value backend for the save blob
pub trait SaveStore {
    /// Raw stored text, None when nothing was saved yet
    fn read(&mut self) -> Result<Option<String>, StoreError>;

    fn write(&mut self, text: &str) -> Result<(), StoreError>;

    /// Load and repair; any failure degrades to the defaults
    fn load(&mut self) -> SaveBlob {
        match self.read() {
            Ok(Some(text)) => SaveBlob::from_json(&text),
            Ok(None) => {
                log::info!("No save data found, starting fresh");
                SaveBlob::default()
            }
            Err(e) => {
                log::warn!("Failed to load save data: {e}");
                SaveBlob::default()
            }
        }
    }

    fn save(&mut self, blob: &SaveBlob) -> Result<(), StoreError> {
        let text = blob.to_json()?;
        self.write(&text)?;
        log::info!("Save data written ({} currency)", blob.meta_currency);
        Ok(())
    }
}

/// In-memory backend (tests, headless runs)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub text: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

impl SaveStore for MemoryStore {
    fn read(&mut self) -> Result<Option<String>, StoreError> {
        Ok(self.text.clone())
    }

    fn write(&mut self, text: &str) -> Result<(), StoreError> {
        self.text = Some(text.to_string());
        Ok(())
    }
}

/// JSON file on disk
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileStore {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SaveStore for FileStore {
    fn read(&mut self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, text: &str) -> Result<(), StoreError> {
        // Atomic replace through a temp file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Browser LocalStorage
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    key: String,
}

#[cfg(target_arch = "wasm32")]
impl Default for LocalStorageStore {
    fn default() -> Self {
        Self {
            key: SAVE_KEY.to_string(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    fn storage() -> Result<web_sys::Storage, StoreError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| StoreError::Unavailable("LocalStorage".to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
impl SaveStore for LocalStorageStore {
    fn read(&mut self) -> Result<Option<String>, StoreError> {
        Self::storage()?
            .get_item(&self.key)
            .map_err(|_| StoreError::Unavailable("LocalStorage read".to_string()))
    }

    fn write(&mut self, text: &str) -> Result<(), StoreError> {
        Self::storage()?
            .set_item(&self.key, text)
            .map_err(|_| StoreError::Unavailable("LocalStorage write".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_save_is_default() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load(), SaveBlob::default());
    }

    #[test]
    fn test_corrupt_text_is_default() {
        let mut store = MemoryStore::with_text("{{{ nope");
        assert_eq!(store.load(), SaveBlob::default());
    }

    #[test]
    fn test_round_trip() {
        let mut blob = SaveBlob::default();
        blob.meta_currency = 42;
        blob.meta_upgrades.insert("META_HP_MAX_I".into(), 2);
        blob.stats.best_wave = 7;
        blob.stats.boss1_defeated = true;

        let mut store = MemoryStore::new();
        store.save(&blob).unwrap();
        let text = store.text.clone().unwrap();
        assert!(text.contains("\"metaCurrency\":42"));
        assert!(text.contains("\"boss1Defeated\":true"));
        assert_eq!(store.load(), blob);
    }

    #[test]
    fn test_repair_per_field() {
        let blob = SaveBlob::repair(&json!({
            "metaCurrency": -12,
            "metaUpgrades": { "META_DASH_CD_I": 2, "META_BAD": "x" },
            "settings": { "language": "en" },
            "stats": { "runsPlayed": 3.4, "bestWave": null },
            "unknownField": true,
        }));
        assert_eq!(blob.meta_currency, 0);
        assert_eq!(blob.meta_upgrades.get("META_DASH_CD_I"), Some(&2));
        assert!(!blob.meta_upgrades.contains_key("META_BAD"));
        assert_eq!(blob.settings.language, "en");
        assert_eq!(blob.settings.se_volume, 0.8);
        assert_eq!(blob.stats.runs_played, 3);
        assert_eq!(blob.stats.best_wave, 0);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("bulletcore-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut store = FileStore::new(dir.join("save.json"));
        assert_eq!(store.load(), SaveBlob::default());

        let blob = SaveBlob {
            meta_currency: 9,
            ..Default::default()
        };
        store.save(&blob).unwrap();
        assert_eq!(store.load(), blob);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

//! User preferences
//!
//! Stored inside the save blob. Loading merges field by field over the
//! defaults, so a damaged or partial record keeps every valid value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// UI language code
    pub language: String,
    /// Music volume (0.0 - 1.0)
    pub bgm_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub se_volume: f32,
    /// Screen flashes on hits and phase changes
    pub flash_effects: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "ja".to_string(),
            bgm_volume: 0.7,
            se_volume: 0.8,
            flash_effects: true,
        }
    }
}

impl Settings {
    /// Defaults for players who bought the safe-option upgrade
    pub fn safe() -> Self {
        Self {
            flash_effects: false,
            ..Self::default()
        }
    }

    /// Rebuild from loose JSON, keeping defaults for missing or invalid fields
    pub fn repair(value: &Value) -> Self {
        let mut settings = Self::default();
        let Some(obj) = value.as_object() else {
            return settings;
        };
        if let Some(lang) = obj.get("language").and_then(Value::as_str) {
            if !lang.is_empty() {
                settings.language = lang.to_string();
            }
        }
        if let Some(v) = obj.get("bgmVolume").and_then(Value::as_f64) {
            settings.bgm_volume = (v as f32).clamp(0.0, 1.0);
        }
        if let Some(v) = obj.get("seVolume").and_then(Value::as_f64) {
            settings.se_volume = (v as f32).clamp(0.0, 1.0);
        }
        if let Some(v) = obj.get("flashEffects").and_then(Value::as_bool) {
            settings.flash_effects = v;
        }
        settings
    }
}

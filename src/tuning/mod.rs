//! Data-driven game balance
//!
//! Static tables (enemies, patterns, modifiers, perks, meta upgrades, waves)
//! are loaded once before a run and are read-only afterwards.

pub mod defs;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use defs::*;

/// Errors raised while loading static tables
#[derive(Error, Debug)]
pub enum DataError {
    /// Table text is not valid JSON for its schema
    #[error("Failed to parse table '{table}': {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Keyed entry whose inner id disagrees with its key
    #[error("Table '{table}' entry '{key}' declares id '{id}'")]
    IdMismatch {
        table: &'static str,
        key: String,
        id: String,
    },

    /// Two entries share an id
    #[error("Table '{table}' has duplicate id '{id}'")]
    DuplicateId { table: &'static str, id: String },

    /// An entry references an id that no table defines
    #[error("'{owner}' references unknown {kind} '{id}'")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: String,
    },
}

/// Raw JSON text for every table
#[derive(Debug, Clone, Copy)]
pub struct TableSources<'a> {
    pub enemies: &'a str,
    pub patterns: &'a str,
    pub modifiers: &'a str,
    pub perks: &'a str,
    pub meta_upgrades: &'a str,
    pub waves: &'a str,
}

impl TableSources<'static> {
    /// Tables shipped with the crate
    pub fn builtin() -> Self {
        Self {
            enemies: include_str!("../../assets/data/enemies.json"),
            patterns: include_str!("../../assets/data/patterns.json"),
            modifiers: include_str!("../../assets/data/modifiers.json"),
            perks: include_str!("../../assets/data/perks.json"),
            meta_upgrades: include_str!("../../assets/data/meta_upgrades.json"),
            waves: include_str!("../../assets/data/waves.json"),
        }
    }
}

/// All static tables, keyed by string id
#[derive(Debug, Clone, Default)]
pub struct GameData {
    pub enemies: BTreeMap<String, EnemyTemplate>,
    pub patterns: BTreeMap<String, PatternDef>,
    pub modifiers: BTreeMap<String, ModifierDef>,
    /// Display order is table order
    pub perks: Vec<PerkDef>,
    pub meta_upgrades: Vec<MetaUpgradeDef>,
    /// Play order
    pub waves: Vec<WaveDef>,
}

fn parse<T: DeserializeOwned>(table: &'static str, text: &str) -> Result<T, DataError> {
    serde_json::from_str(text).map_err(|source| DataError::Parse { table, source })
}

impl GameData {
    /// Parse the tables shipped with the crate
    pub fn builtin() -> Result<Self, DataError> {
        Self::from_json(TableSources::builtin())
    }

    /// Parse and cross-check caller-supplied tables
    pub fn from_json(src: TableSources<'_>) -> Result<Self, DataError> {
        let data = Self {
            enemies: parse("enemies", src.enemies)?,
            patterns: parse("patterns", src.patterns)?,
            modifiers: parse("modifiers", src.modifiers)?,
            perks: parse("perks", src.perks)?,
            meta_upgrades: parse("meta_upgrades", src.meta_upgrades)?,
            waves: parse("waves", src.waves)?,
        };
        data.validate()?;
        log::info!(
            "Loaded tables: {} enemies, {} patterns, {} modifiers, {} perks, {} upgrades, {} waves",
            data.enemies.len(),
            data.patterns.len(),
            data.modifiers.len(),
            data.perks.len(),
            data.meta_upgrades.len(),
            data.waves.len()
        );
        Ok(data)
    }

    fn validate(&self) -> Result<(), DataError> {
        check_keys("enemies", self.enemies.iter().map(|(k, v)| (k, &v.id)))?;
        check_keys("patterns", self.patterns.iter().map(|(k, v)| (k, &v.id)))?;
        check_keys("modifiers", self.modifiers.iter().map(|(k, v)| (k, &v.id)))?;
        check_unique("perks", self.perks.iter().map(|p| &p.id))?;
        check_unique("meta_upgrades", self.meta_upgrades.iter().map(|u| &u.id))?;

        for wave in &self.waves {
            for entry in &wave.spawns {
                self.require_enemy(&format!("wave {}", wave.number), &entry.enemy_id)?;
            }
        }

        for enemy in self.enemies.values() {
            for pattern in enemy.base_pattern_id.iter().chain(enemy.sub_pattern_id.iter()) {
                self.require_pattern(&enemy.id, pattern)?;
            }
            for phase in &enemy.phases {
                for step in &phase.on_enter {
                    match step {
                        PhaseStep::Every { attack, .. } => {
                            for pattern in attack.pattern_ids() {
                                self.require_pattern(&phase.id, pattern)?;
                            }
                            for enemy_id in attack.enemy_ids() {
                                self.require_enemy(&phase.id, enemy_id)?;
                            }
                        }
                        PhaseStep::SpawnAdds { enemy_id, .. } => {
                            self.require_enemy(&phase.id, enemy_id)?;
                        }
                        PhaseStep::FinalPhase => {}
                    }
                }
            }
        }

        for perk in &self.perks {
            for req in &perk.requires {
                if self.perk(req).is_none() {
                    return Err(unknown(&perk.id, "perk", req));
                }
            }
        }
        for upgrade in &self.meta_upgrades {
            for req in &upgrade.requires {
                if self.meta_upgrade(req).is_none() {
                    return Err(unknown(&upgrade.id, "upgrade", req));
                }
            }
        }
        Ok(())
    }

    fn require_enemy(&self, owner: &str, id: &str) -> Result<(), DataError> {
        if self.enemies.contains_key(id) {
            Ok(())
        } else {
            Err(unknown(owner, "enemy", id))
        }
    }

    fn require_pattern(&self, owner: &str, id: &str) -> Result<(), DataError> {
        if self.patterns.contains_key(id) {
            Ok(())
        } else {
            Err(unknown(owner, "pattern", id))
        }
    }

    pub fn enemy(&self, id: &str) -> Option<&EnemyTemplate> {
        self.enemies.get(id)
    }

    pub fn pattern(&self, id: &str) -> Option<&PatternDef> {
        self.patterns.get(id)
    }

    pub fn perk(&self, id: &str) -> Option<&PerkDef> {
        self.perks.iter().find(|p| p.id == id)
    }

    pub fn meta_upgrade(&self, id: &str) -> Option<&MetaUpgradeDef> {
        self.meta_upgrades.iter().find(|u| u.id == id)
    }
}

fn unknown(owner: &str, kind: &'static str, id: &str) -> DataError {
    DataError::UnknownReference {
        owner: owner.to_string(),
        kind,
        id: id.to_string(),
    }
}

fn check_keys<'a>(
    table: &'static str,
    entries: impl Iterator<Item = (&'a String, &'a String)>,
) -> Result<(), DataError> {
    for (key, id) in entries {
        if key != id {
            return Err(DataError::IdMismatch {
                table,
                key: key.clone(),
                id: id.clone(),
            });
        }
    }
    Ok(())
}

fn check_unique<'a>(
    table: &'static str,
    ids: impl Iterator<Item = &'a String>,
) -> Result<(), DataError> {
    let mut seen = std::collections::BTreeSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(DataError::DuplicateId {
                table,
                id: id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_load() {
        let data = GameData::builtin().expect("builtin tables");
        assert!(data.enemy("BOSS_CORE_GUARD").is_some_and(|e| e.is_boss()));
        assert!(data.enemy("BOSS_CORE_HEART").is_some_and(|e| e.phases.len() == 3));
        assert!(data.pattern("PAT_SPIRAL").is_some());
        assert_eq!(data.modifiers.len(), 6);
        assert!(!data.waves.is_empty());
        // Waves are numbered 1..=n in order
        for (i, wave) in data.waves.iter().enumerate() {
            assert_eq!(wave.number as usize, i + 1);
        }
    }

    #[test]
    fn test_unknown_wave_enemy_rejected() {
        let mut src = TableSources::builtin();
        src.waves = r#"[{"number": 1, "type": "kill_all", "spawns": [{"enemyId": "EN_NOPE"}]}]"#;
        let err = GameData::from_json(src).unwrap_err();
        assert!(matches!(err, DataError::UnknownReference { kind: "enemy", .. }));
    }

    #[test]
    fn test_parse_error_names_table() {
        let mut src = TableSources::builtin();
        src.perks = "{ not json";
        let err = GameData::from_json(src).unwrap_err();
        assert!(err.to_string().contains("perks"));
    }
}

//! Persistent meta-upgrades
//!
//! Upgrades are bought with core currency between runs. A purchase is a
//! guarded transition: the level must be below max, the balance must cover
//! the price of the next level and every prerequisite must be owned.

use std::collections::BTreeMap;

use crate::persistence::{MetaStats, SaveBlob};
use crate::settings::Settings;
use crate::sim::modifier::ModifierKind;
use crate::tuning::{GameData, MetaUpgradeDef, PerkDef, PerkSet};

pub const META_HP_MAX_I: &str = "META_HP_MAX_I";
pub const META_HP_MAX_II: &str = "META_HP_MAX_II";
pub const META_DASH_CD_I: &str = "META_DASH_CD_I";
pub const META_DASH_STOCK: &str = "META_DASH_STOCK";
pub const META_EXP_GAIN: &str = "META_EXP_GAIN";
pub const META_CORE_GAIN: &str = "META_CORE_GAIN";
pub const META_START_LEVEL: &str = "META_START_LEVEL";
pub const META_PERK_RARITY: &str = "META_PERK_RARITY";
pub const META_SAFE_OPTION: &str = "META_SAFE_OPTION";
pub const META_TUTORIAL_SKIP: &str = "META_TUTORIAL_SKIP";
pub const META_UNLOCK_PERK_A: &str = "META_UNLOCK_PERK_A";
pub const META_UNLOCK_MOD_A: &str = "META_UNLOCK_MOD_A";

/// Modifiers available without the advanced unlock
const BASE_MODIFIERS: [ModifierKind; 4] = [
    ModifierKind::SlowStart,
    ModifierKind::Accelerate,
    ModifierKind::Wave,
    ModifierKind::Decay,
];

const MODIFIER_CANDIDATE_BASE: u32 = 3;

/// Purchase state of one upgrade, for menus
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeStatus {
    pub id: String,
    pub level: u32,
    pub max_level: u32,
    /// Price of the next level
    pub cost: u32,
    pub requirements_met: bool,
    pub can_upgrade: bool,
    pub at_max: bool,
}

#[derive(Debug, Clone)]
pub struct MetaProgression {
    upgrades: Vec<MetaUpgradeDef>,
    /// Modifiers defined by the tables, in declaration order
    modifier_pool: Vec<ModifierKind>,
    currency: u32,
    levels: BTreeMap<String, u32>,
    settings: Settings,
    stats: MetaStats,
}

impl MetaProgression {
    pub fn new(data: &GameData) -> Self {
        Self::from_save(data, &SaveBlob::default())
    }

    pub fn from_save(data: &GameData, blob: &SaveBlob) -> Self {
        let modifier_pool = ModifierKind::ALL
            .into_iter()
            .filter(|kind| data.modifiers.contains_key(kind.id()))
            .collect();
        Self {
            upgrades: data.meta_upgrades.clone(),
            modifier_pool,
            currency: blob.meta_currency,
            levels: blob.meta_upgrades.clone(),
            settings: blob.settings.clone(),
            stats: blob.stats.clone(),
        }
    }

    pub fn to_save(&self) -> SaveBlob {
        SaveBlob {
            meta_currency: self.currency,
            meta_upgrades: self.levels.clone(),
            settings: self.settings.clone(),
            stats: self.stats.clone(),
        }
    }

    pub fn currency(&self) -> u32 {
        self.currency
    }

    pub fn level(&self, id: &str) -> u32 {
        self.levels.get(id).copied().unwrap_or(0)
    }

    pub fn upgrade_def(&self, id: &str) -> Option<&MetaUpgradeDef> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    /// Every upgrade in table order
    pub fn upgrades(&self) -> &[MetaUpgradeDef] {
        &self.upgrades
    }

    pub fn requirements_met(&self, id: &str) -> bool {
        self.upgrade_def(id)
            .is_none_or(|def| def.requires.iter().all(|req| self.level(req) > 0))
    }

    pub fn can_purchase(&self, id: &str) -> bool {
        let Some(def) = self.upgrade_def(id) else {
            return false;
        };
        let level = self.level(id);
        level < def.max_level
            && self.currency >= def.cost.at_level(level)
            && self.requirements_met(id)
    }

    /// Buy one level. Returns false (and changes nothing) if not allowed.
    pub fn purchase(&mut self, id: &str) -> bool {
        let Some(def) = self.upgrade_def(id) else {
            log::warn!("Unknown meta upgrade '{id}'");
            return false;
        };
        if !self.can_purchase(id) {
            log::debug!("Meta upgrade '{id}' not purchasable");
            return false;
        }
        let level = self.level(id);
        let cost = def.cost.at_level(level);
        self.currency -= cost;
        self.levels.insert(id.to_string(), level + 1);
        log::info!("Purchased {id} level {} for {cost}", level + 1);
        true
    }

    pub fn status(&self, id: &str) -> Option<UpgradeStatus> {
        let def = self.upgrade_def(id)?;
        let level = self.level(id);
        Some(UpgradeStatus {
            id: def.id.clone(),
            level,
            max_level: def.max_level,
            cost: def.cost.at_level(level),
            requirements_met: self.requirements_met(id),
            can_upgrade: self.can_purchase(id),
            at_max: level >= def.max_level,
        })
    }

    /// Add (or with a negative amount remove) currency, flooring at zero
    pub fn add_currency(&mut self, amount: i64) {
        self.currency = (self.currency as i64 + amount).clamp(0, u32::MAX as i64) as u32;
    }

    pub fn spend_currency(&mut self, amount: u32) -> bool {
        if self.currency < amount {
            return false;
        }
        self.currency -= amount;
        true
    }

    // --- Derived bonuses ---

    pub fn initial_hp_increase(&self) -> u32 {
        self.level(META_HP_MAX_I) + self.level(META_HP_MAX_II)
    }

    pub fn dash_cooldown_multiplier(&self) -> f32 {
        0.9f32.powi(self.level(META_DASH_CD_I) as i32)
    }

    pub fn dash_max_stock_bonus(&self) -> u32 {
        self.level(META_DASH_STOCK)
    }

    pub fn exp_multiplier(&self) -> f32 {
        1.05f32.powi(self.level(META_EXP_GAIN) as i32)
    }

    pub fn core_multiplier(&self) -> f32 {
        1.05f32.powi(self.level(META_CORE_GAIN) as i32)
    }

    pub fn start_level(&self) -> u32 {
        if self.level(META_START_LEVEL) > 0 { 2 } else { 1 }
    }

    pub fn perk_rarity_bonus(&self) -> f32 {
        self.level(META_PERK_RARITY) as f32 * 0.1
    }

    pub fn has_safe_option(&self) -> bool {
        self.level(META_SAFE_OPTION) > 0
    }

    pub fn should_skip_tutorial(&self) -> bool {
        self.level(META_TUTORIAL_SKIP) > 0
    }

    // --- Unlock gating ---

    pub fn perk_set_a_unlocked(&self) -> bool {
        self.level(META_UNLOCK_PERK_A) > 0
    }

    pub fn advanced_modifiers_unlocked(&self) -> bool {
        self.level(META_UNLOCK_MOD_A) > 0
    }

    pub fn is_modifier_unlocked(&self, kind: ModifierKind) -> bool {
        self.advanced_modifiers_unlocked() || BASE_MODIFIERS.contains(&kind)
    }

    /// Modifiers the run may roll as candidates
    pub fn active_modifier_pool(&self) -> Vec<ModifierKind> {
        self.modifier_pool
            .iter()
            .copied()
            .filter(|kind| self.is_modifier_unlocked(*kind))
            .collect()
    }

    pub fn modifier_candidate_base(&self) -> u32 {
        MODIFIER_CANDIDATE_BASE
    }

    pub fn is_perk_unlocked(&self, perk: &PerkDef) -> bool {
        match perk.requires_meta {
            Some(PerkSet::A) => self.perk_set_a_unlocked(),
            None => true,
        }
    }

    // --- Settings and stats ---

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn stats(&self) -> &MetaStats {
        &self.stats
    }

    /// Fold one finished run into the lifetime stats
    pub fn record_run(&mut self, reached_wave: u32, boss1_defeated: bool, boss2_defeated: bool) {
        self.stats.runs_played += 1;
        self.stats.best_wave = self.stats.best_wave.max(reached_wave);
        self.stats.boss1_defeated |= boss1_defeated;
        self.stats.boss2_defeated |= boss2_defeated;
    }
}

//! Per-run perks
//!
//! Tracks stack counts and acquisition order. Offering and acquiring only
//! touch this bookkeeping; the run applies the returned effects to the
//! player and to the global effect table.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use super::meta::MetaProgression;
use crate::tuning::{PerkDef, PerkEffects};

/// Run-wide effects broadcast by perks. A later perk overwrites the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPerkEffects {
    pub enemy_bullet_speed_multiplier: f32,
    /// Added to enemy bullet lifespan (ms)
    pub enemy_bullet_life_delta: f32,
    /// Fraction removed from homing turn rate
    pub homing_weakening: f32,
    /// Added to the two children of a split
    pub split_child_delta: f32,
    pub rain_speed_multiplier: f32,
}

impl Default for GlobalPerkEffects {
    fn default() -> Self {
        Self {
            enemy_bullet_speed_multiplier: 1.0,
            enemy_bullet_life_delta: 0.0,
            homing_weakening: 0.0,
            split_child_delta: 0.0,
            rain_speed_multiplier: 1.0,
        }
    }
}

impl GlobalPerkEffects {
    /// Record the broadcast keys present in `effects`
    pub fn absorb(&mut self, effects: &PerkEffects) {
        if let Some(v) = effects.enemy_bullet_speed_multiplier {
            self.enemy_bullet_speed_multiplier = v;
        }
        if let Some(v) = effects.enemy_bullet_life_delta {
            self.enemy_bullet_life_delta = v;
        }
        if let Some(v) = effects.homing_weakening {
            self.homing_weakening = v;
        }
        if let Some(v) = effects.split_child_delta {
            self.split_child_delta = v;
        }
        if let Some(v) = effects.rain_speed_multiplier {
            self.rain_speed_multiplier = v;
        }
    }

    pub fn homing_turn_scale(&self) -> f32 {
        (1.0 - self.homing_weakening).clamp(0.0, 1.0)
    }

    pub fn split_children(&self) -> u32 {
        (2.0 + self.split_child_delta).round().clamp(0.0, 2.0) as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct PerkSystem {
    perks: Vec<PerkDef>,
    stacks: BTreeMap<String, u32>,
    order: Vec<String>,
}

impl PerkSystem {
    pub fn new(perks: Vec<PerkDef>) -> Self {
        Self {
            perks,
            stacks: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    pub fn perk(&self, id: &str) -> Option<&PerkDef> {
        self.perks.iter().find(|p| p.id == id)
    }

    pub fn stack(&self, id: &str) -> u32 {
        self.stacks.get(id).copied().unwrap_or(0)
    }

    /// Acquired perk ids, oldest first (repeats for stacks)
    pub fn acquired(&self) -> &[String] {
        &self.order
    }

    pub fn is_selectable(&self, id: &str, meta: &MetaProgression) -> bool {
        let Some(perk) = self.perk(id) else {
            return false;
        };
        meta.is_perk_unlocked(perk)
            && self.stack(id) < perk.max_stack
            && perk.requires.iter().all(|req| self.stack(req) > 0)
    }

    /// Selectable perk ids in table order
    pub fn selectable(&self, meta: &MetaProgression) -> Vec<String> {
        self.perks
            .iter()
            .filter(|p| self.is_selectable(&p.id, meta))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Up to `count` distinct selectable perks, uniformly drawn
    pub fn roll(&self, count: usize, meta: &MetaProgression, rng: &mut impl Rng) -> Vec<String> {
        let mut pool = self.selectable(meta);
        pool.shuffle(rng);
        pool.truncate(count);
        pool
    }

    /// Take one stack of `id`. Returns the effects to apply, or None if the
    /// perk is unknown or not selectable (nothing changes).
    pub fn acquire(&mut self, id: &str, meta: &MetaProgression) -> Option<PerkEffects> {
        let Some(perk) = self.perk(id) else {
            log::warn!("Unknown perk '{id}'");
            return None;
        };
        let effects = perk.effects.clone();
        if !self.is_selectable(id, meta) {
            log::warn!("Perk '{id}' not selectable");
            return None;
        }
        *self.stacks.entry(id.to_string()).or_insert(0) += 1;
        self.order.push(id.to_string());
        log::info!("Perk acquired: {id} (stack {})", self.stack(id));
        Some(effects)
    }
}

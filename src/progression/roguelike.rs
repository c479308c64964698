//! Per-run difficulty scaling and randomized assignments
//!
//! Difficulty grows linearly with the wave number and saturates at wave 9.
//! At run start the system rolls the modifier candidates for the run and
//! gives every enemy template a random sub-pattern.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use super::meta::MetaProgression;
use crate::sim::enemy::SpawnOverrides;
use crate::sim::modifier::ModifierKind;
use crate::tuning::{EnemyTemplate, GameData};

const MAX_WAVE: u32 = 9;

/// Difficulty preset chosen before a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Extra enemy bullet speed on top of wave scaling
    pub fn bullet_speed_bonus(&self) -> f32 {
        match self {
            Difficulty::Normal => 0.0,
            Difficulty::Hard => 0.15,
        }
    }
}

/// Scaling factors for one wave
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyInfo {
    /// 0 at wave 1, 1 from wave 9
    pub index: f32,
    pub enemy_hp_multiplier: f32,
    pub bullet_speed_multiplier: f32,
    pub spawn_multiplier: f32,
}

#[derive(Debug, Clone)]
pub struct RogueLikeSystem {
    current_wave: u32,
    difficulty: Difficulty,
    pattern_ids: Vec<String>,
    enemy_ids: Vec<String>,
    modifier_candidates: Vec<ModifierKind>,
    modifier_bonus: u32,
    sub_patterns: BTreeMap<String, String>,
    wave_modifiers: Vec<ModifierKind>,
}

impl RogueLikeSystem {
    pub fn new(data: &GameData) -> Self {
        Self {
            current_wave: 1,
            difficulty: Difficulty::Normal,
            pattern_ids: data.patterns.keys().cloned().collect(),
            enemy_ids: data.enemies.keys().cloned().collect(),
            modifier_candidates: Vec::new(),
            modifier_bonus: 0,
            sub_patterns: BTreeMap::new(),
            wave_modifiers: Vec::new(),
        }
    }

    /// Fresh rolls for a new run
    pub fn initialize_run(&mut self, meta: &MetaProgression, rng: &mut impl Rng) {
        self.modifier_bonus = 0;
        self.roll_modifier_candidates(meta, rng);
        self.assign_sub_patterns(rng);
        log::info!(
            "Run modifiers: {:?}",
            self.modifier_candidates.iter().map(|k| k.id()).collect::<Vec<_>>()
        );
    }

    pub fn roll_modifier_candidates(&mut self, meta: &MetaProgression, rng: &mut impl Rng) {
        let mut pool = meta.active_modifier_pool();
        let count = ((meta.modifier_candidate_base() + self.modifier_bonus) as usize).min(pool.len());
        pool.shuffle(rng);
        pool.truncate(count);
        self.modifier_candidates = pool;
    }

    pub fn assign_sub_patterns(&mut self, rng: &mut impl Rng) {
        self.sub_patterns.clear();
        for enemy_id in &self.enemy_ids {
            if let Some(pattern) = self.pattern_ids.choose(rng) {
                self.sub_patterns.insert(enemy_id.clone(), pattern.clone());
            }
        }
    }

    /// Grow the candidate list and re-roll it
    pub fn add_modifier_candidate_bonus(&mut self, amount: u32, meta: &MetaProgression, rng: &mut impl Rng) {
        self.modifier_bonus += amount;
        self.roll_modifier_candidates(meta, rng);
        log::info!("Modifier candidates now {}", self.modifier_candidates.len());
    }

    pub fn modifier_candidates(&self) -> &[ModifierKind] {
        &self.modifier_candidates
    }

    pub fn sub_pattern(&self, enemy_id: &str) -> Option<&str> {
        self.sub_patterns.get(enemy_id).map(String::as_str)
    }

    pub fn set_current_wave(&mut self, wave: u32) {
        self.current_wave = wave.clamp(1, MAX_WAVE);
    }

    pub fn current_wave(&self) -> u32 {
        self.current_wave
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn difficulty_index(&self, wave: u32) -> f32 {
        ((wave as f32 - 1.0) / 8.0).clamp(0.0, 1.0)
    }

    pub fn difficulty_info(&self, wave: u32) -> DifficultyInfo {
        let index = self.difficulty_index(wave);
        DifficultyInfo {
            index,
            enemy_hp_multiplier: 1.0 + 0.9 * index,
            bullet_speed_multiplier: 1.0 + 0.6 * index,
            spawn_multiplier: 1.0 + 0.7 * index,
        }
    }

    pub fn spawn_multiplier(&self, wave: u32) -> f32 {
        self.difficulty_info(wave).spawn_multiplier
    }

    /// Scaled stats for one spawn of `template`
    pub fn spawn_overrides(&self, template: &EnemyTemplate, wave: u32) -> SpawnOverrides {
        let info = self.difficulty_info(wave);
        SpawnOverrides {
            max_hp: Some((template.max_hp * info.enemy_hp_multiplier).round()),
            sub_pattern_id: self.sub_pattern(&template.id).map(str::to_string),
            bullet_speed_multiplier: Some(
                info.bullet_speed_multiplier * (1.0 + self.difficulty.bullet_speed_bonus()),
            ),
            modifiers: self.wave_modifiers.clone(),
        }
    }

    /// Candidates a wave draws its modifiers from
    pub fn modifier_pool_for_wave(&self, wave: u32) -> &[ModifierKind] {
        let take = match wave {
            0..=3 => 0,
            4..=6 => 2,
            _ => 3,
        };
        &self.modifier_candidates[..take.min(self.modifier_candidates.len())]
    }

    /// Roll the modifier list for `wave`
    pub fn modifiers_for_wave(&self, wave: u32, rng: &mut impl Rng) -> Vec<ModifierKind> {
        let pool = self.modifier_pool_for_wave(wave);
        if pool.is_empty() {
            return Vec::new();
        }
        let count = if wave <= 6 {
            1
        } else {
            rng.random_range(1..=pool.len().min(2))
        };
        let mut picked = pool.to_vec();
        picked.shuffle(rng);
        picked.truncate(count);
        picked
    }

    /// Roll and keep the modifiers enemies of the current wave fire with
    pub fn roll_wave_modifiers(&mut self, rng: &mut impl Rng) -> &[ModifierKind] {
        self.wave_modifiers = self.modifiers_for_wave(self.current_wave, rng);
        &self.wave_modifiers
    }

    pub fn wave_modifiers(&self) -> &[ModifierKind] {
        &self.wave_modifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (GameData, MetaProgression, RogueLikeSystem) {
        let data = GameData::builtin().expect("builtin tables");
        let meta = MetaProgression::new(&data);
        let rogue = RogueLikeSystem::new(&data);
        (data, meta, rogue)
    }

    #[test]
    fn test_difficulty_curve() {
        let (_, _, rogue) = setup();
        assert_eq!(rogue.difficulty_index(1), 0.0);
        assert_eq!(rogue.difficulty_index(5), 0.5);
        assert_eq!(rogue.difficulty_index(20), 1.0);
        let info = rogue.difficulty_info(9);
        assert!((info.enemy_hp_multiplier - 1.9).abs() < 1e-6);
        assert!((info.bullet_speed_multiplier - 1.6).abs() < 1e-6);
        assert!((info.spawn_multiplier - 1.7).abs() < 1e-6);
    }

    #[test]
    fn test_spawn_overrides_scale() {
        let (data, meta, mut rogue) = setup();
        let mut rng = Pcg32::seed_from_u64(2);
        rogue.initialize_run(&meta, &mut rng);
        rogue.set_difficulty(Difficulty::Hard);
        let grunt = data.enemy("EN_GRUNT").unwrap();
        let o = rogue.spawn_overrides(grunt, 5);
        // 6 * 1.45 = 8.7
        assert_eq!(o.max_hp, Some(9.0));
        let speed = o.bullet_speed_multiplier.unwrap();
        assert!((speed - 1.3 * 1.15).abs() < 1e-5);
        assert!(o.sub_pattern_id.is_some_and(|p| data.pattern(&p).is_some()));
    }

    #[test]
    fn test_candidates_respect_meta_pool() {
        let (_, meta, mut rogue) = setup();
        let mut rng = Pcg32::seed_from_u64(4);
        rogue.initialize_run(&meta, &mut rng);
        assert_eq!(rogue.modifier_candidates().len(), 3);
        assert!(rogue.modifier_candidates().iter().all(|k| meta.is_modifier_unlocked(*k)));

        rogue.add_modifier_candidate_bonus(5, &meta, &mut rng);
        assert_eq!(rogue.modifier_candidates().len(), 4);
    }

    #[test]
    fn test_wave_modifier_counts() {
        let (_, meta, mut rogue) = setup();
        let mut rng = Pcg32::seed_from_u64(8);
        rogue.initialize_run(&meta, &mut rng);
        assert!(rogue.modifiers_for_wave(3, &mut rng).is_empty());
        for _ in 0..10 {
            let mid = rogue.modifiers_for_wave(5, &mut rng);
            assert_eq!(mid.len(), 1);
            assert!(rogue.modifier_candidates()[..2].contains(&mid[0]));

            let late = rogue.modifiers_for_wave(8, &mut rng);
            assert!((1..=2).contains(&late.len()));
            assert!(late.iter().all(|k| rogue.modifier_candidates()[..3].contains(k)));
        }
    }

    #[test]
    fn test_current_wave_clamped() {
        let (_, _, mut rogue) = setup();
        rogue.set_current_wave(0);
        assert_eq!(rogue.current_wave(), 1);
        rogue.set_current_wave(12);
        assert_eq!(rogue.current_wave(), 9);
    }
}

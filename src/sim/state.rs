//! Run state and run-level flow
//!
//! `RunState` owns every subsystem of one run plus the run bookkeeping that
//! ties them together: pause locks, experience and level-ups, perk offers,
//! core currency, boss flags and the final outcome. The per-step update
//! order lives in [`super::tick`].

use std::sync::Arc;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::boss::{BossCommand, adds_positions};
use super::bullet::Faction;
use super::collision::Overlap;
use super::entity::{Damageable, EntityId};
use super::modifier::{ModifierEngine, ModifierRegistry};
use super::pattern::{FireOptions, PatternEngine};
use super::player::{HitOutcome, Player};
use super::pool::BulletManager;
use super::spawner::EnemySpawner;
use super::wave::{WaveScheduler, WaveStep};
use crate::consts::*;
use crate::persistence::{SaveStore, StoreError};
use crate::progression::{Difficulty, GlobalPerkEffects, MetaProgression, PerkSystem, RogueLikeSystem};
use crate::tuning::{GameData, PerkEffects, WaveKind};

/// Template ids whose defeat is recorded in the lifetime stats
pub const BOSS1_ID: &str = "BOSS_CORE_GUARD";
pub const BOSS2_ID: &str = "BOSS_CORE_HEART";

/// Seed and difficulty preset for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub seed: u64,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Victory,
    Defeat,
}

/// Payload handed to the result screen when a run ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub result: RunResult,
    pub difficulty: Difficulty,
    pub reached_wave: u32,
    pub play_time_ms: u64,
    pub hit_count: u32,
    pub perk_ids: Vec<String>,
    pub core_earned: u32,
    pub total_core: u32,
    pub boss1_defeated: bool,
    pub boss2_defeated: bool,
    pub player_level: u32,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    WaveStarted { number: u32, kind: WaveKind },
    WaveCompleted { number: u32 },
    EnemyKilled { id: EntityId, template_id: String, boss: bool },
    BossPhaseEntered { enemy: EntityId, index: usize, phase_id: String },
    BossFinalPhase { enemy: EntityId },
    CoreAwarded { amount: u32 },
    LevelUpOffered { level: u32, perks: Vec<String> },
    PerkApplied { id: String },
    PlayerHit { hp: u32 },
    Paused,
    Resumed,
    RunFinished(RunOutcome),
}

/// Plain numbers for the HUD
#[derive(Debug, Clone, PartialEq)]
pub struct HudSnapshot {
    pub hp: u32,
    pub max_hp: u32,
    pub wave: u32,
    pub total_waves: u32,
    /// Seconds left in a survive wave
    pub remaining_secs: Option<f32>,
    pub level: u32,
    pub xp: f32,
    pub xp_to_next: f32,
    pub perk_ids: Vec<String>,
    pub core_earned: u32,
    /// hp ratio of the first live boss
    pub boss_hp_ratio: Option<f32>,
    pub paused: bool,
}

/// Experience needed to leave `level`
pub fn exp_to_next(level: u32) -> f32 {
    10.0 + (level.max(1) - 1) as f32 * 6.0
}

pub struct RunState {
    pub data: Arc<GameData>,
    pub config: RunConfig,
    pub(crate) rng: Pcg32,

    pub player: Player,
    pub bullets: BulletManager,
    pub patterns: PatternEngine,
    pub spawner: EnemySpawner,
    pub waves: WaveScheduler,
    pub roguelike: RogueLikeSystem,
    pub meta: MetaProgression,
    pub perks: PerkSystem,
    pub globals: GlobalPerkEffects,

    time_scale: f32,
    saved_time_scale: f32,
    pause_locks: u32,
    manual_pause: bool,
    level_up_active: bool,

    level: u32,
    xp: f32,
    pending_level_ups: u32,
    perk_offer: Vec<String>,
    exp_multiplier: f32,
    core_multiplier: f32,

    core_earned: u32,
    boss1_defeated: bool,
    boss2_defeated: bool,
    hit_count: u32,
    pub(crate) play_time_ms: f32,
    outcome: Option<RunOutcome>,
    events: Vec<GameEvent>,
}

impl RunState {
    /// Build a run; call [`RunState::start`] to begin wave 1
    pub fn new(data: Arc<GameData>, meta: MetaProgression, config: RunConfig) -> Self {
        let engine = ModifierEngine::new(ModifierRegistry::from_defs(&data.modifiers));
        let mut roguelike = RogueLikeSystem::new(&data);
        roguelike.set_difficulty(config.difficulty);
        Self {
            rng: Pcg32::seed_from_u64(config.seed),
            player: Player::new(Player::spawn_point()),
            bullets: BulletManager::new(engine),
            patterns: PatternEngine::new(data.patterns.clone()),
            spawner: EnemySpawner::new(),
            waves: WaveScheduler::new(data.waves.clone()),
            roguelike,
            perks: PerkSystem::new(data.perks.clone()),
            globals: GlobalPerkEffects::default(),
            time_scale: 1.0,
            saved_time_scale: 1.0,
            pause_locks: 0,
            manual_pause: false,
            level_up_active: false,
            level: 1,
            xp: 0.0,
            pending_level_ups: 0,
            perk_offer: Vec::new(),
            exp_multiplier: meta.exp_multiplier(),
            core_multiplier: meta.core_multiplier(),
            core_earned: 0,
            boss1_defeated: false,
            boss2_defeated: false,
            hit_count: 0,
            play_time_ms: 0.0,
            outcome: None,
            events: Vec::new(),
            meta,
            data,
            config,
        }
    }

    /// Apply meta bonuses, roll run assignments and start the first wave
    pub fn start(&mut self) {
        log::info!(
            "Run start: seed {} difficulty {}",
            self.config.seed,
            self.config.difficulty.as_str()
        );
        self.roguelike.initialize_run(&self.meta, &mut self.rng);

        self.player.increase_max_hp(self.meta.initial_hp_increase());
        self.player.modify_dash_cooldown(self.meta.dash_cooldown_multiplier());
        self.player.increase_dash_max_stock(self.meta.dash_max_stock_bonus());

        let start_level = self.meta.start_level();
        if start_level > self.level {
            self.pending_level_ups += start_level - self.level;
            self.level = start_level;
        }

        self.start_wave(0);
        if self.pending_level_ups > 0 {
            self.trigger_level_up_panel();
        }
    }

    // --- Waves ---

    pub fn start_wave(&mut self, index: usize) {
        if self.outcome.is_some() {
            return;
        }
        let Some(wave) = self.waves.start(index).cloned() else {
            self.finish_run(RunResult::Victory);
            return;
        };
        self.spawner.clear_scheduled();
        self.clear_enemies();
        self.roguelike.set_current_wave(wave.number);
        self.roguelike.roll_wave_modifiers(&mut self.rng);
        let multiplier = self.roguelike.spawn_multiplier(wave.number);
        self.spawner.spawn_wave(&wave, multiplier);
        self.events.push(GameEvent::WaveStarted {
            number: wave.number,
            kind: wave.kind,
        });
    }

    /// Survive trickle, clear check and interval countdown
    pub(crate) fn update_waves(&mut self, dt_ms: f32) {
        if self.waves.is_surviving() {
            self.add_experience(SURVIVE_XP_PER_SEC * dt_ms / 1000.0);
        }
        let step = self
            .waves
            .update(dt_ms, self.spawner.has_pending(), self.spawner.alive_count());
        match step {
            WaveStep::Continue => {}
            WaveStep::Completed { number, last } => {
                self.award_core(number as f32);
                self.spawner.clear_scheduled();
                self.clear_enemies();
                self.events.push(GameEvent::WaveCompleted { number });
                if last {
                    self.finish_run(RunResult::Victory);
                }
            }
            WaveStep::StartNext { index } => self.start_wave(index),
        }
    }

    fn clear_enemies(&mut self) {
        self.spawner.clear_all_enemies();
        self.patterns.cancel_all();
    }

    // --- Pause locks ---

    /// Take a pause lock; time stops on the first one
    pub fn pause_simulation(&mut self) {
        if self.pause_locks == 0 {
            self.saved_time_scale = self.time_scale;
            self.time_scale = 0.0;
            self.player.set_input_enabled(false);
        }
        self.pause_locks += 1;
    }

    /// Release a pause lock; time resumes when the last one goes
    pub fn resume_simulation(&mut self) {
        if self.pause_locks == 0 {
            return;
        }
        self.pause_locks -= 1;
        if self.pause_locks == 0 {
            self.time_scale = self.saved_time_scale;
            if !self.manual_pause && !self.level_up_active && self.outcome.is_none() {
                self.player.set_input_enabled(true);
            }
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.level_up_active {
            return;
        }
        if self.manual_pause {
            self.exit_pause();
        } else {
            self.enter_pause();
        }
    }

    pub fn enter_pause(&mut self) {
        if self.manual_pause || self.level_up_active || self.outcome.is_some() {
            return;
        }
        self.manual_pause = true;
        self.pause_simulation();
        self.events.push(GameEvent::Paused);
    }

    pub fn exit_pause(&mut self) {
        if !self.manual_pause {
            return;
        }
        self.manual_pause = false;
        self.resume_simulation();
        self.events.push(GameEvent::Resumed);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn pause_locks(&self) -> u32 {
        self.pause_locks
    }

    pub fn is_paused(&self) -> bool {
        self.manual_pause
    }

    // --- Experience and perks ---

    pub fn add_experience(&mut self, amount: f32) {
        if self.outcome.is_some() || amount <= 0.0 {
            return;
        }
        self.xp += amount * self.exp_multiplier;
        self.check_level_up();
    }

    fn check_level_up(&mut self) {
        loop {
            let needed = exp_to_next(self.level);
            if self.xp < needed {
                break;
            }
            self.xp -= needed;
            self.level += 1;
            self.pending_level_ups += 1;
            log::info!("Level up: {}", self.level);
        }
        if self.pending_level_ups > 0 && !self.level_up_active {
            self.trigger_level_up_panel();
        }
    }

    fn trigger_level_up_panel(&mut self) {
        let offer = self.perks.roll(PERK_OFFER_COUNT, &self.meta, &mut self.rng);
        if offer.is_empty() {
            log::info!("No selectable perks, skipping {} level-ups", self.pending_level_ups);
            self.pending_level_ups = 0;
            return;
        }
        self.perk_offer = offer.clone();
        self.level_up_active = true;
        self.pause_simulation();
        self.events.push(GameEvent::LevelUpOffered {
            level: self.level,
            perks: offer,
        });
    }

    /// Choose one of the offered perks. False if `id` was not offered or
    /// could not be taken.
    pub fn select_perk(&mut self, id: &str) -> bool {
        if !self.level_up_active || !self.perk_offer.iter().any(|p| p == id) {
            log::warn!("Perk '{id}' was not offered");
            return false;
        }
        let Some(effects) = self.perks.acquire(id, &self.meta) else {
            return false;
        };
        self.apply_perk_effects(&effects);
        self.events.push(GameEvent::PerkApplied { id: id.to_string() });

        self.perk_offer.clear();
        self.pending_level_ups = self.pending_level_ups.saturating_sub(1);
        self.level_up_active = false;
        self.resume_simulation();
        if self.pending_level_ups > 0 {
            self.trigger_level_up_panel();
        }
        true
    }

    fn apply_perk_effects(&mut self, effects: &PerkEffects) {
        if let Some(v) = effects.move_speed_multiplier {
            self.player.modify_move_speed(v);
        }
        if let Some(v) = effects.dash_cooldown_multiplier {
            self.player.modify_dash_cooldown(v);
        }
        if let Some(v) = effects.dash_max_stock_delta {
            self.player.increase_dash_max_stock(v);
        }
        if let Some(v) = effects.slow_hitbox_scale {
            self.player.set_slow_hitbox_scale(v);
        }
        if let Some(v) = effects.dash_on_hit {
            self.player.set_dash_on_hit(v);
        }
        if let Some(v) = effects.hp_increase {
            self.player.increase_max_hp(v);
        }
        if let Some(v) = effects.attack_multiplier {
            self.player.modify_attack_multiplier(v);
        }
        if let Some(v) = effects.shot_spread_bonus {
            self.player.add_shot_spread_bonus(v);
        }
        if let Some(v) = effects.exp_multiplier {
            self.exp_multiplier *= v;
        }
        if let Some(v) = effects.core_bonus {
            self.core_multiplier *= v;
        }
        if let Some(v) = effects.bullet_cap_scale {
            self.bullets.set_cap_scale(v);
        }
        if let Some(v) = effects.modifier_candidate_bonus {
            self.roguelike
                .add_modifier_candidate_bonus(v, &self.meta, &mut self.rng);
        }
        self.globals.absorb(effects);
        self.sync_global_effects();
    }

    /// Push the global perk table into the engines that read it
    fn sync_global_effects(&mut self) {
        let tuning = &mut self.bullets.engine_mut().tuning;
        tuning.homing_turn_scale = self.globals.homing_turn_scale();
        tuning.split_children = self.globals.split_children();
        self.patterns.rain_speed_multiplier = self.globals.rain_speed_multiplier;
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn xp(&self) -> f32 {
        self.xp
    }

    pub fn pending_level_ups(&self) -> u32 {
        self.pending_level_ups
    }

    pub fn is_level_up_active(&self) -> bool {
        self.level_up_active
    }

    pub fn perk_offer(&self) -> &[String] {
        &self.perk_offer
    }

    pub fn exp_multiplier(&self) -> f32 {
        self.exp_multiplier
    }

    pub fn core_multiplier(&self) -> f32 {
        self.core_multiplier
    }

    // --- Rewards ---

    /// Grant core currency scaled by the core multiplier
    pub fn award_core(&mut self, base: f32) -> u32 {
        if base <= 0.0 {
            return 0;
        }
        let amount = (base * self.core_multiplier).round() as u32;
        self.meta.add_currency(i64::from(amount));
        self.core_earned += amount;
        self.events.push(GameEvent::CoreAwarded { amount });
        amount
    }

    pub fn core_earned(&self) -> u32 {
        self.core_earned
    }

    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    pub fn play_time_ms(&self) -> f32 {
        self.play_time_ms
    }

    /// Remove dead enemies and hand out their rewards
    pub(crate) fn collect_dead(&mut self) {
        let dead: Vec<(EntityId, String, f32, u32, bool)> = self
            .spawner
            .enemies()
            .iter()
            .filter(|e| !e.is_alive())
            .map(|e| (e.id, e.template_id.clone(), e.exp_reward, e.core_reward, e.is_boss()))
            .collect();
        if dead.is_empty() {
            return;
        }
        self.spawner.remove_dead();
        for (id, template_id, exp, core, boss) in dead {
            self.patterns.cancel_owner(id);
            self.add_experience(exp);
            if boss {
                log::info!("Boss {template_id} defeated");
                match template_id.as_str() {
                    BOSS1_ID => self.boss1_defeated = true,
                    BOSS2_ID => self.boss2_defeated = true,
                    _ => {}
                }
                self.award_core(core as f32);
            }
            self.events.push(GameEvent::EnemyKilled { id, template_id, boss });
        }
    }

    // --- Collisions ---

    /// Resolve one reported overlap: damage first, then recycle the bullet
    pub fn apply_overlap(&mut self, overlap: Overlap) {
        if self.outcome.is_some() {
            return;
        }
        match overlap {
            Overlap::PlayerBulletEnemy { bullet, enemy } => {
                let Some(damage) = self.bullets.get(bullet).map(|b| b.damage) else {
                    return;
                };
                let Some(target) = self.spawner.enemy_mut(enemy) else {
                    return;
                };
                if !target.is_alive() {
                    return;
                }
                target.take_damage(damage);
                self.bullets.recycle(bullet);
            }
            Overlap::EnemyBulletPlayer { bullet } => {
                if !self.bullets.is_live(bullet) {
                    return;
                }
                self.bullets.recycle(bullet);
                self.hit_player();
            }
            Overlap::EnemyContactPlayer { .. } => self.hit_player(),
        }
    }

    fn hit_player(&mut self) {
        match self.player.take_hit() {
            HitOutcome::Ignored => {}
            HitOutcome::Hurt => {
                self.hit_count += 1;
                self.events.push(GameEvent::PlayerHit { hp: self.player.hp });
            }
            HitOutcome::Died => {
                self.hit_count += 1;
                self.events.push(GameEvent::PlayerHit { hp: 0 });
                self.finish_run(RunResult::Defeat);
            }
        }
    }

    // --- Boss side effects ---

    /// Drain and execute every queued boss command
    pub(crate) fn run_boss_commands(&mut self) {
        let mut queued = Vec::new();
        for enemy in self.spawner.enemies_mut() {
            let (id, pos, speed) = (enemy.id, enemy.pos, enemy.bullet_speed_multiplier);
            if let Some(boss) = enemy.boss.as_mut() {
                for command in boss.drain_commands() {
                    queued.push((id, pos, speed, command));
                }
            }
        }
        for (id, pos, speed, command) in queued {
            self.run_boss_command(id, pos, speed, command);
        }
    }

    fn run_boss_command(&mut self, boss: EntityId, pos: Vec2, speed: f32, command: BossCommand) {
        match command {
            BossCommand::Fire {
                pattern_id,
                modifiers,
                base_angle_deg,
                speed_cap_factor,
                tint,
            } => {
                let opts = FireOptions {
                    base_angle_deg,
                    speed_cap_factor,
                    tint,
                    modifiers: self.bullets.engine().registry().resolve_ids(modifiers.as_slice()),
                    ..self.enemy_fire_options(boss, speed)
                };
                self.patterns
                    .fire(&pattern_id, pos, &opts, &mut self.bullets, &mut self.rng);
            }
            BossCommand::SpawnAdds {
                enemy_id,
                count,
                radius,
            } => {
                let overrides = self
                    .data
                    .enemy(&enemy_id)
                    .map(|t| self.roguelike.spawn_overrides(t, self.roguelike.current_wave()))
                    .unwrap_or_default();
                for at in adds_positions(pos, count, radius, &mut self.rng) {
                    self.spawner.spawn_enemy(&self.data, &enemy_id, at, &overrides);
                }
            }
            BossCommand::PhaseEntered { index, id } => {
                log::info!("Boss #{boss} entered phase {id}");
                self.events.push(GameEvent::BossPhaseEntered {
                    enemy: boss,
                    index,
                    phase_id: id,
                });
            }
            BossCommand::FinalPhase => self.events.push(GameEvent::BossFinalPhase { enemy: boss }),
        }
    }

    /// Firing context for an enemy-owned pattern
    pub(crate) fn enemy_fire_options(&self, owner: EntityId, speed_multiplier: f32) -> FireOptions {
        FireOptions {
            target: self.player.is_alive().then_some(self.player.pos),
            speed_multiplier: speed_multiplier * self.globals.enemy_bullet_speed_multiplier,
            faction: Faction::Enemy,
            lifespan_ms: (BULLET_LIFESPAN_MS + self.globals.enemy_bullet_life_delta).max(0.0),
            owner,
            ..Default::default()
        }
    }

    // --- End of run ---

    /// End the run once; later calls are ignored
    pub fn finish_run(&mut self, result: RunResult) {
        if self.outcome.is_some() {
            return;
        }
        self.waves.finish();
        self.spawner.clear_scheduled();
        self.clear_enemies();

        let reached_wave = self.waves.current_number();
        self.meta
            .record_run(reached_wave, self.boss1_defeated, self.boss2_defeated);
        let outcome = RunOutcome {
            result,
            difficulty: self.config.difficulty,
            reached_wave,
            play_time_ms: self.play_time_ms.max(0.0).round() as u64,
            hit_count: self.hit_count,
            perk_ids: self.perks.acquired().to_vec(),
            core_earned: self.core_earned,
            total_core: self.meta.currency(),
            boss1_defeated: self.boss1_defeated,
            boss2_defeated: self.boss2_defeated,
            player_level: self.level,
        };
        log::info!(
            "Run finished: {:?} at wave {} ({} core)",
            result,
            reached_wave,
            self.core_earned
        );
        self.player.set_input_enabled(false);
        self.events.push(GameEvent::RunFinished(outcome.clone()));
        self.outcome = Some(outcome);
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Persist the meta state
    pub fn save_to(&self, store: &mut impl SaveStore) -> Result<(), StoreError> {
        store.save(&self.meta.to_save())
    }

    // --- Presentation ---

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn hud(&self) -> HudSnapshot {
        HudSnapshot {
            hp: self.player.hp,
            max_hp: self.player.max_hp,
            wave: self.waves.current_number(),
            total_waves: self.waves.total() as u32,
            remaining_secs: self.waves.is_surviving().then(|| self.waves.remaining_ms() / 1000.0),
            level: self.level,
            xp: self.xp,
            xp_to_next: exp_to_next(self.level),
            perk_ids: self.perks.acquired().to_vec(),
            core_earned: self.core_earned,
            boss_hp_ratio: self
                .spawner
                .enemies()
                .iter()
                .find(|e| e.is_boss() && e.is_alive())
                .map(|e| e.hp_ratio()),
            paused: self.manual_pause,
        }
    }
}

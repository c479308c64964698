//! Enemy spawning
//!
//! Owns the live enemy list and the delayed spawn jobs of the current wave.
//! Every scheduled job bumps a pending counter that drops when the job
//! fires; clearing the schedule cancels the jobs unfired and zeroes it.

use glam::Vec2;
use rand::Rng;
use rand::seq::IndexedRandom;

use super::enemy::{Enemy, SpawnOverrides};
use super::entity::{Damageable, EntityId};
use super::schedule::Scheduler;
use crate::consts::*;
use crate::progression::RogueLikeSystem;
use crate::tuning::{GameData, SpawnEntry, WaveDef};

/// A wave entry waiting for its delay
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnJob {
    pub entry: SpawnEntry,
    pub wave: u32,
    /// Spawn multiplier captured when the wave started
    pub multiplier: f32,
}

#[derive(Debug, Clone)]
pub struct EnemySpawner {
    enemies: Vec<Enemy>,
    next_id: EntityId,
    jobs: Scheduler<SpawnJob>,
    pending: u32,
}

impl Default for EnemySpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl EnemySpawner {
    pub fn new() -> Self {
        Self {
            enemies: Vec::new(),
            // 0 is reserved for the player
            next_id: 1,
            jobs: Scheduler::new(),
            pending: 0,
        }
    }

    /// Instantiate `enemy_id` at `pos`. Unknown ids log and return None.
    pub fn spawn_enemy(
        &mut self,
        data: &GameData,
        enemy_id: &str,
        pos: Vec2,
        overrides: &SpawnOverrides,
    ) -> Option<EntityId> {
        let Some(template) = data.enemy(enemy_id) else {
            log::warn!("Enemy '{enemy_id}' not found");
            return None;
        };
        let id = self.next_id;
        self.next_id += 1;
        let enemy = Enemy::from_template(id, template, pos, overrides);
        log::debug!(
            "Spawned {} #{} at ({:.0}, {:.0}) hp {}",
            enemy_id,
            id,
            pos.x,
            pos.y,
            enemy.max_hp
        );
        self.enemies.push(enemy);
        Some(id)
    }

    /// Instantiate `enemy_id` at a position drawn from an area token
    pub fn spawn_in_area(
        &mut self,
        data: &GameData,
        enemy_id: &str,
        area: &str,
        overrides: &SpawnOverrides,
        rng: &mut impl Rng,
    ) -> Option<EntityId> {
        let area = resolve_area(area, rng);
        let pos = spawn_position(&area, rng);
        self.spawn_enemy(data, enemy_id, pos, overrides)
    }

    /// Replace the schedule with the entries of `wave`
    pub fn spawn_wave(&mut self, wave: &WaveDef, multiplier: f32) {
        self.clear_scheduled();
        for entry in &wave.spawns {
            self.jobs.schedule_once(
                wave.number,
                entry.delay.max(0.0) * 1000.0,
                SpawnJob {
                    entry: entry.clone(),
                    wave: wave.number,
                    multiplier,
                },
            );
            self.pending += 1;
        }
        log::debug!("Wave {} scheduled {} spawn entries", wave.number, self.pending);
    }

    /// Fire due jobs. Returns the ids spawned this step.
    pub fn update(
        &mut self,
        dt_ms: f32,
        data: &GameData,
        roguelike: &RogueLikeSystem,
        rng: &mut impl Rng,
    ) -> Vec<EntityId> {
        let mut spawned = Vec::new();
        for job in self.jobs.advance(dt_ms) {
            spawned.extend(self.execute(&job.payload, data, roguelike, rng));
            self.pending = self.pending.saturating_sub(1);
        }
        spawned
    }

    fn execute(
        &mut self,
        job: &SpawnJob,
        data: &GameData,
        roguelike: &RogueLikeSystem,
        rng: &mut impl Rng,
    ) -> Vec<EntityId> {
        let Some(template) = data.enemy(&job.entry.enemy_id) else {
            log::warn!("Enemy '{}' not found", job.entry.enemy_id);
            return Vec::new();
        };
        let base = job.entry.count;
        let total = if template.is_boss() {
            base
        } else {
            ((base as f32 * job.multiplier).round() as u32).max(1)
        };
        (0..total)
            .filter_map(|_| {
                let overrides = roguelike.spawn_overrides(template, job.wave);
                self.spawn_in_area(data, &template.id, &job.entry.spawn_area, &overrides, rng)
            })
            .collect()
    }

    /// Cancel every unfired job without spawning
    pub fn clear_scheduled(&mut self) {
        self.jobs.clear();
        self.pending = 0;
    }

    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    pub fn clear_all_enemies(&mut self) {
        self.enemies.clear();
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn enemies_mut(&mut self) -> &mut [Enemy] {
        &mut self.enemies
    }

    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|e| e.id == id)
    }

    pub fn alive_count(&self) -> usize {
        self.enemies.iter().filter(|e| e.is_alive()).count()
    }

    /// Drop dead enemies; returns their ids
    pub fn remove_dead(&mut self) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .enemies
            .iter()
            .filter(|e| !e.is_alive())
            .map(|e| e.id)
            .collect();
        self.enemies.retain(|e| e.is_alive());
        dead
    }
}

/// Pick one alternative from a `/`-separated token; empty means random
pub fn resolve_area(token: &str, rng: &mut impl Rng) -> String {
    let parts: Vec<&str> = token
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    parts
        .choose(rng)
        .map_or_else(|| "random".to_string(), |p| p.to_string())
}

/// Position for a single area token
pub fn spawn_position(area: &str, rng: &mut impl Rng) -> Vec2 {
    let m = SPAWN_MARGIN;
    match area {
        "top" => Vec2::new(rng.random_range(m..=ARENA_WIDTH - m), m),
        "bottom" => Vec2::new(rng.random_range(m..=ARENA_WIDTH - m), ARENA_HEIGHT - m),
        "left" => Vec2::new(m, rng.random_range(m..=ARENA_HEIGHT - m)),
        "right" => Vec2::new(ARENA_WIDTH - m, rng.random_range(m..=ARENA_HEIGHT - m)),
        "center" => Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0),
        "left_right" => {
            let side = if rng.random_bool(0.5) { "left" } else { "right" };
            spawn_position(side, rng)
        }
        _ => Vec2::new(
            rng.random_range(m..=ARENA_WIDTH - m),
            rng.random_range(m..=ARENA_HEIGHT - m),
        ),
    }
}

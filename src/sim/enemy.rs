//! Enemies and bosses
//!
//! An enemy is a template instance with scaled stats. Bosses are enemies
//! with a [`Boss`] phase controller attached; their hp changes drive phase
//! selection.

use glam::Vec2;
use rand::Rng;

use super::boss::Boss;
use super::entity::{Damageable, EntityId, Positioned, Tickable};
use super::modifier::ModifierKind;
use crate::consts::*;
use crate::tuning::EnemyTemplate;

/// Per-spawn adjustments layered over a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnOverrides {
    pub max_hp: Option<f32>,
    pub sub_pattern_id: Option<String>,
    pub bullet_speed_multiplier: Option<f32>,
    /// Modifiers attached to every pattern this enemy fires
    pub modifiers: Vec<ModifierKind>,
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub template_id: String,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    pub radius: f32,
    pub exp_reward: f32,
    pub core_reward: u32,
    pub color: Option<u32>,
    pub base_pattern_id: Option<String>,
    pub sub_pattern_id: Option<String>,
    pub bullet_speed_multiplier: f32,
    pub modifiers: Vec<ModifierKind>,
    fire_interval: Option<f32>,
    fire_timer: f32,
    alive: bool,
    pub boss: Option<Boss>,
}

impl Enemy {
    pub fn from_template(id: EntityId, template: &EnemyTemplate, pos: Vec2, overrides: &SpawnOverrides) -> Self {
        let max_hp = overrides.max_hp.unwrap_or(template.max_hp).max(1.0);
        let mut enemy = Self {
            id,
            template_id: template.id.clone(),
            pos,
            hp: max_hp,
            max_hp,
            speed: template.speed,
            radius: template.collision_radius,
            exp_reward: template.exp_reward,
            core_reward: template.core_reward,
            color: template.color,
            base_pattern_id: template.base_pattern_id.clone(),
            sub_pattern_id: overrides
                .sub_pattern_id
                .clone()
                .or_else(|| template.sub_pattern_id.clone()),
            bullet_speed_multiplier: overrides
                .bullet_speed_multiplier
                .unwrap_or(template.bullet_speed_multiplier),
            modifiers: overrides.modifiers.clone(),
            fire_interval: template.fire_interval_ms.filter(|ms| *ms > 0.0),
            fire_timer: 0.0,
            alive: true,
            boss: None,
        };
        if template.is_boss() {
            let mut boss = Boss::new();
            boss.set_phases(template.phases.clone(), enemy.hp_ratio());
            enemy.boss = Some(boss);
        }
        enemy
    }

    pub fn is_boss(&self) -> bool {
        self.boss.is_some()
    }

    /// Base or sub pattern, a coin flip when both are set
    pub fn next_pattern_id(&self, rng: &mut impl Rng) -> Option<&str> {
        match (&self.base_pattern_id, &self.sub_pattern_id) {
            (Some(base), Some(sub)) => Some(if rng.random_bool(0.5) { base.as_str() } else { sub.as_str() }),
            (Some(only), None) | (None, Some(only)) => Some(only.as_str()),
            (None, None) => None,
        }
    }

    /// Move toward `target` at full speed, staying inside the arena
    pub fn steer(&mut self, target: Option<Vec2>, dt_ms: f32) {
        let Some(target) = target else {
            return;
        };
        if !self.alive || self.speed <= 0.0 {
            return;
        }
        let to_target = target - self.pos;
        let step = self.speed * dt_ms / 1000.0;
        let dist = to_target.length();
        if dist <= step {
            self.pos = target;
        } else {
            self.pos += to_target / dist * step;
        }
        self.pos = self.pos.clamp(
            Vec2::splat(self.radius),
            Vec2::new(ARENA_WIDTH - self.radius, ARENA_HEIGHT - self.radius),
        );
    }

    /// Consume one pending shot from the fire timer
    pub fn take_shot(&mut self) -> bool {
        match self.fire_interval {
            Some(interval) if self.alive && self.fire_timer >= interval => {
                self.fire_timer -= interval;
                true
            }
            _ => false,
        }
    }
}

impl Positioned for Enemy {
    fn position(&self) -> Vec2 {
        self.pos
    }

    fn radius(&self) -> f32 {
        self.radius
    }
}

impl Damageable for Enemy {
    fn hp(&self) -> f32 {
        self.hp
    }

    fn max_hp(&self) -> f32 {
        self.max_hp
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn take_damage(&mut self, amount: f32) -> bool {
        if !self.alive {
            return false;
        }
        self.hp -= amount.max(0.0);
        if self.hp <= 0.0 {
            self.hp = 0.0;
            self.alive = false;
            if let Some(boss) = self.boss.as_mut() {
                boss.clear_timers();
            }
            log::debug!("Enemy {} ({}) died", self.id, self.template_id);
            return true;
        }
        let ratio = self.hp_ratio();
        if let Some(boss) = self.boss.as_mut() {
            boss.evaluate(ratio, false);
        }
        false
    }
}

impl Tickable for Enemy {
    fn advance(&mut self, dt_ms: f32) {
        if self.alive && self.fire_interval.is_some() {
            self.fire_timer += dt_ms;
        }
    }
}

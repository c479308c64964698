//! Pooled projectile with composed heading and speed
//!
//! A bullet's velocity is never edited directly. Modifiers register named
//! angle offsets and speed factors; every mutation recomputes
//! `direction = base_angle + Σ offsets` and `speed = base_speed × Π factors`
//! from scratch.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::Positioned;
use super::modifier::{MODIFIER_KIND_COUNT, ModifierKind, ModifierState};
use crate::consts::*;
use crate::{deg_to_rad, direction, normalize_angle};

/// Which side a bullet hurts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Faction {
    /// Player shots; damage enemies
    Player,
    /// Pattern fire; damages the player
    #[default]
    Enemy,
}

/// Per-fire parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FireParams {
    /// px/s
    pub speed: f32,
    /// ms
    pub lifespan_ms: f32,
    pub modifiers: Vec<ModifierKind>,
    /// Render hint only
    pub tint: Option<u32>,
    pub faction: Faction,
    /// Damage dealt on overlap
    pub damage: f32,
}

impl Default for FireParams {
    fn default() -> Self {
        Self {
            speed: BULLET_SPEED,
            lifespan_ms: BULLET_LIFESPAN_MS,
            modifiers: Vec::new(),
            tint: None,
            faction: Faction::Enemy,
            damage: 1.0,
        }
    }
}

/// A projectile slot
#[derive(Debug, Clone)]
pub struct Bullet {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub faction: Faction,
    pub damage: f32,
    pub tint: Option<u32>,
    active: bool,
    /// Heading before offsets (radians)
    base_angle: f32,
    /// Effective heading (radians)
    direction: f32,
    base_speed: f32,
    speed: f32,
    angle_offsets: [Option<f32>; MODIFIER_KIND_COUNT],
    speed_factors: [Option<f32>; MODIFIER_KIND_COUNT],
    /// Remaining life (ms)
    pub lifespan: f32,
    /// Time since fire (ms)
    pub elapsed: f32,
    /// Modifiers requested at fire time, in order
    pub modifiers: Vec<ModifierKind>,
    pub(crate) runtime: [Option<ModifierState>; MODIFIER_KIND_COUNT],
}

impl Default for Bullet {
    fn default() -> Self {
        Self::new()
    }
}

impl Bullet {
    /// An inactive bullet
    pub fn new() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: BULLET_RADIUS,
            faction: Faction::Enemy,
            damage: 1.0,
            tint: None,
            active: false,
            base_angle: -std::f32::consts::FRAC_PI_2,
            direction: -std::f32::consts::FRAC_PI_2,
            base_speed: BULLET_SPEED,
            speed: BULLET_SPEED,
            angle_offsets: [None; MODIFIER_KIND_COUNT],
            speed_factors: [None; MODIFIER_KIND_COUNT],
            lifespan: 0.0,
            elapsed: 0.0,
            modifiers: Vec::new(),
            runtime: [None; MODIFIER_KIND_COUNT],
        }
    }

    /// Reset all per-fire state and launch from `origin` at `angle_deg`
    pub fn fire(&mut self, origin: Vec2, angle_deg: f32, params: &FireParams) {
        self.pos = origin;
        self.active = true;
        self.faction = params.faction;
        self.damage = params.damage;
        self.tint = params.tint;
        self.base_speed = params.speed;
        self.speed = params.speed;
        self.lifespan = params.lifespan_ms;
        self.elapsed = 0.0;
        self.modifiers = params.modifiers.clone();
        self.runtime = [None; MODIFIER_KIND_COUNT];
        self.angle_offsets = [None; MODIFIER_KIND_COUNT];
        self.speed_factors = [None; MODIFIER_KIND_COUNT];

        let angle = deg_to_rad(angle_deg);
        self.base_angle = angle;
        self.direction = angle;
        self.update_direction();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Move, age, and recycle on expiry or exit. Returns whether still active.
    pub fn tick(&mut self, dt_ms: f32) -> bool {
        if !self.active {
            return false;
        }
        self.pos += self.vel * (dt_ms / 1000.0);
        self.elapsed += dt_ms;
        self.lifespan -= dt_ms;
        if self.lifespan <= 0.0 || self.is_out_of_bounds() {
            self.recycle();
            return false;
        }
        true
    }

    pub fn is_out_of_bounds(&self) -> bool {
        let m = BULLET_BOUNDS_MARGIN;
        self.pos.x < -m
            || self.pos.x > ARENA_WIDTH + m
            || self.pos.y < -m
            || self.pos.y > ARENA_HEIGHT + m
    }

    /// Deactivate and drop every per-fire record
    pub fn recycle(&mut self) {
        self.active = false;
        self.vel = Vec2::ZERO;
        self.modifiers.clear();
        self.runtime = [None; MODIFIER_KIND_COUNT];
        self.angle_offsets = [None; MODIFIER_KIND_COUNT];
        self.speed_factors = [None; MODIFIER_KIND_COUNT];
        self.tint = None;
    }

    pub fn base_angle(&self) -> f32 {
        self.base_angle
    }

    /// Effective heading (radians)
    pub fn direction_angle(&self) -> f32 {
        self.direction
    }

    pub fn base_speed(&self) -> f32 {
        self.base_speed
    }

    /// Effective speed (px/s)
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn angle_offset(&self, kind: ModifierKind) -> Option<f32> {
        self.angle_offsets[kind.index()]
    }

    pub fn speed_factor(&self, kind: ModifierKind) -> Option<f32> {
        self.speed_factors[kind.index()]
    }

    pub fn set_base_angle(&mut self, angle: f32) {
        self.base_angle = angle;
        self.update_direction();
    }

    pub fn rotate_base_angle(&mut self, delta: f32) {
        self.set_base_angle(self.base_angle + delta);
    }

    /// Turn the base heading toward `target` by at most `max_delta` along the shorter arc
    pub fn rotate_base_angle_towards(&mut self, target: f32, max_delta: f32) {
        let diff = normalize_angle(target - self.base_angle);
        let clamped = diff.clamp(-max_delta, max_delta);
        self.set_base_angle(self.base_angle + clamped);
    }

    pub fn set_angle_offset(&mut self, kind: ModifierKind, offset: f32) {
        self.angle_offsets[kind.index()] = Some(offset);
        self.update_direction();
    }

    pub fn clear_angle_offset(&mut self, kind: ModifierKind) {
        self.angle_offsets[kind.index()] = None;
        self.update_direction();
    }

    pub fn set_speed_factor(&mut self, kind: ModifierKind, scale: f32) {
        self.speed_factors[kind.index()] = Some(scale);
        self.update_speed();
    }

    pub fn clear_speed_factor(&mut self, kind: ModifierKind) {
        self.speed_factors[kind.index()] = None;
        self.update_speed();
    }

    fn update_direction(&mut self) {
        let total: f32 = self.angle_offsets.iter().flatten().sum();
        self.direction = self.base_angle + total;
        self.sync_velocity();
    }

    fn update_speed(&mut self) {
        let combined: f32 = self.speed_factors.iter().flatten().product();
        let combined = if combined == 0.0 {
            SPEED_FACTOR_EPSILON
        } else {
            combined
        };
        self.speed = self.base_speed * combined;
        self.sync_velocity();
    }

    fn sync_velocity(&mut self) {
        self.vel = direction(self.direction) * self.speed;
    }
}

impl Positioned for Bullet {
    fn position(&self) -> Vec2 {
        self.pos
    }

    fn radius(&self) -> f32 {
        self.radius
    }
}

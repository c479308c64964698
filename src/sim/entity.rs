//! Capability traits shared by simulation entities

use glam::Vec2;

/// Stable id for players, enemies and bosses
pub type EntityId = u32;

/// Something with a position and a circular hitbox
pub trait Positioned {
    fn position(&self) -> Vec2;
    fn radius(&self) -> f32;
}

/// Something with hit points
pub trait Damageable {
    fn hp(&self) -> f32;
    fn max_hp(&self) -> f32;
    fn is_alive(&self) -> bool;

    /// Apply damage. Returns true only on the hit that kills.
    fn take_damage(&mut self, amount: f32) -> bool;

    /// hp / max_hp clamped to [0, 1]
    fn hp_ratio(&self) -> f32 {
        if self.max_hp() <= 0.0 {
            return 0.0;
        }
        (self.hp() / self.max_hp()).clamp(0.0, 1.0)
    }
}

/// Something with internal timers advanced once per step
pub trait Tickable {
    fn advance(&mut self, dt_ms: f32);
}

/// Circle-circle overlap test
pub fn overlaps(a: &impl Positioned, b: &impl Positioned) -> bool {
    let reach = a.radius() + b.radius();
    a.position().distance_squared(b.position()) <= reach * reach
}

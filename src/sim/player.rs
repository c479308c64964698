//! Player avatar: movement, dash, auto-shot, hits
//!
//! Every hit costs one hp regardless of source. A hit grants a window of
//! invincibility and a short stun; a dash grants a shorter window.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bullet::{Faction, FireParams};
use super::entity::{Damageable, Positioned, Tickable};
use super::pool::BulletManager;
use crate::consts::*;

const BASE_SPEED: f32 = 160.0;
const SLOW_MULTIPLIER: f32 = 0.4;
const AUTO_SHOT_INTERVAL_MS: f32 = 180.0;
const AUTO_SHOT_SPREAD_DEG: f32 = 45.0;
const MAX_HP: u32 = 3;
const DASH_DISTANCE: f32 = 120.0;
const DASH_DURATION_MS: f32 = 120.0;
const DASH_INVULNERABLE_MS: f32 = 160.0;
const DASH_COOLDOWN_MS: f32 = 1500.0;
const HIT_STUN_MS: f32 = 1000.0;

/// Player control state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Normal,
    Dash,
    HitStun,
    Dead,
}

/// Player commands for one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    /// Desired direction; any length, zero for none
    pub move_dir: Vec2,
    /// Precision movement (slower, optionally smaller hitbox)
    pub slow: bool,
    /// Dash pressed this step
    pub dash: bool,
}

/// Result of a hit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Invincible or already dead
    Ignored,
    Hurt,
    Died,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub state: PlayerState,
    pub hp: u32,
    pub max_hp: u32,
    move_speed_multiplier: f32,
    shot_timer: f32,
    shot_spread_bonus: f32,
    shot_damage_multiplier: f32,
    input_enabled: bool,
    dash_cooldown: f32,
    dash_max_stock: u32,
    dash_stock: u32,
    dash_recharge_timer: f32,
    dash_timer: f32,
    dash_dir: Vec2,
    dash_on_hit: bool,
    hit_stun_timer: f32,
    invincible_timer: f32,
    slow_hitbox_scale: f32,
    hitbox_scale: f32,
}

impl Player {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            state: PlayerState::Normal,
            hp: MAX_HP,
            max_hp: MAX_HP,
            move_speed_multiplier: 1.0,
            shot_timer: 0.0,
            shot_spread_bonus: 0.0,
            shot_damage_multiplier: 1.0,
            input_enabled: true,
            dash_cooldown: DASH_COOLDOWN_MS,
            dash_max_stock: 1,
            dash_stock: 1,
            dash_recharge_timer: 0.0,
            dash_timer: 0.0,
            dash_dir: Vec2::NEG_Y,
            dash_on_hit: false,
            hit_stun_timer: 0.0,
            invincible_timer: 0.0,
            slow_hitbox_scale: 1.0,
            hitbox_scale: 1.0,
        }
    }

    /// Default spawn point: bottom-center of the arena
    pub fn spawn_point() -> Vec2 {
        Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT - 60.0)
    }

    /// Advance timers, move, dash and auto-fire
    pub fn update(&mut self, dt_ms: f32, input: &PlayerInput, bullets: &mut BulletManager, rng: &mut impl Rng) {
        if self.state == PlayerState::Dead {
            return;
        }

        self.advance(dt_ms);

        match self.state {
            PlayerState::Normal => {
                self.handle_movement(input);
                self.handle_auto_shot(dt_ms, bullets, rng);
                self.try_dash(input);
            }
            PlayerState::Dash => {
                self.dash_timer += dt_ms;
                if self.dash_timer >= DASH_DURATION_MS {
                    self.vel = Vec2::ZERO;
                    self.state = PlayerState::Normal;
                }
                self.handle_auto_shot(dt_ms, bullets, rng);
            }
            PlayerState::HitStun => {
                if self.hit_stun_timer > 0.0 {
                    self.hit_stun_timer = (self.hit_stun_timer - dt_ms).max(0.0);
                    if self.hit_stun_timer == 0.0 {
                        self.state = PlayerState::Normal;
                    }
                }
                self.handle_movement(input);
                self.handle_auto_shot(dt_ms, bullets, rng);
                self.try_dash(input);
            }
            PlayerState::Dead => {}
        }

        self.pos += self.vel * (dt_ms / 1000.0);
        let r = self.radius();
        self.pos = self.pos.clamp(Vec2::splat(r), Vec2::new(ARENA_WIDTH - r, ARENA_HEIGHT - r));
    }

    fn handle_movement(&mut self, input: &PlayerInput) {
        if !self.input_enabled {
            self.vel = Vec2::ZERO;
            return;
        }
        let dir = input.move_dir.normalize_or_zero();
        if dir == Vec2::ZERO {
            self.vel = Vec2::ZERO;
            self.hitbox_scale = 1.0;
            return;
        }
        let speed = self.move_speed() * if input.slow { SLOW_MULTIPLIER } else { 1.0 };
        self.hitbox_scale = if input.slow { self.slow_hitbox_scale } else { 1.0 };
        self.vel = dir * speed;
    }

    fn handle_auto_shot(&mut self, dt_ms: f32, bullets: &mut BulletManager, rng: &mut impl Rng) {
        if !self.input_enabled {
            return;
        }
        self.shot_timer += dt_ms;
        while self.shot_timer >= AUTO_SHOT_INTERVAL_MS {
            self.shot_timer -= AUTO_SHOT_INTERVAL_MS;
            let spread = self.shot_spread();
            let jitter = if spread > 0.0 {
                rng.random_range(-spread..=spread)
            } else {
                0.0
            };
            let params = FireParams {
                faction: Faction::Player,
                damage: self.shot_damage(),
                ..Default::default()
            };
            bullets.spawn(self.pos - Vec2::new(0.0, PLAYER_RADIUS), -90.0 + jitter, &params);
        }
    }

    fn try_dash(&mut self, input: &PlayerInput) {
        if !self.input_enabled || !input.dash || !self.can_dash() {
            return;
        }
        let dir = input.move_dir.normalize_or_zero();
        self.dash_dir = if dir == Vec2::ZERO { Vec2::NEG_Y } else { dir };
        self.dash_stock = self.dash_stock.saturating_sub(1);
        self.dash_recharge_timer = 0.0;
        self.dash_timer = 0.0;
        self.state = PlayerState::Dash;
        self.set_invincible(DASH_INVULNERABLE_MS);
        self.vel = self.dash_dir * (DASH_DISTANCE / (DASH_DURATION_MS / 1000.0));
        log::debug!("Dash, {} stock left", self.dash_stock);
    }

    pub fn can_dash(&self) -> bool {
        self.dash_stock > 0 && self.state != PlayerState::Dash
    }

    fn set_invincible(&mut self, ms: f32) {
        self.invincible_timer = self.invincible_timer.max(ms);
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_timer > 0.0
    }

    /// Lose one hp unless invincible or dead
    pub fn take_hit(&mut self) -> HitOutcome {
        if self.is_invincible() || self.state == PlayerState::Dead {
            return HitOutcome::Ignored;
        }
        self.hp = self.hp.saturating_sub(1);
        log::info!("Player hit, hp {}/{}", self.hp, self.max_hp);
        self.set_invincible(HIT_STUN_MS);
        if self.dash_on_hit {
            self.restore_dash_stock(1);
        }
        if self.hp == 0 {
            self.state = PlayerState::Dead;
            self.vel = Vec2::ZERO;
            return HitOutcome::Died;
        }
        self.hit_stun_timer = HIT_STUN_MS;
        self.state = PlayerState::HitStun;
        HitOutcome::Hurt
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
        if !enabled {
            self.vel = Vec2::ZERO;
        }
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn move_speed(&self) -> f32 {
        BASE_SPEED * self.move_speed_multiplier
    }

    pub fn dash_stock(&self) -> u32 {
        self.dash_stock
    }

    pub fn dash_max_stock(&self) -> u32 {
        self.dash_max_stock
    }

    pub fn dash_cooldown(&self) -> f32 {
        self.dash_cooldown
    }

    pub fn shot_spread(&self) -> f32 {
        AUTO_SHOT_SPREAD_DEG + self.shot_spread_bonus
    }

    pub fn shot_damage(&self) -> f32 {
        self.shot_damage_multiplier
    }

    // Stat hooks used by perks and meta upgrades

    pub fn modify_move_speed(&mut self, multiplier: f32) {
        self.move_speed_multiplier *= multiplier;
    }

    pub fn modify_dash_cooldown(&mut self, multiplier: f32) {
        self.dash_cooldown *= multiplier;
    }

    pub fn increase_dash_max_stock(&mut self, delta: u32) {
        self.dash_max_stock += delta;
        self.dash_stock = (self.dash_stock + delta).min(self.dash_max_stock);
    }

    pub fn restore_dash_stock(&mut self, amount: u32) {
        self.dash_stock = (self.dash_stock + amount).min(self.dash_max_stock);
    }

    pub fn set_slow_hitbox_scale(&mut self, scale: f32) {
        self.slow_hitbox_scale = scale;
    }

    pub fn set_dash_on_hit(&mut self, enabled: bool) {
        self.dash_on_hit = enabled;
    }

    pub fn increase_max_hp(&mut self, amount: u32) {
        self.max_hp += amount;
        self.hp += amount;
    }

    pub fn modify_attack_multiplier(&mut self, multiplier: f32) {
        self.shot_damage_multiplier *= multiplier;
    }

    pub fn add_shot_spread_bonus(&mut self, value: f32) {
        self.shot_spread_bonus += value;
    }
}

impl Tickable for Player {
    /// Invincibility countdown and dash recharge
    fn advance(&mut self, dt_ms: f32) {
        if self.invincible_timer > 0.0 {
            self.invincible_timer = (self.invincible_timer - dt_ms).max(0.0);
        }
        if self.dash_stock >= self.dash_max_stock {
            self.dash_recharge_timer = 0.0;
            return;
        }
        self.dash_recharge_timer += dt_ms;
        if self.dash_recharge_timer >= self.dash_cooldown {
            self.dash_recharge_timer -= self.dash_cooldown;
            self.dash_stock = (self.dash_stock + 1).min(self.dash_max_stock);
            log::debug!("Dash stock recovered: {}", self.dash_stock);
        }
    }
}

impl Positioned for Player {
    fn position(&self) -> Vec2 {
        self.pos
    }

    fn radius(&self) -> f32 {
        PLAYER_RADIUS * self.hitbox_scale
    }
}

impl Damageable for Player {
    fn hp(&self) -> f32 {
        self.hp as f32
    }

    fn max_hp(&self) -> f32 {
        self.max_hp as f32
    }

    fn is_alive(&self) -> bool {
        self.state != PlayerState::Dead
    }

    fn take_damage(&mut self, _amount: f32) -> bool {
        self.take_hit() == HitOutcome::Died
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn run(player: &mut Player, steps: u32, dt: f32, input: PlayerInput) -> BulletManager {
        let mut pool = BulletManager::default();
        let mut rng = Pcg32::seed_from_u64(5);
        for _ in 0..steps {
            player.update(dt, &input, &mut pool, &mut rng);
        }
        pool
    }

    #[test]
    fn test_auto_shot_rate_and_spread() {
        let mut player = Player::new(Player::spawn_point());
        let pool = run(&mut player, 10, 90.0, PlayerInput::default());
        // 900 ms at one shot per 180 ms
        assert_eq!(pool.len(), 5);
        for (_, b) in pool.iter() {
            assert_eq!(b.faction, Faction::Player);
            let deg = crate::rad_to_deg(b.direction_angle());
            assert!((-135.0 - 1e-3..=-45.0 + 1e-3).contains(&deg));
        }
    }

    #[test]
    fn test_no_shots_while_input_disabled() {
        let mut player = Player::new(Player::spawn_point());
        player.set_input_enabled(false);
        let pool = run(&mut player, 10, 100.0, PlayerInput::default());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slow_movement_and_hitbox() {
        let mut player = Player::new(Vec2::new(400.0, 200.0));
        player.set_slow_hitbox_scale(0.5);
        let input = PlayerInput {
            move_dir: Vec2::new(1.0, 0.0),
            slow: true,
            ..Default::default()
        };
        run(&mut player, 1, 1000.0, input);
        assert!((player.pos.x - (400.0 + 160.0 * 0.4)).abs() < 1e-3);
        assert_eq!(player.radius(), PLAYER_RADIUS * 0.5);
    }

    #[test]
    fn test_dash_consumes_stock_and_recharges() {
        let mut player = Player::new(Vec2::new(400.0, 300.0));
        let dash = PlayerInput {
            dash: true,
            ..Default::default()
        };
        run(&mut player, 1, 16.0, dash);
        assert_eq!(player.state, PlayerState::Dash);
        assert_eq!(player.dash_stock(), 0);
        assert!(player.is_invincible());

        // Dash ends after its duration
        run(&mut player, 10, 16.0, PlayerInput::default());
        assert_eq!(player.state, PlayerState::Normal);
        assert!(!player.can_dash());

        run(&mut player, 100, 16.0, PlayerInput::default());
        assert_eq!(player.dash_stock(), 1);
    }

    #[test]
    fn test_hit_grants_invincibility() {
        let mut player = Player::new(Player::spawn_point());
        assert_eq!(player.take_hit(), HitOutcome::Hurt);
        assert_eq!(player.state, PlayerState::HitStun);
        assert_eq!(player.take_hit(), HitOutcome::Ignored);
        assert_eq!(player.hp, 2);

        run(&mut player, 70, 16.0, PlayerInput::default());
        assert_eq!(player.state, PlayerState::Normal);
        assert!(!player.is_invincible());
        assert_eq!(player.take_hit(), HitOutcome::Hurt);
        assert_eq!(player.hp, 1);
    }

    #[test]
    fn test_death_is_terminal() {
        let mut player = Player::new(Player::spawn_point());
        player.hp = 1;
        assert!(player.take_damage(1.0));
        assert!(!player.is_alive());
        assert_eq!(player.take_hit(), HitOutcome::Ignored);
    }

    #[test]
    fn test_dash_on_hit_restores_stock() {
        let mut player = Player::new(Vec2::new(400.0, 300.0));
        player.set_dash_on_hit(true);
        let dash = PlayerInput {
            dash: true,
            ..Default::default()
        };
        run(&mut player, 1, 16.0, dash);
        run(&mut player, 20, 16.0, PlayerInput::default());
        assert_eq!(player.dash_stock(), 0);
        player.take_hit();
        assert_eq!(player.dash_stock(), 1);
    }

    #[test]
    fn test_stat_hooks() {
        let mut player = Player::new(Player::spawn_point());
        player.increase_max_hp(2);
        assert_eq!((player.hp, player.max_hp), (5, 5));
        player.increase_dash_max_stock(1);
        assert_eq!(player.dash_stock(), 2);
        player.modify_dash_cooldown(0.9);
        assert!((player.dash_cooldown() - 1350.0).abs() < 1e-3);
        player.modify_attack_multiplier(1.5);
        assert_eq!(player.shot_damage(), 1.5);
        player.add_shot_spread_bonus(10.0);
        assert_eq!(player.shot_spread(), 55.0);
    }
}

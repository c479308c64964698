//! Bulletcore - simulation core of a roguelite bullet-hell arena shooter
//!
//! Core modules:
//! - `sim`: Fixed-step simulation (bullets, modifiers, patterns, waves, bosses)
//! - `progression`: Meta-upgrades, per-run perks, difficulty scaling
//! - `tuning`: Data-driven game balance (static tables)
//! - `persistence`: Save blob load/store with repair-on-load
//! - `settings`: User preferences carried in the save blob

pub mod persistence;
pub mod progression;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use settings::Settings;
pub use tuning::GameData;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep in milliseconds (60 Hz)
    pub const SIM_DT_MS: f32 = 1000.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Logical arena dimensions (origin top-left, +y down)
    pub const ARENA_WIDTH: f32 = 800.0;
    pub const ARENA_HEIGHT: f32 = 450.0;

    /// Bullets further than this outside the arena are recycled
    pub const BULLET_BOUNDS_MARGIN: f32 = 16.0;
    /// Default bullet speed (px/s) and lifespan (ms)
    pub const BULLET_SPEED: f32 = 360.0;
    pub const BULLET_LIFESPAN_MS: f32 = 6000.0;
    pub const BULLET_RADIUS: f32 = 3.0;
    /// Floor for a collapsed speed-factor product
    pub const SPEED_FACTOR_EPSILON: f32 = 0.0001;

    /// Bullet pool capacity before cap scaling
    pub const BULLET_BASE_CAP: usize = 700;
    pub const BULLET_CAP_SCALE_MIN: f32 = 0.1;
    pub const BULLET_CAP_SCALE_MAX: f32 = 1.0;

    /// Inset from arena edges for spawn-area tokens
    pub const SPAWN_MARGIN: f32 = 30.0;
    /// Inset used when clamping boss reinforcement positions
    pub const ADDS_MARGIN: f32 = 32.0;
    /// Radial jitter applied to boss reinforcement rings
    pub const ADDS_RADIUS_JITTER: f32 = 20.0;

    /// Pattern defaults
    pub const PATTERN_BASE_ANGLE_DEG: f32 = -90.0;
    pub const PATTERN_BASE_SPEED: f32 = 200.0;
    pub const BURST_INTERVAL_MS: f32 = 80.0;
    pub const SPIRAL_ANGLE_STEP_DEG: f32 = 15.0;

    /// Pause between waves (ms)
    pub const WAVE_INTERVAL_MS: f32 = 2000.0;
    /// Experience per second while surviving a timed wave
    pub const SURVIVE_XP_PER_SEC: f32 = 0.2;
    /// Perk choices offered per level-up
    pub const PERK_OFFER_COUNT: usize = 3;

    /// Player defaults
    pub const PLAYER_RADIUS: f32 = 6.0;
}

/// Convert degrees to radians
#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    deg.to_radians()
}

/// Convert radians to degrees
#[inline]
pub fn rad_to_deg(rad: f32) -> f32 {
    rad.to_degrees()
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Angle (radians) of the ray from `from` toward `to`
#[inline]
pub fn angle_between(from: Vec2, to: Vec2) -> f32 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Unit direction for an angle in radians
#[inline]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Initialize the log backend for the current target
pub fn init_logging() {
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = env_logger::try_init();
    }
}

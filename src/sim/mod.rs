//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID, then slot)
//! - No rendering or platform dependencies

pub mod boss;
pub mod bullet;
pub mod collision;
pub mod enemy;
pub mod entity;
pub mod modifier;
pub mod pattern;
pub mod player;
pub mod pool;
pub mod schedule;
pub mod spawner;
pub mod state;
pub mod tick;
pub mod wave;

pub use boss::{Boss, BossCommand};
pub use bullet::{Bullet, Faction, FireParams};
pub use collision::{Overlap, detect_overlaps};
pub use enemy::{Enemy, SpawnOverrides};
pub use entity::{Damageable, EntityId, Positioned, Tickable};
pub use modifier::{ModifierEngine, ModifierKind, ModifierRegistry};
pub use pattern::{FireOptions, PatternEngine};
pub use player::{HitOutcome, Player, PlayerInput, PlayerState};
pub use pool::{BulletHandle, BulletManager};
pub use schedule::Scheduler;
pub use spawner::EnemySpawner;
pub use state::{GameEvent, HudSnapshot, RunConfig, RunOutcome, RunResult, RunState};
pub use tick::{TickInput, tick};
pub use wave::{WaveScheduler, WaveState, WaveStep};

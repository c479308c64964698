//! Roguelite progression
//!
//! - `meta`: persistent upgrades bought between runs
//! - `perk`: per-run level-up perks
//! - `roguelike`: per-run difficulty scaling and random assignments

pub mod meta;
pub mod perk;
pub mod roguelike;

pub use meta::{MetaProgression, UpgradeStatus};
pub use perk::{GlobalPerkEffects, PerkSystem};
pub use roguelike::{Difficulty, DifficultyInfo, RogueLikeSystem};

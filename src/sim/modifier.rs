//! Bullet modifiers: registry and per-tick engine
//!
//! The six modifier kinds are a closed set. Table entries are resolved once
//! into [`ModifierSpec`] values with concrete parameters; per-bullet runtime
//! state lives in a fixed array indexed by kind.

use std::collections::BTreeMap;

use glam::Vec2;

use super::bullet::{Bullet, FireParams};
use crate::tuning::ModifierDef;
use crate::{angle_between, deg_to_rad, rad_to_deg};

pub const MODIFIER_KIND_COUNT: usize = 6;

/// Known modifier kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModifierKind {
    SlowStart,
    Accelerate,
    Wave,
    Decay,
    Split,
    HomingLight,
}

impl ModifierKind {
    pub const ALL: [ModifierKind; MODIFIER_KIND_COUNT] = [
        ModifierKind::SlowStart,
        ModifierKind::Accelerate,
        ModifierKind::Wave,
        ModifierKind::Decay,
        ModifierKind::Split,
        ModifierKind::HomingLight,
    ];

    /// Table id
    pub fn id(self) -> &'static str {
        match self {
            ModifierKind::SlowStart => "MOD_SLOW_START",
            ModifierKind::Accelerate => "MOD_ACCELERATE",
            ModifierKind::Wave => "MOD_WAVE",
            ModifierKind::Decay => "MOD_DECAY",
            ModifierKind::Split => "MOD_SPLIT",
            ModifierKind::HomingLight => "MOD_HOMING_LIGHT",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Resolved modifier with concrete parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifierSpec {
    /// Speed factor ramps start→end, then is removed
    SlowStart { start: f32, end: f32, duration: f32 },
    /// Speed factor ramps start→end and stays at end
    Accelerate { start: f32, end: f32, duration: f32 },
    /// Sine heading offset
    Wave { amplitude_rad: f32, period: f32 },
    /// Lifespan clamp at attach
    Decay { max_lifespan: f32 },
    /// Two children after `delay`, parent consumed
    Split { delay: f32, angle_offset_deg: f32 },
    /// Periodic bounded turn toward the player
    HomingLight {
        duration: f32,
        turn_interval: f32,
        max_turn_rad: f32,
    },
}

impl ModifierSpec {
    pub fn kind(&self) -> ModifierKind {
        match self {
            ModifierSpec::SlowStart { .. } => ModifierKind::SlowStart,
            ModifierSpec::Accelerate { .. } => ModifierKind::Accelerate,
            ModifierSpec::Wave { .. } => ModifierKind::Wave,
            ModifierSpec::Decay { .. } => ModifierKind::Decay,
            ModifierSpec::Split { .. } => ModifierKind::Split,
            ModifierSpec::HomingLight { .. } => ModifierKind::HomingLight,
        }
    }

    /// Spec for `kind` with every parameter at its default
    pub fn defaults(kind: ModifierKind) -> Self {
        Self::resolve(kind, &ModifierDef {
            id: kind.id().to_string(),
            params: Default::default(),
        })
    }

    /// Fill missing parameters with defaults
    pub fn resolve(kind: ModifierKind, def: &ModifierDef) -> Self {
        let p = &def.params;
        match kind {
            ModifierKind::SlowStart => ModifierSpec::SlowStart {
                start: p.start_scale.unwrap_or(0.4),
                end: p.end_scale.unwrap_or(1.0),
                duration: p.duration.unwrap_or(500.0),
            },
            ModifierKind::Accelerate => ModifierSpec::Accelerate {
                start: p.start_scale.unwrap_or(1.0),
                end: p.end_scale.unwrap_or(1.4),
                duration: p.duration.unwrap_or(3000.0),
            },
            ModifierKind::Wave => ModifierSpec::Wave {
                amplitude_rad: deg_to_rad(p.amplitude_deg.unwrap_or(20.0)),
                period: p.period.unwrap_or(800.0).max(1.0),
            },
            ModifierKind::Decay => ModifierSpec::Decay {
                max_lifespan: p.lifespan.unwrap_or(3000.0),
            },
            ModifierKind::Split => ModifierSpec::Split {
                delay: p.delay.unwrap_or(1200.0),
                angle_offset_deg: p.angle_offset_deg.unwrap_or(15.0),
            },
            ModifierKind::HomingLight => ModifierSpec::HomingLight {
                duration: p.duration.unwrap_or(1500.0),
                turn_interval: p.turn_interval.unwrap_or(300.0),
                max_turn_rad: deg_to_rad(p.turn_amount_deg.unwrap_or(3.0)),
            },
        }
    }
}

/// Per-bullet runtime state for one modifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifierState {
    /// Slow-start and accelerate
    Ramp { elapsed: f32 },
    Wave { elapsed: f32 },
    Split { elapsed: f32, triggered: bool },
    Homing { elapsed: f32, turn_timer: f32 },
}

/// Static modifier definitions, one slot per kind
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierRegistry {
    specs: [Option<ModifierSpec>; MODIFIER_KIND_COUNT],
}

impl Default for ModifierRegistry {
    /// Every kind with default parameters
    fn default() -> Self {
        let mut specs = [None; MODIFIER_KIND_COUNT];
        for kind in ModifierKind::ALL {
            specs[kind.index()] = Some(ModifierSpec::defaults(kind));
        }
        Self { specs }
    }
}

impl ModifierRegistry {
    /// Registry with no definitions; every kind is inert
    pub fn empty() -> Self {
        Self {
            specs: [None; MODIFIER_KIND_COUNT],
        }
    }

    /// Build from the modifier table; entries with unknown ids are skipped
    pub fn from_defs(defs: &BTreeMap<String, ModifierDef>) -> Self {
        let mut registry = Self::empty();
        for (id, def) in defs {
            match ModifierKind::from_id(id) {
                Some(kind) => registry.specs[kind.index()] = Some(ModifierSpec::resolve(kind, def)),
                None => log::warn!("Ignoring modifier '{id}': no behaviour for this id"),
            }
        }
        registry
    }

    pub fn get(&self, kind: ModifierKind) -> Option<&ModifierSpec> {
        self.specs[kind.index()].as_ref()
    }

    pub fn set(&mut self, spec: ModifierSpec) {
        self.specs[spec.kind().index()] = Some(spec);
    }

    /// Map table ids to kinds, dropping unknown ids
    pub fn resolve_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<ModifierKind> {
        ids.iter()
            .filter_map(|id| {
                let id = id.as_ref();
                let kind = ModifierKind::from_id(id);
                if kind.is_none() {
                    log::warn!("Unknown modifier id '{id}'");
                }
                kind
            })
            .collect()
    }
}

/// Global adjustments applied by perks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierTuning {
    /// Scales homing turn amount (1 = unchanged)
    pub homing_turn_scale: f32,
    /// Children produced by a split, 0..=2
    pub split_children: u32,
}

impl Default for ModifierTuning {
    fn default() -> Self {
        Self {
            homing_turn_scale: 1.0,
            split_children: 2,
        }
    }
}

/// Bullet spawn requested by a modifier (split children)
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub origin: Vec2,
    pub angle_deg: f32,
    pub params: FireParams,
}

/// Attaches modifiers to bullets and advances their state
#[derive(Debug, Clone, Default)]
pub struct ModifierEngine {
    registry: ModifierRegistry,
    pub tuning: ModifierTuning,
}

impl ModifierEngine {
    pub fn new(registry: ModifierRegistry) -> Self {
        Self {
            registry,
            tuning: ModifierTuning::default(),
        }
    }

    pub fn registry(&self) -> &ModifierRegistry {
        &self.registry
    }

    /// Initialize runtime state for every modifier on a freshly fired bullet
    pub fn attach(&self, bullet: &mut Bullet) {
        bullet.runtime = Default::default();
        for kind in bullet.modifiers.clone() {
            let Some(spec) = self.registry.get(kind).copied() else {
                continue;
            };
            match spec {
                ModifierSpec::SlowStart { start, .. } | ModifierSpec::Accelerate { start, .. } => {
                    bullet.set_speed_factor(kind, start);
                    bullet.runtime[kind.index()] = Some(ModifierState::Ramp { elapsed: 0.0 });
                }
                ModifierSpec::Wave { .. } => {
                    bullet.runtime[kind.index()] = Some(ModifierState::Wave { elapsed: 0.0 });
                }
                ModifierSpec::Decay { max_lifespan } => {
                    bullet.lifespan = bullet.lifespan.min(max_lifespan);
                }
                ModifierSpec::Split { .. } => {
                    bullet.runtime[kind.index()] = Some(ModifierState::Split {
                        elapsed: 0.0,
                        triggered: false,
                    });
                }
                ModifierSpec::HomingLight { .. } => {
                    bullet.runtime[kind.index()] = Some(ModifierState::Homing {
                        elapsed: 0.0,
                        turn_timer: 0.0,
                    });
                }
            }
        }
    }

    /// Advance every modifier on `bullet` by `dt_ms`.
    ///
    /// A split pushes its children onto `spawns` and recycles the bullet;
    /// processing stops there.
    pub fn update(&self, bullet: &mut Bullet, dt_ms: f32, target: Option<Vec2>, spawns: &mut Vec<SpawnRequest>) {
        if !bullet.is_active() || bullet.modifiers.is_empty() {
            return;
        }

        for kind in bullet.modifiers.clone() {
            let Some(spec) = self.registry.get(kind).copied() else {
                continue;
            };
            let slot = kind.index();
            let Some(state) = bullet.runtime[slot] else {
                continue;
            };

            match (spec, state) {
                (ModifierSpec::SlowStart { start, end, duration }, ModifierState::Ramp { elapsed }) => {
                    let elapsed = elapsed + dt_ms;
                    let t = ramp_progress(elapsed, duration);
                    bullet.set_speed_factor(kind, lerp(start, end, t));
                    if t >= 1.0 {
                        bullet.clear_speed_factor(kind);
                        bullet.runtime[slot] = None;
                    } else {
                        bullet.runtime[slot] = Some(ModifierState::Ramp { elapsed });
                    }
                }
                (ModifierSpec::Accelerate { start, end, duration }, ModifierState::Ramp { elapsed }) => {
                    let elapsed = elapsed + dt_ms;
                    let t = ramp_progress(elapsed, duration);
                    bullet.set_speed_factor(kind, lerp(start, end, t));
                    // Final factor stays applied
                    bullet.runtime[slot] = (t < 1.0).then_some(ModifierState::Ramp { elapsed });
                }
                (ModifierSpec::Wave { amplitude_rad, period }, ModifierState::Wave { elapsed }) => {
                    let elapsed = elapsed + dt_ms;
                    let cycle = (elapsed % period) / period;
                    bullet.set_angle_offset(kind, amplitude_rad * (cycle * std::f32::consts::TAU).sin());
                    bullet.runtime[slot] = Some(ModifierState::Wave { elapsed });
                }
                (ModifierSpec::Split { delay, angle_offset_deg }, ModifierState::Split { elapsed, triggered }) => {
                    if triggered {
                        continue;
                    }
                    let elapsed = elapsed + dt_ms;
                    if elapsed < delay {
                        bullet.runtime[slot] = Some(ModifierState::Split {
                            elapsed,
                            triggered: false,
                        });
                        continue;
                    }
                    bullet.runtime[slot] = Some(ModifierState::Split {
                        elapsed,
                        triggered: true,
                    });
                    self.split(bullet, angle_offset_deg, spawns);
                    return;
                }
                (
                    ModifierSpec::HomingLight {
                        duration,
                        turn_interval,
                        max_turn_rad,
                    },
                    ModifierState::Homing { elapsed, turn_timer },
                ) => {
                    // No target: no turn and no time spent
                    let Some(target) = target else {
                        continue;
                    };
                    let elapsed = elapsed + dt_ms;
                    let mut turn_timer = turn_timer + dt_ms;
                    if elapsed > duration {
                        bullet.runtime[slot] = None;
                        continue;
                    }
                    if turn_timer >= turn_interval {
                        turn_timer -= turn_interval;
                        let aim = angle_between(bullet.pos, target);
                        bullet.rotate_base_angle_towards(aim, max_turn_rad * self.tuning.homing_turn_scale);
                    }
                    bullet.runtime[slot] = Some(ModifierState::Homing { elapsed, turn_timer });
                }
                _ => {}
            }
        }
    }

    fn split(&self, bullet: &mut Bullet, angle_offset_deg: f32, spawns: &mut Vec<SpawnRequest>) {
        let modifiers: Vec<ModifierKind> = bullet
            .modifiers
            .iter()
            .copied()
            .filter(|k| *k != ModifierKind::Split)
            .collect();
        let heading = rad_to_deg(bullet.direction_angle());
        let offsets: &[f32] = match self.tuning.split_children {
            0 => &[],
            1 => &[0.0],
            _ => &[-angle_offset_deg, angle_offset_deg],
        };
        for offset in offsets {
            spawns.push(SpawnRequest {
                origin: bullet.pos,
                angle_deg: heading + offset,
                params: FireParams {
                    speed: bullet.base_speed(),
                    lifespan_ms: bullet.lifespan,
                    modifiers: modifiers.clone(),
                    tint: bullet.tint,
                    faction: bullet.faction,
                    damage: bullet.damage,
                },
            });
        }
        bullet.recycle();
    }
}

fn ramp_progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).clamp(0.0, 1.0)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BULLET_LIFESPAN_MS;

    fn bullet_with(mods: &[ModifierKind], engine: &ModifierEngine) -> Bullet {
        let mut b = Bullet::new();
        b.fire(
            Vec2::new(400.0, 225.0),
            0.0,
            &FireParams {
                speed: 100.0,
                modifiers: mods.to_vec(),
                ..Default::default()
            },
        );
        engine.attach(&mut b);
        b
    }

    fn step(engine: &ModifierEngine, b: &mut Bullet, dt: f32, target: Option<Vec2>) -> Vec<SpawnRequest> {
        let mut spawns = Vec::new();
        if b.tick(dt) {
            engine.update(b, dt, target, &mut spawns);
        }
        spawns
    }

    #[test]
    fn test_slow_start_clears_factor() {
        let engine = ModifierEngine::default();
        let mut b = bullet_with(&[ModifierKind::SlowStart], &engine);
        assert!((b.speed() - 40.0).abs() < 1e-4);
        step(&engine, &mut b, 250.0, None);
        assert!((b.speed() - 70.0).abs() < 1e-3);
        step(&engine, &mut b, 250.0, None);
        assert!(b.speed_factor(ModifierKind::SlowStart).is_none());
        assert!(b.runtime[ModifierKind::SlowStart.index()].is_none());
        assert_eq!(b.speed(), 100.0);
    }

    #[test]
    fn test_accelerate_keeps_final_factor() {
        let engine = ModifierEngine::default();
        let mut b = bullet_with(&[ModifierKind::Accelerate], &engine);
        for _ in 0..3 {
            step(&engine, &mut b, 1000.0, None);
        }
        assert!(b.runtime[ModifierKind::Accelerate.index()].is_none());
        assert_eq!(b.speed_factor(ModifierKind::Accelerate), Some(1.4));
        assert!((b.speed() - 140.0).abs() < 1e-3);
    }

    #[test]
    fn test_wave_offset_follows_sine() {
        let engine = ModifierEngine::default();
        let mut b = bullet_with(&[ModifierKind::Wave], &engine);
        step(&engine, &mut b, 200.0, None);
        // Quarter period: full amplitude
        let offset = b.angle_offset(ModifierKind::Wave).unwrap_or_default();
        assert!((offset - deg_to_rad(20.0)).abs() < 1e-4);
        assert!((b.direction_angle() - offset).abs() < 1e-6);
    }

    #[test]
    fn test_decay_clamps_lifespan_once() {
        let engine = ModifierEngine::default();
        let b = bullet_with(&[ModifierKind::Decay], &engine);
        assert_eq!(b.lifespan, 3000.0);
        assert!(b.runtime.iter().all(Option::is_none));

        let mut short = Bullet::new();
        short.fire(
            Vec2::ZERO,
            0.0,
            &FireParams {
                lifespan_ms: 1000.0,
                modifiers: vec![ModifierKind::Decay],
                ..Default::default()
            },
        );
        engine.attach(&mut short);
        assert_eq!(short.lifespan, 1000.0);
    }

    #[test]
    fn test_split_fires_once_on_crossing_tick() {
        let engine = ModifierEngine::default();
        let mut b = bullet_with(&[ModifierKind::Split, ModifierKind::Wave], &engine);

        assert!(step(&engine, &mut b, 700.0, None).is_empty());
        assert!(b.is_active());
        // Split runs before the wave offset on the next tick
        let heading = rad_to_deg(b.direction_angle());

        let children = step(&engine, &mut b, 700.0, None);
        assert_eq!(children.len(), 2);
        assert!(!b.is_active());

        assert!((children[0].angle_deg - (heading - 15.0)).abs() < 1e-3);
        assert!((children[1].angle_deg - (heading + 15.0)).abs() < 1e-3);
        for child in &children {
            assert_eq!(child.params.modifiers, vec![ModifierKind::Wave]);
            assert_eq!(child.params.speed, 100.0);
            assert!((child.params.lifespan_ms - (BULLET_LIFESPAN_MS - 1400.0)).abs() < 1e-3);
        }

        // Recycled parent produces nothing further
        assert!(step(&engine, &mut b, 700.0, None).is_empty());
    }

    #[test]
    fn test_homing_waits_for_interval_and_target() {
        let engine = ModifierEngine::default();
        let mut b = bullet_with(&[ModifierKind::HomingLight], &engine);
        let below = Some(Vec2::new(400.0, 1000.0));

        // Without a target nothing advances
        step(&engine, &mut b, 400.0, None);
        assert_eq!(
            b.runtime[ModifierKind::HomingLight.index()],
            Some(ModifierState::Homing {
                elapsed: 0.0,
                turn_timer: 0.0
            })
        );

        step(&engine, &mut b, 200.0, below);
        assert_eq!(b.base_angle(), 0.0);
        step(&engine, &mut b, 200.0, below);
        // One turn of at most 3° toward +y
        assert!((b.base_angle() - deg_to_rad(3.0)).abs() < 1e-5);
    }

    #[test]
    fn test_homing_expires_after_duration() {
        let engine = ModifierEngine::default();
        let mut b = bullet_with(&[ModifierKind::HomingLight], &engine);
        let target = Some(Vec2::new(400.0, 1000.0));
        for _ in 0..16 {
            step(&engine, &mut b, 100.0, target);
        }
        assert!(b.runtime[ModifierKind::HomingLight.index()].is_none());
        let heading = b.base_angle();
        step(&engine, &mut b, 300.0, target);
        assert_eq!(b.base_angle(), heading);
    }

    #[test]
    fn test_unknown_kinds_are_inert() {
        let engine = ModifierEngine::new(ModifierRegistry::empty());
        let mut b = bullet_with(&[ModifierKind::SlowStart, ModifierKind::Decay], &engine);
        assert_eq!(b.speed(), 100.0);
        assert_eq!(b.lifespan, BULLET_LIFESPAN_MS);
        step(&engine, &mut b, 100.0, None);
        assert_eq!(b.speed(), 100.0);
    }

    #[test]
    fn test_registry_resolves_ids() {
        let registry = ModifierRegistry::default();
        let kinds = registry.resolve_ids(&["MOD_WAVE", "MOD_NOPE", "MOD_SPLIT"]);
        assert_eq!(kinds, vec![ModifierKind::Wave, ModifierKind::Split]);
    }

    #[test]
    fn test_split_children_tuning() {
        let mut engine = ModifierEngine::default();
        engine.tuning.split_children = 1;
        let mut b = bullet_with(&[ModifierKind::Split], &engine);
        let spawns = step(&engine, &mut b, 1300.0, None);
        assert_eq!(spawns.len(), 1);
        assert!((spawns[0].angle_deg - 0.0).abs() < 1e-4);
    }
}

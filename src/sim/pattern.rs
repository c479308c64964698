//! Bullet pattern geometry
//!
//! Turns a pattern definition plus a firing context into bullets. Spiral
//! patterns remember their running angle per pattern id; aimed bursts queue
//! their later shots on a scheduler owned by the engine.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;

use super::bullet::{Faction, FireParams};
use super::modifier::ModifierKind;
use super::pool::BulletManager;
use super::schedule::{OwnerId, Scheduler};
use crate::consts::*;
use crate::tuning::{PatternDef, PatternKind};
use crate::{angle_between, rad_to_deg};

/// Firing context for one pattern call
#[derive(Debug, Clone, PartialEq)]
pub struct FireOptions {
    /// Aim point (the player)
    pub target: Option<Vec2>,
    pub base_angle_deg: f32,
    pub speed_multiplier: f32,
    /// Cap relative to the pattern's base speed
    pub speed_cap_factor: Option<f32>,
    /// Absolute cap (px/s)
    pub speed_cap: Option<f32>,
    pub modifiers: Vec<ModifierKind>,
    pub tint: Option<u32>,
    pub faction: Faction,
    pub lifespan_ms: f32,
    /// Entity that fired; queued burst shots are cancelled with it
    pub owner: OwnerId,
}

impl Default for FireOptions {
    fn default() -> Self {
        Self {
            target: None,
            base_angle_deg: PATTERN_BASE_ANGLE_DEG,
            speed_multiplier: 1.0,
            speed_cap_factor: None,
            speed_cap: None,
            modifiers: Vec::new(),
            tint: None,
            faction: Faction::Enemy,
            lifespan_ms: BULLET_LIFESPAN_MS,
            owner: 0,
        }
    }
}

/// A burst shot waiting for its delay
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedShot {
    pub origin: Vec2,
    pub angle_deg: f32,
    pub params: FireParams,
}

#[derive(Debug, Clone, Default)]
pub struct PatternEngine {
    patterns: BTreeMap<String, PatternDef>,
    /// Running spiral angle per pattern id (degrees, mod 360)
    spiral_offsets: BTreeMap<String, f32>,
    bursts: Scheduler<QueuedShot>,
    /// Extra speed factor for rain patterns
    pub rain_speed_multiplier: f32,
}

impl PatternEngine {
    pub fn new(patterns: BTreeMap<String, PatternDef>) -> Self {
        Self {
            patterns,
            spiral_offsets: BTreeMap::new(),
            bursts: Scheduler::new(),
            rain_speed_multiplier: 1.0,
        }
    }

    pub fn pattern(&self, id: &str) -> Option<&PatternDef> {
        self.patterns.get(id)
    }

    /// Current spiral angle for `pattern_id` (0 before the first call)
    pub fn spiral_offset(&self, pattern_id: &str) -> f32 {
        self.spiral_offsets.get(pattern_id).copied().unwrap_or(0.0)
    }

    /// Burst shots still queued
    pub fn queued_shots(&self) -> usize {
        self.bursts.len()
    }

    /// Fire `pattern_id` from `origin`. Unknown ids log and do nothing.
    pub fn fire(
        &mut self,
        pattern_id: &str,
        origin: Vec2,
        opts: &FireOptions,
        bullets: &mut BulletManager,
        rng: &mut impl Rng,
    ) -> bool {
        let Some(def) = self.patterns.get(pattern_id).cloned() else {
            log::warn!("Pattern '{pattern_id}' not found");
            return false;
        };
        let count = def.count();
        let params = self.bullet_params(&def, opts);

        match def.kind {
            PatternKind::Ring => {
                let step = 360.0 / count as f32;
                for i in 0..count {
                    bullets.spawn(origin, step * i as f32, &params);
                }
            }
            PatternKind::Fan => {
                let spread = def.spread_angle;
                let step = if count > 1 { spread / (count - 1) as f32 } else { 0.0 };
                let center = match (def.aim_at_player, opts.target) {
                    (true, Some(target)) => aim_deg(origin, target),
                    _ => opts.base_angle_deg,
                };
                let start = center - spread / 2.0;
                let jitter = def.random_offset.abs();
                for i in 0..count {
                    let noise = if jitter > 0.0 {
                        rng.random_range(-jitter..=jitter)
                    } else {
                        0.0
                    };
                    bullets.spawn(origin, start + step * i as f32 + noise, &params);
                }
            }
            PatternKind::AimedSingle => {
                let angle = opts
                    .target
                    .map_or(opts.base_angle_deg, |t| aim_deg(origin, t));
                bullets.spawn(origin, angle, &params);
            }
            PatternKind::AimedBurst => {
                // Aimed once; later shots reuse the angle
                let angle = opts
                    .target
                    .map_or(opts.base_angle_deg, |t| aim_deg(origin, t));
                let interval = def.burst_interval.unwrap_or(BURST_INTERVAL_MS);
                bullets.spawn(origin, angle, &params);
                for i in 1..count {
                    self.bursts.schedule_once(
                        opts.owner,
                        interval * i as f32,
                        QueuedShot {
                            origin,
                            angle_deg: angle,
                            params: params.clone(),
                        },
                    );
                }
            }
            PatternKind::Spiral => {
                let step = def.angle_step.unwrap_or(SPIRAL_ANGLE_STEP_DEG);
                let mut angle = self.spiral_offset(&def.id);
                for _ in 0..count {
                    bullets.spawn(origin, angle + opts.base_angle_deg, &params);
                    angle += step;
                }
                self.spiral_offsets.insert(def.id.clone(), angle % 360.0);
            }
            PatternKind::Rain => {
                let mut params = params;
                params.speed *= self.rain_speed_multiplier;
                for _ in 0..count {
                    let x = rng.random_range(0.0..=ARENA_WIDTH);
                    bullets.spawn(Vec2::new(x, 0.0), 90.0, &params);
                }
            }
        }
        true
    }

    fn bullet_params(&self, def: &PatternDef, opts: &FireOptions) -> FireParams {
        let base = def.base_speed.unwrap_or(PATTERN_BASE_SPEED);
        let mut speed = base * opts.speed_multiplier;
        if let Some(factor) = opts.speed_cap_factor {
            speed = speed.min(base * factor);
        }
        if let Some(cap) = opts.speed_cap {
            speed = speed.min(cap);
        }
        FireParams {
            speed,
            lifespan_ms: opts.lifespan_ms,
            modifiers: opts.modifiers.clone(),
            tint: opts.tint,
            faction: opts.faction,
            damage: 1.0,
        }
    }

    /// Release burst shots that came due
    pub fn update(&mut self, dt_ms: f32, bullets: &mut BulletManager) {
        for shot in self.bursts.advance(dt_ms) {
            let QueuedShot {
                origin,
                angle_deg,
                params,
            } = shot.payload;
            bullets.spawn(origin, angle_deg, &params);
        }
    }

    /// Drop queued shots fired by `owner`
    pub fn cancel_owner(&mut self, owner: OwnerId) {
        self.bursts.cancel_owner(owner);
    }

    /// Drop every queued shot
    pub fn cancel_all(&mut self) {
        self.bursts.clear();
    }
}

fn aim_deg(origin: Vec2, target: Vec2) -> f32 {
    rad_to_deg(angle_between(origin, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn def(json: &str) -> PatternDef {
        serde_json::from_str(json).unwrap()
    }

    fn engine_with(defs: &[PatternDef]) -> PatternEngine {
        PatternEngine::new(defs.iter().map(|d| (d.id.clone(), d.clone())).collect())
    }

    fn angles(pool: &BulletManager) -> Vec<f32> {
        pool.iter()
            .map(|(_, b)| {
                let mut a = rad_to_deg(b.direction_angle()).round();
                if a < -180.0 {
                    a += 360.0;
                }
                a
            })
            .collect()
    }

    fn origin() -> Vec2 {
        Vec2::new(400.0, 200.0)
    }

    #[test]
    fn test_ring_ignores_base_angle() {
        let mut engine = engine_with(&[def(r#"{"id": "R", "type": "ring", "bulletCount": 4}"#)]);
        let mut rng = Pcg32::seed_from_u64(1);
        for base in [-90.0, 33.0] {
            let mut pool = BulletManager::default();
            let opts = FireOptions {
                base_angle_deg: base,
                ..Default::default()
            };
            assert!(engine.fire("R", origin(), &opts, &mut pool, &mut rng));
            assert_eq!(angles(&pool), vec![0.0, 90.0, 180.0, 270.0]);
        }
    }

    #[test]
    fn test_fan_centered_on_base_angle() {
        let mut engine = engine_with(&[def(
            r#"{"id": "F", "type": "fan", "bulletCount": 3, "spreadAngle": 60}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut pool = BulletManager::default();
        engine.fire("F", origin(), &FireOptions::default(), &mut pool, &mut rng);
        assert_eq!(angles(&pool), vec![-120.0, -90.0, -60.0]);
    }

    #[test]
    fn test_fan_aims_at_target() {
        let mut engine = engine_with(&[def(
            r#"{"id": "F", "type": "fan", "bulletCount": 3, "spreadAngle": 20, "aimAtPlayer": true}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut pool = BulletManager::default();
        let opts = FireOptions {
            target: Some(origin() + Vec2::new(100.0, 0.0)),
            ..Default::default()
        };
        engine.fire("F", origin(), &opts, &mut pool, &mut rng);
        assert_eq!(angles(&pool), vec![-10.0, 0.0, 10.0]);
    }

    #[test]
    fn test_fan_jitter_bounded() {
        let mut engine = engine_with(&[def(
            r#"{"id": "F", "type": "fan", "bulletCount": 1, "randomOffset": 5}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(9);
        let mut pool = BulletManager::default();
        for _ in 0..50 {
            engine.fire("F", origin(), &FireOptions::default(), &mut pool, &mut rng);
        }
        for (_, b) in pool.iter() {
            let a = rad_to_deg(b.direction_angle());
            assert!((-95.0 - 1e-3..=-85.0 + 1e-3).contains(&a));
        }
    }

    #[test]
    fn test_spiral_persists_between_calls() {
        let mut engine = engine_with(&[def(
            r#"{"id": "S", "type": "spiral", "bulletCount": 1, "angleStep": 20}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);
        let opts = FireOptions {
            base_angle_deg: 0.0,
            ..Default::default()
        };
        let mut emitted = Vec::new();
        for _ in 0..3 {
            let mut pool = BulletManager::default();
            engine.fire("S", origin(), &opts, &mut pool, &mut rng);
            emitted.extend(angles(&pool));
        }
        assert_eq!(emitted, vec![0.0, 20.0, 40.0]);
        assert_eq!(engine.spiral_offset("S"), 60.0);
    }

    #[test]
    fn test_spiral_wraps_at_360() {
        let mut engine = engine_with(&[def(
            r#"{"id": "S", "type": "spiral", "bulletCount": 5, "angleStep": 100}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut pool = BulletManager::default();
        engine.fire("S", origin(), &FireOptions::default(), &mut pool, &mut rng);
        assert_eq!(engine.spiral_offset("S"), 140.0);
    }

    #[test]
    fn test_aimed_burst_reuses_angle() {
        let mut engine = engine_with(&[def(
            r#"{"id": "B", "type": "aimed_burst", "bulletCount": 3, "burstInterval": 100}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut pool = BulletManager::default();
        let opts = FireOptions {
            target: Some(origin() + Vec2::new(0.0, 50.0)),
            owner: 7,
            ..Default::default()
        };
        engine.fire("B", origin(), &opts, &mut pool, &mut rng);
        assert_eq!(pool.len(), 1);
        assert_eq!(engine.queued_shots(), 2);

        engine.update(100.0, &mut pool);
        assert_eq!(pool.len(), 2);
        engine.update(100.0, &mut pool);
        assert_eq!(pool.len(), 3);
        assert!(angles(&pool).iter().all(|a| *a == 90.0));
    }

    #[test]
    fn test_burst_cancelled_with_owner() {
        let mut engine = engine_with(&[def(
            r#"{"id": "B", "type": "aimed_burst", "bulletCount": 4}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut pool = BulletManager::default();
        let opts = FireOptions {
            owner: 3,
            ..Default::default()
        };
        engine.fire("B", origin(), &opts, &mut pool, &mut rng);
        engine.cancel_owner(3);
        engine.update(1000.0, &mut pool);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_rain_falls_from_top_edge() {
        let mut engine = engine_with(&[def(r#"{"id": "W", "type": "rain", "bulletCount": 6}"#)]);
        let mut rng = Pcg32::seed_from_u64(4);
        let mut pool = BulletManager::default();
        let opts = FireOptions {
            base_angle_deg: 12.0,
            ..Default::default()
        };
        engine.fire("W", Vec2::new(400.0, 300.0), &opts, &mut pool, &mut rng);
        assert_eq!(pool.len(), 6);
        for (_, b) in pool.iter() {
            assert_eq!(b.pos.y, 0.0);
            assert!((0.0..=ARENA_WIDTH).contains(&b.pos.x));
            assert!((rad_to_deg(b.direction_angle()) - 90.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_speed_caps_are_independent() {
        let mut engine = engine_with(&[def(
            r#"{"id": "A", "type": "aimed_single", "baseSpeed": 100}"#,
        )]);
        let mut rng = Pcg32::seed_from_u64(1);

        let mut fire = |opts: FireOptions| {
            let mut pool = BulletManager::default();
            engine.fire("A", origin(), &opts, &mut pool, &mut rng);
            pool.iter().map(|(_, b)| b.speed()).next().unwrap_or(0.0)
        };

        assert_eq!(fire(FireOptions { speed_multiplier: 2.0, ..Default::default() }), 200.0);
        assert_eq!(
            fire(FireOptions {
                speed_multiplier: 2.0,
                speed_cap_factor: Some(1.6),
                ..Default::default()
            }),
            160.0
        );
        assert_eq!(
            fire(FireOptions {
                speed_multiplier: 2.0,
                speed_cap_factor: Some(1.6),
                speed_cap: Some(120.0),
                ..Default::default()
            }),
            120.0
        );
    }

    #[test]
    fn test_unknown_pattern_is_noop() {
        let mut engine = PatternEngine::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut pool = BulletManager::default();
        assert!(!engine.fire("PAT_NOPE", origin(), &FireOptions::default(), &mut pool, &mut rng));
        assert!(pool.is_empty());
    }
}

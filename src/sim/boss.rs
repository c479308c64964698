//! Boss phase state machine
//!
//! A boss carries an ordered list of hp-ratio bands. Whenever hp changes the
//! first band containing the current ratio becomes the phase; entering a
//! phase tears down every timer the previous phase scheduled and runs the
//! new phase's entry steps. Timers and entry steps do not touch the world
//! directly: they queue [`BossCommand`]s that the run drains each step.

use glam::Vec2;
use rand::Rng;

use super::schedule::{OwnerId, Scheduler};
use crate::consts::*;
use crate::tuning::{AngleSpec, Attack, PatternAttack, PhaseDef, PhaseStep};

/// Side effect requested by a boss
#[derive(Debug, Clone, PartialEq)]
pub enum BossCommand {
    Fire {
        pattern_id: String,
        modifiers: Vec<String>,
        base_angle_deg: f32,
        speed_cap_factor: Option<f32>,
        tint: Option<u32>,
    },
    SpawnAdds {
        enemy_id: String,
        count: u32,
        radius: f32,
    },
    PhaseEntered {
        index: usize,
        id: String,
    },
    FinalPhase,
}

/// Timer payload: index of the entry step that scheduled it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseTimer {
    step: usize,
}

/// Phase controller attached to a boss enemy
#[derive(Debug, Clone, Default)]
pub struct Boss {
    phases: Vec<PhaseDef>,
    current: Option<usize>,
    timers: Scheduler<PhaseTimer>,
    /// Firings per entry step of the current phase
    fire_counts: Vec<u32>,
    final_phase: bool,
    outbox: Vec<BossCommand>,
}

impl Boss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the phase list and enter whichever phase `ratio` selects
    pub fn set_phases(&mut self, phases: Vec<PhaseDef>, ratio: f32) {
        self.phases = phases;
        self.current = None;
        self.evaluate(ratio, true);
    }

    pub fn phases(&self) -> &[PhaseDef] {
        &self.phases
    }

    /// Index of the current phase, None before any phase was entered
    pub fn current_phase(&self) -> Option<usize> {
        self.current
    }

    pub fn is_final_phase(&self) -> bool {
        self.final_phase
    }

    /// Pending phase timers
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// First phase whose band contains `ratio`.
    ///
    /// Bands are half-open at the bottom, except that ratio 0 matches a band
    /// whose lower bound is exactly 0.
    pub fn select_phase(&self, ratio: f32) -> Option<usize> {
        let ratio = ratio.clamp(0.0, 1.0);
        self.phases.iter().position(|phase| {
            ratio <= phase.max_ratio
                && (ratio > phase.min_ratio || (ratio == 0.0 && phase.min_ratio == 0.0))
        })
    }

    /// Re-select the phase for `ratio`. Returns whether a phase was entered.
    pub fn evaluate(&mut self, ratio: f32, force: bool) -> bool {
        if self.phases.is_empty() {
            return false;
        }
        let next = self.select_phase(ratio).or(self.current);
        if next != self.current || force {
            if let Some(index) = next {
                return self.start_phase(index);
            }
        }
        false
    }

    /// Enter phase `index`; out-of-range indices are ignored
    pub fn start_phase(&mut self, index: usize) -> bool {
        let Some(phase) = self.phases.get(index).cloned() else {
            return false;
        };
        self.timers.clear();
        self.current = Some(index);
        self.fire_counts = vec![0; phase.on_enter.len()];
        log::info!("Boss phase {} ({})", index + 1, phase.id);
        self.outbox.push(BossCommand::PhaseEntered {
            index,
            id: phase.id.clone(),
        });

        let owner = index as OwnerId;
        for (step_index, step) in phase.on_enter.iter().enumerate() {
            match step {
                PhaseStep::Every { interval_ms, .. } => {
                    self.timers
                        .schedule_every(owner, *interval_ms, PhaseTimer { step: step_index });
                }
                PhaseStep::SpawnAdds {
                    enemy_id,
                    count,
                    radius,
                    delay_ms,
                } => match delay_ms {
                    Some(delay) => {
                        self.timers
                            .schedule_once(owner, *delay, PhaseTimer { step: step_index });
                    }
                    None => self.outbox.push(BossCommand::SpawnAdds {
                        enemy_id: enemy_id.clone(),
                        count: *count,
                        radius: *radius,
                    }),
                },
                PhaseStep::FinalPhase => {
                    self.final_phase = true;
                    self.outbox.push(BossCommand::FinalPhase);
                }
            }
        }
        true
    }

    /// Advance phase timers and queue whatever they trigger
    pub fn update(&mut self, dt_ms: f32, rng: &mut impl Rng) {
        let Some(index) = self.current else {
            return;
        };
        let fired = self.timers.advance(dt_ms);
        if fired.is_empty() {
            return;
        }
        let Some(phase) = self.phases.get(index).cloned() else {
            return;
        };
        for event in fired {
            let step = event.payload.step;
            let Some(def) = phase.on_enter.get(step) else {
                continue;
            };
            let count = self.fire_counts.get(step).copied().unwrap_or(0);
            if let Some(slot) = self.fire_counts.get_mut(step) {
                *slot += 1;
            }
            match def {
                PhaseStep::Every { attack, .. } => self.perform(attack, count, rng),
                PhaseStep::SpawnAdds {
                    enemy_id,
                    count,
                    radius,
                    ..
                } => self.outbox.push(BossCommand::SpawnAdds {
                    enemy_id: enemy_id.clone(),
                    count: *count,
                    radius: *radius,
                }),
                PhaseStep::FinalPhase => {}
            }
        }
    }

    fn perform(&mut self, attack: &Attack, firing: u32, rng: &mut impl Rng) {
        match attack {
            Attack::Pattern(p) => self.fire(p, firing, rng),
            Attack::Alternate { attacks } => {
                if !attacks.is_empty() {
                    let pick = firing as usize % attacks.len();
                    // Rotation is counted per firing of this pick
                    let own_firing = firing / attacks.len() as u32;
                    self.fire(&attacks[pick], own_firing, rng);
                }
            }
            Attack::Adds {
                enemy_id,
                count,
                radius,
            } => self.outbox.push(BossCommand::SpawnAdds {
                enemy_id: enemy_id.clone(),
                count: *count,
                radius: *radius,
            }),
        }
    }

    fn fire(&mut self, attack: &PatternAttack, firing: u32, rng: &mut impl Rng) {
        let base_angle_deg = match attack.angle {
            AngleSpec::Default => PATTERN_BASE_ANGLE_DEG,
            AngleSpec::Fixed { deg } => deg,
            AngleSpec::Random => rng.random_range(0.0..=360.0),
            AngleSpec::Rotating { start, step } => (start + step * firing as f32) % 360.0,
        };
        self.outbox.push(BossCommand::Fire {
            pattern_id: attack.pattern_id.clone(),
            modifiers: attack.modifiers.clone(),
            base_angle_deg,
            speed_cap_factor: attack.speed_cap_factor,
            tint: attack.tint,
        });
    }

    /// Tear down every phase timer (death, despawn)
    pub fn clear_timers(&mut self) {
        self.timers.clear();
    }

    /// Take queued commands
    pub fn drain_commands(&mut self) -> Vec<BossCommand> {
        std::mem::take(&mut self.outbox)
    }
}

/// Positions for reinforcements on a jittered ring around `center`, kept inside the arena
pub fn adds_positions(center: Vec2, count: u32, radius: f32, rng: &mut impl Rng) -> Vec<Vec2> {
    (0..count)
        .map(|_| {
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            let distance = radius + rng.random_range(-ADDS_RADIUS_JITTER..=ADDS_RADIUS_JITTER);
            let p = center + crate::direction(angle) * distance;
            Vec2::new(
                p.x.clamp(ADDS_MARGIN, ARENA_WIDTH - ADDS_MARGIN),
                p.y.clamp(ADDS_MARGIN, ARENA_HEIGHT - ADDS_MARGIN),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameData;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn phase(id: &str, min: f32, max: f32, on_enter: Vec<PhaseStep>) -> PhaseDef {
        PhaseDef {
            id: id.to_string(),
            min_ratio: min,
            max_ratio: max,
            on_enter,
        }
    }

    fn every(interval_ms: f32, pattern: &str) -> PhaseStep {
        PhaseStep::Every {
            interval_ms,
            attack: Attack::Pattern(PatternAttack {
                pattern_id: pattern.to_string(),
                modifiers: Vec::new(),
                angle: AngleSpec::Default,
                speed_cap_factor: None,
                tint: None,
            }),
        }
    }

    fn two_phase() -> Vec<PhaseDef> {
        vec![
            phase("P1", 0.5, 1.0, vec![every(1000.0, "A"), every(3000.0, "B")]),
            phase("P2", 0.0, 0.5, vec![every(500.0, "C")]),
        ]
    }

    fn entered(cmds: &[BossCommand]) -> usize {
        cmds.iter()
            .filter(|c| matches!(c, BossCommand::PhaseEntered { .. }))
            .count()
    }

    #[test]
    fn test_selection_bands() {
        let mut boss = Boss::new();
        boss.set_phases(two_phase(), 1.0);
        assert_eq!(boss.select_phase(1.0), Some(0));
        assert_eq!(boss.select_phase(0.51), Some(0));
        // Lower bound is exclusive
        assert_eq!(boss.select_phase(0.5), Some(1));
        assert_eq!(boss.select_phase(0.0), Some(1));
        assert_eq!(boss.select_phase(-3.0), Some(1));
    }

    #[test]
    fn test_gap_keeps_current_phase() {
        let mut boss = Boss::new();
        boss.set_phases(
            vec![
                phase("HI", 0.6, 1.0, vec![every(100.0, "A")]),
                phase("LO", 0.0, 0.4, vec![every(100.0, "B")]),
            ],
            1.0,
        );
        boss.drain_commands();
        assert!(!boss.evaluate(0.5, false));
        assert_eq!(boss.current_phase(), Some(0));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut boss = Boss::new();
        boss.set_phases(two_phase(), 1.0);
        assert_eq!(entered(&boss.drain_commands()), 1);
        assert!(!boss.evaluate(0.8, false));
        assert!(!boss.evaluate(0.8, false));
        assert!(boss.drain_commands().is_empty());
        assert_eq!(boss.current_phase(), Some(0));
    }

    #[test]
    fn test_transition_replaces_timers() {
        let mut boss = Boss::new();
        boss.set_phases(two_phase(), 1.0);
        assert_eq!(boss.timer_count(), 2);
        assert!(boss.evaluate(0.3, false));
        assert_eq!(boss.current_phase(), Some(1));
        assert_eq!(boss.timer_count(), 1);
        // Forced re-entry does not stack timers
        assert!(boss.evaluate(0.3, true));
        assert_eq!(boss.timer_count(), 1);
    }

    #[test]
    fn test_invalid_start_ignored() {
        let mut boss = Boss::new();
        boss.set_phases(two_phase(), 1.0);
        assert!(!boss.start_phase(9));
        assert_eq!(boss.current_phase(), Some(0));
    }

    #[test]
    fn test_timers_queue_fire_commands() {
        let mut boss = Boss::new();
        let mut rng = Pcg32::seed_from_u64(3);
        boss.set_phases(two_phase(), 1.0);
        boss.drain_commands();
        boss.update(3000.0, &mut rng);
        let fired: Vec<String> = boss
            .drain_commands()
            .into_iter()
            .filter_map(|c| match c {
                BossCommand::Fire { pattern_id, .. } => Some(pattern_id),
                _ => None,
            })
            .collect();
        assert_eq!(fired, vec!["A", "A", "A", "B"]);
    }

    #[test]
    fn test_alternate_and_rotating_angles() {
        let alt = PhaseStep::Every {
            interval_ms: 100.0,
            attack: Attack::Alternate {
                attacks: vec![
                    PatternAttack {
                        pattern_id: "X".into(),
                        modifiers: vec![],
                        angle: AngleSpec::Rotating {
                            start: 350.0,
                            step: 20.0,
                        },
                        speed_cap_factor: None,
                        tint: None,
                    },
                    PatternAttack {
                        pattern_id: "Y".into(),
                        modifiers: vec![],
                        angle: AngleSpec::Fixed { deg: 90.0 },
                        speed_cap_factor: None,
                        tint: None,
                    },
                ],
            },
        };
        let mut boss = Boss::new();
        let mut rng = Pcg32::seed_from_u64(3);
        boss.set_phases(vec![phase("P", 0.0, 1.0, vec![alt])], 1.0);
        boss.drain_commands();
        boss.update(400.0, &mut rng);
        let shots: Vec<(String, f32)> = boss
            .drain_commands()
            .into_iter()
            .filter_map(|c| match c {
                BossCommand::Fire {
                    pattern_id,
                    base_angle_deg,
                    ..
                } => Some((pattern_id, base_angle_deg)),
                _ => None,
            })
            .collect();
        assert_eq!(
            shots,
            vec![
                ("X".to_string(), 350.0),
                ("Y".to_string(), 90.0),
                ("X".to_string(), 10.0),
                ("Y".to_string(), 90.0),
            ]
        );
    }

    #[test]
    fn test_delayed_adds_cancelled_by_phase_change() {
        let adds = PhaseStep::SpawnAdds {
            enemy_id: "EN".into(),
            count: 2,
            radius: 100.0,
            delay_ms: Some(1500.0),
        };
        let mut boss = Boss::new();
        let mut rng = Pcg32::seed_from_u64(3);
        boss.set_phases(
            vec![
                phase("P1", 0.5, 1.0, vec![adds]),
                phase("P2", 0.0, 0.5, vec![]),
            ],
            1.0,
        );
        boss.drain_commands();
        boss.evaluate(0.2, false);
        boss.update(2000.0, &mut rng);
        assert!(!boss
            .drain_commands()
            .iter()
            .any(|c| matches!(c, BossCommand::SpawnAdds { .. })));
    }

    #[test]
    fn test_builtin_heart_script() {
        let data = GameData::builtin().expect("builtin tables");
        let heart = data.enemy("BOSS_CORE_HEART").expect("heart");
        let mut boss = Boss::new();
        boss.set_phases(heart.phases.clone(), 1.0);
        let cmds = boss.drain_commands();
        assert!(cmds.iter().any(|c| matches!(c, BossCommand::SpawnAdds { count: 4, .. })));
        assert_eq!(boss.timer_count(), 2);

        boss.evaluate(0.5, false);
        // Two attack timers plus one delayed reinforcement
        assert_eq!(boss.timer_count(), 3);

        boss.evaluate(0.1, false);
        assert!(boss.is_final_phase());
        assert!(boss.drain_commands().contains(&BossCommand::FinalPhase));
        assert_eq!(boss.timer_count(), 2);
    }

    #[test]
    fn test_adds_positions_clamped() {
        let mut rng = Pcg32::seed_from_u64(11);
        let corner = Vec2::new(10.0, 10.0);
        for p in adds_positions(corner, 20, 200.0, &mut rng) {
            assert!((ADDS_MARGIN..=ARENA_WIDTH - ADDS_MARGIN).contains(&p.x));
            assert!((ADDS_MARGIN..=ARENA_HEIGHT - ADDS_MARGIN).contains(&p.y));
        }
    }
}

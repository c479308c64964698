//! Fixed timestep simulation tick
//!
//! One call advances every subsystem of a run in a fixed order:
//! player → bullets and queued pattern shots → enemies and boss timers →
//! wave spawns → overlaps → boss side effects → deaths → wave progression.

use glam::Vec2;

use super::collision::detect_overlaps;
use super::entity::{Damageable, EntityId, Tickable};
use super::modifier::ModifierKind;
use super::player::PlayerInput;
use super::state::RunState;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub player: PlayerInput,
    /// Pause toggle
    pub pause: bool,
    /// Index into the open perk offer
    pub perk_choice: Option<usize>,
}

/// A regular enemy's shot, collected before firing
struct EnemyShot {
    owner: EntityId,
    origin: Vec2,
    pattern_id: String,
    speed: f32,
    modifiers: Vec<ModifierKind>,
}

/// Advance the run by one fixed timestep
pub fn tick(state: &mut RunState, input: &TickInput, dt_ms: f32) {
    if input.pause {
        state.toggle_pause();
    }
    if let Some(choice) = input.perk_choice {
        if let Some(id) = state.perk_offer().get(choice).cloned() {
            state.select_perk(&id);
        }
    }

    if state.is_finished() {
        return;
    }
    let dt = dt_ms * state.time_scale();
    if dt <= 0.0 {
        return;
    }
    state.play_time_ms += dt;

    // Player moves and auto-fires
    state
        .player
        .update(dt, &input.player, &mut state.bullets, &mut state.rng);
    let target = state.player.is_alive().then_some(state.player.pos);

    // Bullets, modifiers and queued burst shots
    state.bullets.update(dt, target);
    state.patterns.update(dt, &mut state.bullets);

    // Enemies steer, count down fire timers and run boss phase timers
    let mut shots = Vec::new();
    for enemy in state.spawner.enemies_mut() {
        if !enemy.is_alive() {
            continue;
        }
        enemy.steer(target, dt);
        enemy.advance(dt);
        if let Some(boss) = enemy.boss.as_mut() {
            boss.update(dt, &mut state.rng);
        }
        if enemy.take_shot() {
            if let Some(pattern_id) = enemy.next_pattern_id(&mut state.rng) {
                shots.push(EnemyShot {
                    owner: enemy.id,
                    origin: enemy.pos,
                    pattern_id: pattern_id.to_string(),
                    speed: enemy.bullet_speed_multiplier,
                    modifiers: enemy.modifiers.clone(),
                });
            }
        }
    }
    for shot in shots {
        let opts = super::pattern::FireOptions {
            modifiers: shot.modifiers,
            ..state.enemy_fire_options(shot.owner, shot.speed)
        };
        state
            .patterns
            .fire(&shot.pattern_id, shot.origin, &opts, &mut state.bullets, &mut state.rng);
    }

    // Scheduled wave spawns
    state
        .spawner
        .update(dt, &state.data, &state.roguelike, &mut state.rng);

    // Overlaps: damage first, then recycling
    let overlaps = detect_overlaps(&state.bullets, state.spawner.enemies(), &state.player);
    for overlap in overlaps {
        state.apply_overlap(overlap);
        if state.is_finished() {
            return;
        }
    }

    state.run_boss_commands();
    state.collect_dead();
    state.update_waves(dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::GameData;
    use crate::consts::*;
    use crate::progression::{Difficulty, MetaProgression};
    use crate::sim::bullet::Faction;
    use crate::sim::state::{GameEvent, RunConfig, RunResult};
    use crate::sim::wave::WaveState;

    fn new_run(seed: u64) -> RunState {
        let data = Arc::new(GameData::builtin().expect("builtin tables"));
        let meta = MetaProgression::new(&data);
        let mut state = RunState::new(
            data,
            meta,
            RunConfig {
                seed,
                difficulty: Difficulty::Normal,
            },
        );
        state.start();
        state
    }

    fn steps(state: &mut RunState, n: u32, input: &TickInput) {
        for _ in 0..n {
            tick(state, input, SIM_DT_MS);
        }
    }

    #[test]
    fn test_first_step_spawns_wave_one() {
        let mut state = new_run(1);
        steps(&mut state, 1, &TickInput::default());
        // Three grunts at delay 0; the swarmers wait three seconds
        assert_eq!(state.spawner.alive_count(), 3);
        assert_eq!(state.spawner.pending(), 1);
        assert!(state.bullets.iter().all(|(_, b)| b.faction == Faction::Player));
    }

    #[test]
    fn test_pause_freezes_simulation() {
        let mut state = new_run(2);
        steps(&mut state, 10, &TickInput::default());
        let before = state.play_time_ms();

        let toggle = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &toggle, SIM_DT_MS);
        assert!(state.is_paused());
        steps(&mut state, 30, &TickInput::default());
        assert_eq!(state.play_time_ms(), before);

        tick(&mut state, &toggle, SIM_DT_MS);
        assert!(!state.is_paused());
        assert!(state.play_time_ms() > before);
    }

    #[test]
    fn test_perk_choice_through_input() {
        let mut state = new_run(3);
        state.add_experience(10.0);
        assert!(state.is_level_up_active());
        let expected = state.perk_offer()[1].clone();
        let choose = TickInput {
            perk_choice: Some(1),
            ..Default::default()
        };
        tick(&mut state, &choose, SIM_DT_MS);
        assert!(!state.is_level_up_active());
        assert_eq!(state.perks.acquired(), [expected]);
    }

    #[test]
    fn test_killing_wave_one_advances() {
        let mut state = new_run(4);
        state.player.set_input_enabled(false);
        let idle = TickInput::default();
        // Let every wave-one spawn fire
        steps(&mut state, 200, &idle);
        assert_eq!(state.spawner.pending(), 0);

        for enemy in state.spawner.enemies_mut() {
            // No level-up pause in the middle of the check
            enemy.exp_reward = 0.0;
            enemy.take_damage(1_000.0);
        }
        state.drain_events();
        steps(&mut state, 1, &idle);
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::WaveCompleted { number: 1 })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::EnemyKilled { .. })));
        assert_eq!(state.waves.state(), WaveState::Interval);
        assert_eq!(state.core_earned(), 1);

        // Two-second interval, then wave two
        steps(&mut state, 121, &idle);
        assert_eq!(state.waves.current_number(), 2);
        assert_eq!(state.waves.state(), WaveState::Running);
    }

    #[test]
    fn test_player_death_finishes_run() {
        let mut state = new_run(5);
        state.player.hp = 1;
        // Park an enemy on the player
        steps(&mut state, 1, &TickInput::default());
        let pos = state.player.pos;
        if let Some(enemy) = state.spawner.enemies_mut().first_mut() {
            enemy.pos = pos;
        }
        steps(&mut state, 1, &TickInput::default());
        assert!(state.is_finished());
        assert_eq!(state.outcome().map(|o| o.result), Some(RunResult::Defeat));

        // Further ticks do nothing
        let t = state.play_time_ms();
        steps(&mut state, 5, &TickInput::default());
        assert_eq!(state.play_time_ms(), t);
    }

    #[test]
    fn test_determinism() {
        let mut a = new_run(99999);
        let mut b = new_run(99999);
        let inputs = [
            TickInput {
                player: PlayerInput {
                    move_dir: Vec2::new(1.0, 0.0),
                    ..Default::default()
                },
                ..Default::default()
            },
            TickInput {
                player: PlayerInput {
                    dash: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            TickInput::default(),
        ];
        for _ in 0..100 {
            for input in &inputs {
                tick(&mut a, input, SIM_DT_MS);
                tick(&mut b, input, SIM_DT_MS);
            }
        }
        assert_eq!(a.player.pos, b.player.pos);
        assert_eq!(a.bullets.len(), b.bullets.len());
        assert_eq!(a.spawner.alive_count(), b.spawner.alive_count());
        assert_eq!(a.hud(), b.hud());
    }
}

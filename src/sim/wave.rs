//! Wave progression state machine
//!
//! `Idle → Running → (Interval → Running)* → Finished`. The scheduler only
//! tracks state and timers; the run reacts to the returned [`WaveStep`] by
//! awarding currency, clearing enemies and starting the next wave.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::tuning::{WaveDef, WaveKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaveState {
    #[default]
    Idle,
    Running,
    /// Pause between waves
    Interval,
    Finished,
}

/// What the run must do after a wave update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveStep {
    Continue,
    /// The wave's clear condition was met
    Completed { number: u32, last: bool },
    /// The interval elapsed; start the wave at `index`
    StartNext { index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct WaveScheduler {
    waves: Vec<WaveDef>,
    state: WaveState,
    index: usize,
    elapsed_ms: f32,
    remaining_ms: f32,
    interval_ms: f32,
}

impl WaveScheduler {
    pub fn new(waves: Vec<WaveDef>) -> Self {
        Self {
            waves,
            ..Default::default()
        }
    }

    pub fn state(&self) -> WaveState {
        self.state
    }

    pub fn total(&self) -> usize {
        self.waves.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&WaveDef> {
        self.waves.get(self.index)
    }

    /// Wave number shown to the player, 0 before the first wave
    pub fn current_number(&self) -> u32 {
        match self.state {
            WaveState::Idle => 0,
            _ => self.current().map_or(0, |w| w.number),
        }
    }

    /// Time left in a survive wave (ms)
    pub fn remaining_ms(&self) -> f32 {
        self.remaining_ms
    }

    pub fn elapsed_ms(&self) -> f32 {
        self.elapsed_ms
    }

    /// Whether the running wave grants survival experience
    pub fn is_surviving(&self) -> bool {
        self.state == WaveState::Running && self.current().is_some_and(|w| w.kind == WaveKind::Survive)
    }

    /// Enter `Running` for the wave at `index`. None past the last wave.
    pub fn start(&mut self, index: usize) -> Option<&WaveDef> {
        if self.state == WaveState::Finished {
            return None;
        }
        let wave = self.waves.get(index)?;
        log::info!("Wave {} started ({:?})", wave.number, wave.kind);
        self.index = index;
        self.state = WaveState::Running;
        self.elapsed_ms = 0.0;
        self.remaining_ms = wave.time_limit.max(0.0) * 1000.0;
        self.interval_ms = 0.0;
        self.waves.get(index)
    }

    /// Advance timers and test the clear condition.
    ///
    /// `pending` and `alive` describe the spawner after this step's spawns
    /// and kills were applied.
    pub fn update(&mut self, dt_ms: f32, pending: bool, alive: usize) -> WaveStep {
        match self.state {
            WaveState::Running => {
                let Some(wave) = self.waves.get(self.index) else {
                    return WaveStep::Continue;
                };
                self.elapsed_ms += dt_ms;
                let cleared = match wave.kind {
                    WaveKind::Survive => {
                        self.remaining_ms = (self.remaining_ms - dt_ms).max(0.0);
                        self.remaining_ms <= 0.0
                    }
                    WaveKind::KillAll => !pending && alive == 0,
                };
                if cleared {
                    self.complete()
                } else {
                    WaveStep::Continue
                }
            }
            WaveState::Interval => {
                self.interval_ms -= dt_ms;
                if self.interval_ms <= 0.0 {
                    WaveStep::StartNext {
                        index: self.index + 1,
                    }
                } else {
                    WaveStep::Continue
                }
            }
            WaveState::Idle | WaveState::Finished => WaveStep::Continue,
        }
    }

    fn complete(&mut self) -> WaveStep {
        let number = self.current_number();
        let last = number as usize >= self.waves.len();
        log::info!("Wave {number} complete");
        if last {
            self.state = WaveState::Finished;
        } else {
            self.state = WaveState::Interval;
            self.interval_ms = WAVE_INTERVAL_MS;
        }
        WaveStep::Completed { number, last }
    }

    /// Stop progressing (run ended)
    pub fn finish(&mut self) {
        self.state = WaveState::Finished;
    }
}

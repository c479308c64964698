//! Bulletcore headless driver
//!
//! Plays one run with a scripted input, feeds the built-in overlap detector
//! and writes the meta progress back to the save file.
//!
//! Usage: `bulletcore [seed] [normal|hard] [save-path]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::sync::Arc;

    use glam::Vec2;

    use bulletcore::GameData;
    use bulletcore::consts::*;
    use bulletcore::persistence::{FileStore, SaveStore};
    use bulletcore::progression::{Difficulty, MetaProgression};
    use bulletcore::sim::{GameEvent, PlayerInput, RunConfig, RunState, TickInput, tick};

    /// Frame time of the simulated display (30 fps)
    const FRAME_MS: f32 = 1000.0 / 30.0;
    /// Give up after this much simulated time
    const MAX_RUN_MS: f32 = 20.0 * 60.0 * 1000.0;

    bulletcore::init_logging();

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(0xB011E7);
    let difficulty = args
        .next()
        .and_then(|s| Difficulty::from_str(&s))
        .unwrap_or_default();
    let save_path = args.next().unwrap_or_else(|| "bulletcore_save.json".to_string());

    let data = match GameData::builtin() {
        Ok(data) => Arc::new(data),
        Err(e) => {
            log::error!("Failed to load game data: {e}");
            std::process::exit(1);
        }
    };

    let mut store = FileStore::new(&save_path);
    let blob = store.load();
    let meta = MetaProgression::from_save(&data, &blob);
    log::info!("Bulletcore (headless) starting, {} core banked", meta.currency());

    let mut state = RunState::new(data, meta, RunConfig { seed, difficulty });
    state.start();

    let mut accumulator = 0.0f32;
    let mut frame: u64 = 0;
    while !state.is_finished() && state.play_time_ms() < MAX_RUN_MS {
        accumulator += FRAME_MS;
        frame += 1;

        // Sweep left and right along the bottom, dash every few seconds
        let t = frame as f32 * FRAME_MS / 1000.0;
        let input = TickInput {
            player: PlayerInput {
                move_dir: Vec2::new((t * 0.8).sin(), 0.0),
                slow: false,
                dash: frame % 120 == 0,
            },
            perk_choice: state.is_level_up_active().then_some(0),
            ..Default::default()
        };

        let mut substeps = 0;
        while accumulator >= SIM_DT_MS && substeps < MAX_SUBSTEPS {
            tick(&mut state, &input, SIM_DT_MS);
            accumulator -= SIM_DT_MS;
            substeps += 1;
        }

        for event in state.drain_events() {
            match event {
                GameEvent::RunFinished(outcome) => match serde_json::to_string_pretty(&outcome) {
                    Ok(json) => println!("{json}"),
                    Err(e) => log::warn!("Failed to encode run outcome: {e}"),
                },
                other => log::debug!("{other:?}"),
            }
        }
    }

    if !state.is_finished() {
        log::warn!("Run did not finish within the time budget");
        let hud = state.hud();
        println!("Stopped at wave {}/{} level {}", hud.wave, hud.total_waves, hud.level);
    }

    if let Err(e) = state.save_to(&mut store) {
        log::error!("Failed to save progress to {save_path}: {e}");
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on wasm32
}

//! Browser bindings
//!
//! Searches run synchronously inside the call; replays are driven by the
//! page's animation loop through `tick(now, onFrame, onEvent)`. Frames arrive
//! as a flat `Float32Array` of `[x0, y0, x1, y1, ...]` for the visible balls.

use js_sys::{Float32Array, Function};
use wasm_bindgen::prelude::*;

use crate::config::{PlinkoConfig, RaceConfig};
use crate::sim::{
    DropSimulator, PlaybackState, RaceEngine, ReplayDriver, ReplaySink, Trace, TraceEvent,
    VisualBall,
};

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::warn!("Logger already initialised");
    }
    log::info!("Plinko sim ready");
}

struct JsSink<'a> {
    on_frame: &'a Function,
    on_event: &'a Function,
}

impl ReplaySink for JsSink<'_> {
    fn on_frame(&mut self, frame: u32, balls: &[VisualBall]) {
        let positions: Vec<f32> = balls
            .iter()
            .flat_map(|b| [b.position.x, b.position.y])
            .collect();
        let array = Float32Array::from(positions.as_slice());
        if let Err(err) = self
            .on_frame
            .call2(&JsValue::NULL, &JsValue::from(frame), &array)
        {
            log::warn!("onFrame threw: {err:?}");
        }
    }

    fn on_event(&mut self, event: &TraceEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("Could not encode event: {err}");
                return;
            }
        };
        if let Err(err) = self.on_event.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
            log::warn!("onEvent threw: {err:?}");
        }
    }
}

fn state_name(state: PlaybackState) -> String {
    match state {
        PlaybackState::Idle => "idle",
        PlaybackState::Playing => "playing",
        PlaybackState::Finished => "finished",
        PlaybackState::Cancelled => "cancelled",
    }
    .to_string()
}

/// Replay plumbing shared by both sessions
#[derive(Default)]
struct Player {
    driver: ReplayDriver,
}

impl Player {
    fn play(&mut self, trace_json: &str, now: f64) -> Result<(), JsError> {
        let trace = Trace::from_json(trace_json)?;
        self.driver.start(trace, now);
        Ok(())
    }

    fn tick(&mut self, now: f64, on_frame: &Function, on_event: &Function) -> String {
        let mut sink = JsSink { on_frame, on_event };
        state_name(self.driver.tick(now, &mut sink))
    }

    fn stop(&mut self) {
        self.driver.stop();
    }
}

/// Single-drop game
#[wasm_bindgen]
pub struct PlinkoSession {
    sim: DropSimulator,
    player: Player,
}

#[wasm_bindgen]
impl PlinkoSession {
    /// `config_json` may be empty for the default board
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<PlinkoSession, JsError> {
        let config = if config_json.trim().is_empty() {
            PlinkoConfig::default()
        } else {
            serde_json::from_str(config_json)?
        };
        Ok(Self {
            sim: DropSimulator::new(config)?,
            player: Player::default(),
        })
    }

    /// Static bodies as JSON
    #[wasm_bindgen(js_name = boardBodies)]
    pub fn board_bodies(&self) -> Result<String, JsError> {
        let bodies = self.sim.board().bodies(&self.sim.config().physics);
        Ok(serde_json::to_string(&bodies)?)
    }

    /// Trace JSON of a drop landing in `bucket`
    pub fn simulate(&mut self, bucket: usize) -> Result<String, JsError> {
        let attempts = self.sim.config().max_attempts;
        Ok(self.sim.simulate_for_outcome(bucket, attempts)?.to_json()?)
    }

    #[wasm_bindgen(js_name = dropForMultiplier)]
    pub fn drop_for_multiplier(&mut self, multiplier: f64) -> Result<String, JsError> {
        Ok(self.sim.drop_for_multiplier(multiplier)?.to_json()?)
    }

    pub fn payout(&self, wager: f64, bucket: usize) -> Option<f64> {
        self.sim.payout(wager, bucket)
    }

    pub fn play(&mut self, trace_json: &str, now: f64) -> Result<(), JsError> {
        self.player.play(trace_json, now)
    }

    pub fn tick(&mut self, now: f64, on_frame: &Function, on_event: &Function) -> String {
        self.player.tick(now, on_frame, on_event)
    }

    pub fn cancel(&mut self) {
        self.player.stop();
    }
}

/// Plinko Race
#[wasm_bindgen]
pub struct RaceSession {
    engine: RaceEngine,
    player: Player,
}

#[wasm_bindgen]
impl RaceSession {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, players: usize) -> Result<RaceSession, JsError> {
        let config = if config_json.trim().is_empty() {
            RaceConfig::default()
        } else {
            serde_json::from_str(config_json)?
        };
        Ok(Self {
            engine: RaceEngine::new(config, players)?,
            player: Player::default(),
        })
    }

    #[wasm_bindgen(js_name = boardBodies)]
    pub fn board_bodies(&self) -> Result<String, JsError> {
        let bodies = self.engine.board().bodies(&self.engine.config().physics);
        Ok(serde_json::to_string(&bodies)?)
    }

    /// Trace JSON of a race won by `winner`
    pub fn record(&mut self, winner: usize, target: f64) -> Result<String, JsError> {
        Ok(self.engine.run_race(winner, target)?.to_json()?)
    }

    pub fn play(&mut self, trace_json: &str, now: f64) -> Result<(), JsError> {
        self.player.play(trace_json, now)
    }

    pub fn tick(&mut self, now: f64, on_frame: &Function, on_event: &Function) -> String {
        self.player.tick(now, on_frame, on_event)
    }

    pub fn cancel(&mut self) {
        self.player.stop();
    }
}

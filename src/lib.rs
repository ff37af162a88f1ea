//! Plinko Sim - physics-driven outcome search and replay for Plinko games
//!
//! Core modules:
//! - `sim`: Deterministic simulation (world, board layout, outcome search, race, replay)
//! - `config`: Data-driven game configuration
//! - `payout`: Multiplier tables and bucket selection
//! - `error`: Error taxonomy shared by every fallible operation

pub mod config;
pub mod error;
pub mod payout;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::{BoardSettings, GameConfig, PhysicsSettings, PlinkoConfig, RaceConfig};
pub use error::{Result, SimError};

/// Game configuration constants
pub mod consts {
    /// Playfield dimensions (fixed units, shared by every variant)
    pub const BOARD_WIDTH: f32 = 700.0;
    pub const BOARD_HEIGHT: f32 = 700.0;

    /// Base physics step (ms) before time scaling
    pub const BASE_STEP_MS: f32 = 1000.0 / 60.0;
    /// Gravity acceleration per unit of `gravity_y` (px/ms²)
    pub const GRAVITY_SCALE: f32 = 0.001;
    /// Velocity loss per base step
    pub const AIR_FRICTION: f32 = 0.01;
    /// Maximum substeps per step to prevent tunnelling without stalling
    pub const MAX_SUBSTEPS: u32 = 32;
    /// Balls share this group so they never collide with each other
    pub const BALL_COLLISION_GROUP: i32 = -6969;

    /// Spawn height just above the board
    pub const SPAWN_Y: f32 = -10.0;

    /// Bucket sensors and the barriers between them
    pub const BUCKET_HEIGHT: f32 = 60.0;
    pub const BARRIER_WIDTH: f32 = 4.0;
    pub const BARRIER_HEIGHT: f32 = BUCKET_HEIGHT * 1.2;

    /// Single-drop Plinko defaults
    pub const DROP_ROWS: u32 = 14;
    pub const DROP_BALL_RADIUS: f32 = 9.0;
    pub const DROP_PEG_RADIUS: f32 = 11.0;
    pub const DROP_RESTITUTION: f32 = 0.4;
    pub const DROP_GRAVITY: f32 = 1.0;
    pub const DROP_START_POSITIONS: usize = 50;
    /// Spawn jitter spans ±range/2
    pub const DROP_SPAWN_OFFSET_RANGE: f32 = 10.0;
    pub const DROP_MAX_ATTEMPTS: u32 = 150;
    pub const DROP_MAX_STEPS: u32 = 1000;

    /// Plinko Race defaults
    pub const RACE_ROWS: u32 = 12;
    pub const RACE_ENTRY_ROWS: u32 = 2;
    pub const RACE_BALL_RADIUS: f32 = 13.0;
    pub const RACE_PEG_RADIUS: f32 = 5.0;
    pub const RACE_BALL_RESTITUTION: f32 = 0.4;
    pub const RACE_PEG_RESTITUTION: f32 = 0.6;
    pub const RACE_GRAVITY: f32 = 0.9;
    pub const RACE_TIME_SCALE: f32 = 4.0;
    pub const RACE_CYCLE_STEPS: u32 = 180;
    pub const RACE_MAX_ATTEMPTS: u32 = 150;
    pub const RACE_MAX_STEPS: u32 = 200_000;
    pub const RACE_FRAME_MULTIPLIER: u32 = 4;
    pub const RACE_TARGET_SCORE: f64 = 100.0;
    pub const RACE_SPAWN_JITTER: f32 = 8.0;
    pub const EXTRA_BALL_JITTER: f32 = 15.0;
    /// Values carried by dynamic buckets in multiplier / deduct mode
    pub const DYNAMIC_MULTIPLIER: f64 = 5.0;
    pub const DYNAMIC_DEDUCT: f64 = 5.0;
    /// Hard clamp on a player's multiplier
    pub const MULTIPLIER_CAP: f64 = 64.0;
    /// Position recorded for a ball removed by a kill bucket
    pub const KILLED_BALL_POS: f32 = -999.0;

    /// Playback clock
    pub const REPLAY_FPS: f64 = 60.0;
    pub const REPLAY_FRAME_MS: f64 = 1000.0 / REPLAY_FPS;
    /// Elapsed time per tick is clamped so a stalled tab catches up gradually
    pub const REPLAY_MAX_ELAPSED_MS: f64 = 100.0;
    /// Vertical jump (fraction of board height) treated as a respawn
    pub const TELEPORT_FACTOR: f32 = 0.5;

    /// Default return-to-player for generated multiplier tables
    pub const DEFAULT_RTP: f64 = 0.95;
}

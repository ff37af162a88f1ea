//! Game configuration
//!
//! Every tunable of both game variants lives here as plain serde data, so a
//! whole game can be described by one JSON document.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, SimError};
use crate::payout::fair_multipliers;
use crate::sim::board::{BucketEffect, BucketLayout};

/// Board geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardSettings {
    pub width: f32,
    pub height: f32,
    /// Peg rows kept on the board
    pub rows: u32,
    /// Leading rows generated and then dropped
    pub entry_rows: u32,
    pub bucket_height: f32,
    pub barrier_width: f32,
    pub barrier_height: f32,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            width: BOARD_WIDTH,
            height: BOARD_HEIGHT,
            rows: DROP_ROWS,
            entry_rows: 1,
            bucket_height: BUCKET_HEIGHT,
            barrier_width: BARRIER_WIDTH,
            barrier_height: BARRIER_HEIGHT,
        }
    }
}

/// Physics constants of one variant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsSettings {
    pub gravity_y: f32,
    pub time_scale: f32,
    /// Fixed step in ms before time scaling
    pub step_ms: f32,
    pub ball_radius: f32,
    pub peg_radius: f32,
    pub ball_restitution: f32,
    /// Used for pegs and barriers
    pub peg_restitution: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity_y: DROP_GRAVITY,
            time_scale: 1.0,
            step_ms: BASE_STEP_MS,
            ball_radius: DROP_BALL_RADIUS,
            peg_radius: DROP_PEG_RADIUS,
            ball_restitution: DROP_RESTITUTION,
            peg_restitution: DROP_RESTITUTION,
        }
    }
}

impl PhysicsSettings {
    pub fn race() -> Self {
        Self {
            gravity_y: RACE_GRAVITY,
            time_scale: RACE_TIME_SCALE,
            step_ms: BASE_STEP_MS,
            ball_radius: RACE_BALL_RADIUS,
            peg_radius: RACE_PEG_RADIUS,
            ball_restitution: RACE_BALL_RESTITUTION,
            peg_restitution: RACE_PEG_RESTITUTION,
        }
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("timeScale", self.time_scale),
            ("stepMs", self.step_ms),
            ("ballRadius", self.ball_radius),
            ("pegRadius", self.peg_radius),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !self.gravity_y.is_finite() {
            return Err(SimError::invalid("gravityY must be finite"));
        }
        Ok(())
    }
}

/// Single-drop board presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    #[default]
    Normal,
    Degen,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Normal => "normal",
            Preset::Degen => "degen",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Preset::Normal),
            "degen" => Some(Preset::Degen),
            _ => None,
        }
    }

    /// Peg rows of this preset
    pub fn rows(&self) -> u32 {
        match self {
            Preset::Normal => 14,
            Preset::Degen => 16,
        }
    }
}

/// Single-drop Plinko configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlinkoConfig {
    pub board: BoardSettings,
    pub physics: PhysicsSettings,
    pub buckets: BucketLayout,
    /// Balls dropped per attempt
    pub start_positions: usize,
    /// Spawn offsets are drawn from ±range/2 around the centre
    pub spawn_offset_range: f32,
    pub max_attempts: u32,
    pub max_steps: u32,
    pub seed: Option<String>,
}

impl Default for PlinkoConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Normal, DEFAULT_RTP)
    }
}

impl PlinkoConfig {
    /// Preset board with a fair multiplier table for `rtp`
    pub fn from_preset(preset: Preset, rtp: f64) -> Self {
        let rows = preset.rows();
        let table = fair_multipliers(rows, rtp);
        let buckets = match preset {
            Preset::Normal => BucketLayout::Direct(table),
            Preset::Degen => BucketLayout::Mirrored(table),
        };
        Self {
            board: BoardSettings {
                rows,
                ..Default::default()
            },
            physics: PhysicsSettings::default(),
            buckets,
            start_positions: DROP_START_POSITIONS,
            spawn_offset_range: DROP_SPAWN_OFFSET_RANGE,
            max_attempts: DROP_MAX_ATTEMPTS,
            max_steps: DROP_MAX_STEPS,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.physics.validate()?;
        if self.start_positions == 0 {
            return Err(SimError::invalid("startPositions must be at least 1"));
        }
        if !(self.spawn_offset_range.is_finite() && self.spawn_offset_range >= 0.0) {
            return Err(SimError::invalid("spawnOffsetRange must be non-negative"));
        }
        if self.max_steps == 0 {
            return Err(SimError::invalid("maxSteps must be at least 1"));
        }
        if matches!(self.buckets, BucketLayout::Effects(_)) {
            return Err(SimError::invalid("single-drop buckets need multipliers"));
        }
        Ok(())
    }
}

/// The race palette left to right: dynamic buckets at both edges and centre
pub fn default_race_buckets() -> Vec<BucketEffect> {
    use BucketEffect::*;
    vec![
        Dynamic,
        Score { value: 10.0 },
        Multiplier { value: 2.5 },
        Score { value: 6.0 },
        Multiplier { value: 1.5 },
        Score { value: 3.0 },
        Dynamic,
        Score { value: 3.0 },
        Multiplier { value: 1.5 },
        Score { value: 6.0 },
        Multiplier { value: 2.5 },
        Score { value: 10.0 },
        Dynamic,
    ]
}

/// Plinko Race configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RaceConfig {
    pub board: BoardSettings,
    pub physics: PhysicsSettings,
    pub buckets: Vec<BucketEffect>,
    /// Physics steps between dynamic bucket rotations
    pub cycle_steps: u32,
    pub dynamic_multiplier: f64,
    pub dynamic_deduct: f64,
    pub max_attempts: u32,
    pub max_steps: u32,
    pub frame_multiplier: u32,
    pub target_score: f64,
    pub spawn_jitter: f32,
    pub extra_ball_jitter: f32,
    pub seed: Option<String>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            board: BoardSettings {
                rows: RACE_ROWS,
                entry_rows: RACE_ENTRY_ROWS,
                ..Default::default()
            },
            physics: PhysicsSettings::race(),
            buckets: default_race_buckets(),
            cycle_steps: RACE_CYCLE_STEPS,
            dynamic_multiplier: DYNAMIC_MULTIPLIER,
            dynamic_deduct: DYNAMIC_DEDUCT,
            max_attempts: RACE_MAX_ATTEMPTS,
            max_steps: RACE_MAX_STEPS,
            frame_multiplier: RACE_FRAME_MULTIPLIER,
            target_score: RACE_TARGET_SCORE,
            spawn_jitter: RACE_SPAWN_JITTER,
            extra_ball_jitter: EXTRA_BALL_JITTER,
            seed: None,
        }
    }
}

impl RaceConfig {
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn bucket_layout(&self) -> BucketLayout {
        BucketLayout::Effects(self.buckets.clone())
    }

    pub fn validate(&self) -> Result<()> {
        self.physics.validate()?;
        if self.max_attempts == 0 {
            return Err(SimError::invalid("maxAttempts must be at least 1"));
        }
        if self.cycle_steps == 0 {
            return Err(SimError::invalid("cycleSteps must be at least 1"));
        }
        if self.frame_multiplier == 0 {
            return Err(SimError::invalid("frameMultiplier must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(SimError::invalid("maxSteps must be at least 1"));
        }
        // Extra balls are clamped to [radius, width - radius]
        let diameter = 2.0 * self.physics.ball_radius;
        if !(self.board.width.is_finite() && self.board.width >= diameter) {
            return Err(SimError::invalid(format!(
                "board width {} is narrower than a ball ({diameter})",
                self.board.width
            )));
        }
        Ok(())
    }
}

/// What a single drop should land in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropTarget {
    Bucket(usize),
    /// Any bucket paying this multiplier
    Multiplier(f64),
}

/// A complete game request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum GameConfig {
    Drop {
        #[serde(default)]
        config: PlinkoConfig,
        target: DropTarget,
    },
    Race {
        #[serde(default)]
        config: RaceConfig,
        players: usize,
        winner: usize,
        /// Falls back to `config.target_score`
        #[serde(default)]
        target: Option<f64>,
    },
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a game request from a JSON file
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded game config from {}", path.display());
        Ok(config)
    }
}

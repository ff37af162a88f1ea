//! Recorded runs
//!
//! A [`Trace`] is everything a host needs to replay a run without physics:
//! flat per-ball position paths, the events that happened along the way and
//! the outcome the run was searched for. Traces are plain serde data.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::world::{BodyLabel, CollisionPair};
use crate::error::Result;

/// Current behaviour of a dynamic race bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DynamicMode {
    Blank,
    ExtraBall,
    Multiplier,
    Deduct,
}

impl DynamicMode {
    /// Modes a dynamic bucket cycles through once the race is running
    pub const CYCLE: [DynamicMode; 3] = [
        DynamicMode::ExtraBall,
        DynamicMode::Multiplier,
        DynamicMode::Deduct,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventKind {
    /// Ball touched a peg, a barrier or a bucket
    Contact { peg: Option<usize>, barrier: bool },
    /// Points added, multiplier included
    Score { value: f64 },
    Multiplier { value: f64 },
    /// Points taken, multiplier included, before the floor at zero
    Deduct { value: f64 },
    ExtraBall,
    Kill,
    Blank,
    BucketModeChange { mode: DynamicMode },
    BucketPatternInit { offset: usize },
}

/// Something that happened at a replay frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub frame: u32,
    /// Ball slot (single drop) or player index (race)
    pub actor: Option<usize>,
    pub bucket: Option<usize>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// A ball touching static geometry, as seen live during a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub ball: usize,
    pub peg: Option<usize>,
    pub barrier: bool,
    pub bucket: Option<usize>,
}

impl Contact {
    /// `None` unless the pair is a ball against a peg, barrier or bucket
    pub fn from_pair(pair: &CollisionPair) -> Option<Self> {
        let (_, ball) = pair.ball()?;
        let BodyLabel::Ball { slot, .. } = *ball else {
            return None;
        };
        let peg = pair.find(|l| match l {
            BodyLabel::Peg { peg_index } => Some(*peg_index),
            _ => None,
        });
        let bucket = pair.find(|l| match l {
            BodyLabel::Bucket { bucket_index } => Some(*bucket_index),
            _ => None,
        });
        let barrier = pair.find(|l| matches!(l, BodyLabel::Barrier).then_some(())).is_some();

        if peg.is_none() && bucket.is_none() && !barrier {
            return None;
        }
        Some(Self {
            ball: slot,
            peg,
            barrier,
            bucket,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outcome {
    #[serde(rename_all = "camelCase")]
    Bucket {
        bucket_index: usize,
        /// Start position the matching ball was dropped from
        start_position: usize,
    },
    #[serde(rename_all = "camelCase")]
    Race {
        winner_index: usize,
        scores: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    /// Per-ball flat `[x0, y0, x1, y1, ...]`, one sample per physics step
    pub paths: Vec<Vec<f32>>,
    /// Player owning each path
    pub path_owner: Vec<usize>,
    /// Spawn x of each path (respawns return here)
    pub spawn_x: Vec<f32>,
    /// Paths visible from frame 0; the rest appear on extra-ball events
    pub initial_balls: usize,
    /// Sorted by frame (replay frames)
    pub events: Vec<TraceEvent>,
    pub total_frames: u32,
    /// Replay frames per recorded sample
    pub frame_multiplier: u32,
    pub board_height: f32,
    pub outcome: Outcome,
}

impl Trace {
    pub fn sample_count(&self, slot: usize) -> usize {
        self.paths.get(slot).map_or(0, |p| p.len() / 2)
    }

    pub fn sample(&self, slot: usize, index: usize) -> Option<Vec2> {
        let path = self.paths.get(slot)?;
        let x = *path.get(index * 2)?;
        let y = *path.get(index * 2 + 1)?;
        Some(Vec2::new(x, y))
    }

    /// Last sample of a path still inside the board vertically
    pub fn last_in_bounds(&self, slot: usize) -> Option<Vec2> {
        (0..self.sample_count(slot))
            .rev()
            .filter_map(|i| self.sample(slot, i))
            .find(|p| p.y >= 0.0 && p.y <= self.board_height)
    }

    pub fn is_ordered(&self) -> bool {
        self.events.windows(2).all(|w| w[0].frame <= w[1].frame)
    }

    pub fn bucket_index(&self) -> Option<usize> {
        match self.outcome {
            Outcome::Bucket { bucket_index, .. } => Some(bucket_index),
            Outcome::Race { .. } => None,
        }
    }

    pub fn winner_index(&self) -> Option<usize> {
        match self.outcome {
            Outcome::Race { winner_index, .. } => Some(winner_index),
            Outcome::Bucket { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

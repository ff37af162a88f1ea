//! Board layout generation
//!
//! A board is the immutable static geometry of one game configuration:
//! a staggered triangle of pegs, a row of bucket sensors along the bottom
//! and thin barriers between the buckets. It is built once per configuration
//! and stamped into every world that needs it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::world::{BodyLabel, BodyOptions, BodySnapshot, PhysicsWorld, World};
use crate::config::{BoardSettings, PhysicsSettings};
use crate::error::{Result, SimError};

/// Scoring effect of a race bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BucketEffect {
    Blank,
    Score { value: f64 },
    Multiplier { value: f64 },
    Deduct { value: f64 },
    ExtraBall,
    Kill,
    /// Effect rotates on a timer (see the race engine)
    Dynamic,
}

/// What landing in a bucket means
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketSlot {
    /// Payout multiplier of a single-drop board
    Payout(f64),
    Effect(BucketEffect),
}

/// How bucket values are arranged left to right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", content = "values", rename_all = "camelCase")]
pub enum BucketLayout {
    /// One bucket per value, in order
    Direct(Vec<f64>),
    /// Degen arrangement: unique values (first occurrence order) become
    /// `rev(u[1..]) ++ [u[0]; 3] ++ u[1..]`
    Mirrored(Vec<f64>),
    Effects(Vec<BucketEffect>),
}

impl BucketLayout {
    /// Resolve the layout into per-bucket slots, left to right
    pub fn slots(&self) -> Vec<BucketSlot> {
        match self {
            BucketLayout::Direct(values) => values.iter().map(|&m| BucketSlot::Payout(m)).collect(),
            BucketLayout::Mirrored(values) => mirrored(values)
                .into_iter()
                .map(BucketSlot::Payout)
                .collect(),
            BucketLayout::Effects(effects) => {
                effects.iter().map(|&e| BucketSlot::Effect(e)).collect()
            }
        }
    }
}

fn mirrored(values: &[f64]) -> Vec<f64> {
    let mut unique: Vec<f64> = Vec::with_capacity(values.len());
    for &v in values {
        if !unique.contains(&v) {
            unique.push(v);
        }
    }
    let Some((&center, rest)) = unique.split_first() else {
        return Vec::new();
    };

    let mut layout: Vec<f64> = rest.iter().rev().copied().collect();
    layout.extend([center; 3]);
    layout.extend_from_slice(rest);
    layout
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peg {
    pub index: usize,
    pub pos: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub index: usize,
    /// Sensor centre
    pub pos: Vec2,
    /// Sensor width/height
    pub size: Vec2,
    pub slot: BucketSlot,
}

/// Static geometry of one game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub width: f32,
    pub height: f32,
    pub rows: u32,
    pub pegs: Vec<Peg>,
    pub buckets: Vec<Bucket>,
    /// Barrier centres, one per bucket boundary including both outer edges
    pub barriers: Vec<Vec2>,
    pub barrier_size: Vec2,
}

/// Lay out pegs, buckets and barriers for a board
///
/// `settings.entry_rows` leading rows of the triangle are generated and then
/// discarded so the ball enters between pegs instead of landing on the apex.
pub fn layout_board(settings: &BoardSettings, buckets: &BucketLayout) -> Result<Board> {
    let BoardSettings {
        width,
        height,
        rows,
        entry_rows,
        bucket_height,
        barrier_width,
        barrier_height,
    } = *settings;

    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(SimError::invalid(format!(
            "board size must be positive, got {width}x{height}"
        )));
    }
    if rows < 1 {
        return Err(SimError::invalid("board needs at least one peg row"));
    }
    let slots = buckets.slots();
    if slots.is_empty() {
        return Err(SimError::invalid("board needs at least one bucket"));
    }

    let generated = rows + entry_rows;
    let row_spacing = height / (generated + 2) as f32;
    let col_spacing = if generated > 1 {
        width / (generated - 1) as f32
    } else {
        0.0
    };

    let mut pegs = Vec::new();
    for row in entry_rows..generated {
        let row_width = col_spacing * row as f32;
        let y = row_spacing * row as f32 + row_spacing / 2.0;
        for col in 0..=row {
            let x = width / 2.0 - row_width / 2.0 + col_spacing * col as f32;
            pegs.push(Peg {
                index: pegs.len(),
                pos: Vec2::new(x, y),
            });
        }
    }

    let bucket_width = width / slots.len() as f32;
    let buckets = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| Bucket {
            index,
            pos: Vec2::new(
                index as f32 * bucket_width + bucket_width / 2.0,
                height - bucket_height / 2.0,
            ),
            size: Vec2::new(bucket_width - barrier_width, bucket_height),
            slot,
        })
        .collect::<Vec<_>>();

    let barriers = (0..=buckets.len())
        .map(|i| Vec2::new(i as f32 * bucket_width, height - barrier_height / 2.0))
        .collect();

    Ok(Board {
        width,
        height,
        rows,
        pegs,
        buckets,
        barriers,
        barrier_size: Vec2::new(barrier_width, barrier_height),
    })
}

impl Board {
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_width(&self) -> f32 {
        self.width / self.buckets.len() as f32
    }

    /// Horizontal span `[left, right)` of a bucket column
    pub fn bucket_span(&self, index: usize) -> (f32, f32) {
        let w = self.bucket_width();
        (index as f32 * w, (index + 1) as f32 * w)
    }

    /// Bucket column containing `x`, if on the board
    pub fn bucket_at(&self, x: f32) -> Option<usize> {
        if !(0.0..self.width).contains(&x) {
            return None;
        }
        Some(((x / self.bucket_width()) as usize).min(self.buckets.len() - 1))
    }

    pub fn multiplier(&self, index: usize) -> Option<f64> {
        match self.buckets.get(index)?.slot {
            BucketSlot::Payout(m) => Some(m),
            BucketSlot::Effect(_) => None,
        }
    }

    pub fn effect(&self, index: usize) -> Option<BucketEffect> {
        match self.buckets.get(index)?.slot {
            BucketSlot::Effect(e) => Some(e),
            BucketSlot::Payout(_) => None,
        }
    }

    /// Add the static geometry to a world
    pub fn populate<W: PhysicsWorld>(&self, world: &mut W, physics: &PhysicsSettings) {
        let solid = BodyOptions::with_restitution(physics.peg_restitution);

        for peg in &self.pegs {
            world.add_static_circle(
                peg.pos,
                physics.peg_radius,
                BodyLabel::Peg {
                    peg_index: peg.index,
                },
                solid,
            );
        }
        for bucket in &self.buckets {
            world.add_static_rect(
                bucket.pos,
                bucket.size,
                BodyLabel::Bucket {
                    bucket_index: bucket.index,
                },
                BodyOptions::sensor(),
            );
        }
        for &pos in &self.barriers {
            world.add_static_rect(pos, self.barrier_size, BodyLabel::Barrier, solid);
        }
    }

    /// Fresh world holding only this board's geometry
    pub fn build_world<W: PhysicsWorld>(&self, physics: &PhysicsSettings) -> W {
        let mut world = W::create(physics.gravity_y, physics.time_scale);
        self.populate(&mut world, physics);
        world
    }

    /// Static bodies as a host would draw them
    pub fn bodies(&self, physics: &PhysicsSettings) -> Vec<BodySnapshot> {
        self.build_world::<World>(physics).list_bodies()
    }
}

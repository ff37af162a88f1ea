//! Deterministic simulation module
//!
//! Everything that decides where a ball goes lives here. Given the same seed
//! and configuration the simulators produce the same trace:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body handle)
//! - No rendering or platform dependencies

pub mod board;
pub mod collision;
pub mod drop;
pub mod race;
pub mod replay;
pub mod rng;
pub mod trace;
pub mod world;

pub use board::{Board, Bucket, BucketEffect, BucketLayout, BucketSlot, Peg, layout_board};
pub use collision::{
    CollisionResult, bounce_velocity, circle_circle_collision, circle_rect_collision,
};
pub use drop::{BALL_COLORS, DropSimulator};
pub use race::{RaceEngine, RaceLedger, RaceRecorder, Standing, run_race};
pub use replay::{
    FrameCallback, Playback, PlaybackState, ReplayDriver, ReplaySink, ReplayToken, VisualBall,
    interpolate,
};
pub use rng::{RngState, SimRng, hash_seed};
pub use trace::{Contact, DynamicMode, EventKind, Outcome, Trace, TraceEvent};
pub use world::{
    BodyHandle, BodyLabel, BodyOptions, BodySnapshot, CollisionHandler, CollisionPair, HandlerId,
    PhysicsWorld, Shape, World,
};

//! Plinko Race
//!
//! Several players each drop a ball that respawns at the top after every
//! bucket hit. Buckets score points, raise a player's multiplier, deduct
//! points, grant an extra ball or remove the ball. The engine searches seeds
//! until the requested winner is the only player to reach the target score,
//! and records the whole race for replay.

use std::marker::PhantomData;

use glam::Vec2;

use super::board::{Board, BucketEffect, layout_board};
use super::drop::BALL_COLORS;
use super::rng::SimRng;
use super::trace::{DynamicMode, EventKind, Outcome, Trace, TraceEvent};
use super::world::{BodyHandle, BodyLabel, BodyOptions, CollisionPair, PhysicsWorld, World};
use crate::config::RaceConfig;
use crate::consts::{BALL_COLLISION_GROUP, KILLED_BALL_POS, MULTIPLIER_CAP, SPAWN_Y};
use crate::error::{Result, SimError};

/// Where the race stands after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Racing,
    Won,
    /// Another player reached the target first
    Lost { player: usize },
}

/// Scores and multipliers of every player
#[derive(Debug, Clone, PartialEq)]
pub struct RaceLedger {
    scores: Vec<f64>,
    multipliers: Vec<f64>,
}

impl RaceLedger {
    pub fn new(players: usize) -> Self {
        Self {
            scores: vec![0.0; players],
            multipliers: vec![1.0; players],
        }
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn score(&self, player: usize) -> f64 {
        self.scores.get(player).copied().unwrap_or(0.0)
    }

    pub fn multiplier(&self, player: usize) -> f64 {
        self.multipliers.get(player).copied().unwrap_or(1.0)
    }

    /// Apply a resolved effect and return the event to record
    ///
    /// Scoring and deducting consume the multiplier, and their events carry
    /// the points actually moved. Raising a multiplier of exactly 1 replaces
    /// it instead of adding, so the first 2.5x bucket gives 2.5x rather than
    /// 3.5x.
    pub fn apply(&mut self, player: usize, effect: BucketEffect) -> EventKind {
        let (Some(score), Some(mult)) =
            (self.scores.get_mut(player), self.multipliers.get_mut(player))
        else {
            return EventKind::Blank;
        };

        match effect {
            BucketEffect::Score { value } => {
                let points = value * *mult;
                *score += points;
                *mult = 1.0;
                EventKind::Score { value: points }
            }
            BucketEffect::Multiplier { value } => {
                let base = if *mult == 1.0 { 0.0 } else { *mult };
                *mult = (base + value).min(MULTIPLIER_CAP);
                EventKind::Multiplier { value }
            }
            BucketEffect::Deduct { value } => {
                let points = value * *mult;
                *score = (*score - points).max(0.0);
                *mult = 1.0;
                EventKind::Deduct { value: points }
            }
            BucketEffect::ExtraBall => EventKind::ExtraBall,
            BucketEffect::Kill => EventKind::Kill,
            BucketEffect::Blank | BucketEffect::Dynamic => EventKind::Blank,
        }
    }

    /// Others are checked first so a tie is never a win
    pub fn standing(&self, winner: usize, target: f64) -> Standing {
        if let Some(player) = self
            .scores
            .iter()
            .enumerate()
            .position(|(p, &s)| p != winner && s >= target)
        {
            return Standing::Lost { player };
        }
        if self.score(winner) >= target {
            Standing::Won
        } else {
            Standing::Racing
        }
    }
}

/// Paths and events of one attempt
#[derive(Debug, Clone, Default)]
pub struct RaceRecorder {
    pub paths: Vec<Vec<f32>>,
    pub path_owner: Vec<usize>,
    pub spawn_x: Vec<f32>,
    pub events: Vec<TraceEvent>,
}

impl RaceRecorder {
    /// Register a ball appearing at physics step `frame`
    ///
    /// The path is padded with `frame` copies of the spawn point so every
    /// path shares the same sample index for the same step.
    pub fn add_ball(&mut self, owner: usize, spawn_x: f32, frame: u32) -> usize {
        let mut path = Vec::with_capacity(frame as usize * 2 + 2);
        for _ in 0..frame {
            path.extend([spawn_x, SPAWN_Y]);
        }
        self.paths.push(path);
        self.path_owner.push(owner);
        self.spawn_x.push(spawn_x);
        self.paths.len() - 1
    }

    pub fn record(&mut self, slot: usize, pos: Vec2) {
        if let Some(path) = self.paths.get_mut(slot) {
            path.extend([pos.x, pos.y]);
        }
    }

    pub fn push_event(
        &mut self,
        frame: u32,
        actor: Option<usize>,
        bucket: Option<usize>,
        kind: EventKind,
    ) {
        self.events.push(TraceEvent {
            frame,
            actor,
            bucket,
            kind,
        });
    }

    /// Finish a race of `steps` physics steps
    pub fn into_trace(
        mut self,
        steps: u32,
        frame_multiplier: u32,
        initial_balls: usize,
        board_height: f32,
        outcome: Outcome,
    ) -> Trace {
        for path in &mut self.paths {
            path.truncate(steps as usize * 2);
        }
        for event in &mut self.events {
            event.frame *= frame_multiplier;
        }
        Trace {
            paths: self.paths,
            path_owner: self.path_owner,
            spawn_x: self.spawn_x,
            initial_balls,
            events: self.events,
            total_frames: steps * frame_multiplier,
            frame_multiplier,
            board_height,
            outcome,
        }
    }
}

/// Rotation state of the dynamic buckets
#[derive(Debug, Clone)]
struct DynamicBuckets {
    /// (bucket index, pattern offset)
    buckets: Vec<(usize, usize)>,
    modes: Vec<DynamicMode>,
    rotations: usize,
}

impl DynamicBuckets {
    fn init(board: &Board, rng: &mut SimRng, recorder: &mut RaceRecorder) -> Self {
        let cycle = DynamicMode::CYCLE.len();
        let buckets: Vec<(usize, usize)> = (0..board.bucket_count())
            .filter(|&i| board.effect(i) == Some(BucketEffect::Dynamic))
            .map(|i| (i, rng.index(cycle)))
            .collect();
        for &(bucket, offset) in &buckets {
            recorder.push_event(0, None, Some(bucket), EventKind::BucketPatternInit { offset });
        }
        Self {
            buckets,
            modes: vec![DynamicMode::Blank; board.bucket_count()],
            rotations: 0,
        }
    }

    fn advance(&mut self, step: u32, cycle_steps: u32, recorder: &mut RaceRecorder) {
        if step == 0 || step % cycle_steps != 0 {
            return;
        }
        self.rotations += 1;
        let cycle = DynamicMode::CYCLE.len();
        for &(bucket, offset) in &self.buckets {
            let mode = DynamicMode::CYCLE[(self.rotations - 1 + offset) % cycle];
            self.modes[bucket] = mode;
            recorder.push_event(step, None, Some(bucket), EventKind::BucketModeChange { mode });
        }
    }

    fn resolve(&self, bucket: usize, effect: BucketEffect, config: &RaceConfig) -> BucketEffect {
        if effect != BucketEffect::Dynamic {
            return effect;
        }
        match self.modes.get(bucket).copied().unwrap_or(DynamicMode::Blank) {
            DynamicMode::Blank => BucketEffect::Blank,
            DynamicMode::ExtraBall => BucketEffect::ExtraBall,
            DynamicMode::Multiplier => BucketEffect::Multiplier {
                value: config.dynamic_multiplier,
            },
            DynamicMode::Deduct => BucketEffect::Deduct {
                value: config.dynamic_deduct,
            },
        }
    }
}

/// Ball slot and bucket of a started ball/bucket pair
fn bucket_hit(pair: &CollisionPair) -> Option<(usize, usize)> {
    let (_, ball) = pair.ball()?;
    let BodyLabel::Ball { slot, .. } = *ball else {
        return None;
    };
    let bucket = pair.find(|l| match l {
        BodyLabel::Bucket { bucket_index } => Some(*bucket_index),
        _ => None,
    })?;
    Some((slot, bucket))
}

/// Race recorder searching for a given winner
pub struct RaceEngine<W: PhysicsWorld = World> {
    config: RaceConfig,
    board: Board,
    players: usize,
    rng: SimRng,
    _world: PhantomData<fn() -> W>,
}

impl RaceEngine {
    pub fn new(config: RaceConfig, players: usize) -> Result<Self> {
        Self::with_backend(config, players)
    }

    /// Record on a background thread
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn_record(
        mut self,
        winner: usize,
        target: f64,
    ) -> std::thread::JoinHandle<Result<Trace>> {
        std::thread::spawn(move || self.run_race(winner, target))
    }
}

impl<W: PhysicsWorld> RaceEngine<W> {
    pub fn with_backend(config: RaceConfig, players: usize) -> Result<Self> {
        config.validate()?;
        if players == 0 {
            return Err(SimError::invalid("a race needs at least one player"));
        }
        let board = layout_board(&config.board, &config.bucket_layout())?;
        let rng = SimRng::from_seed(config.seed.as_deref());
        Ok(Self {
            config,
            board,
            players,
            rng,
            _world: PhantomData,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn players(&self) -> usize {
        self.players
    }

    /// Search for a race `winner` wins by reaching `target` first
    ///
    /// The random stream carries over between attempts, so a failed attempt
    /// is never replayed identically.
    pub fn run_race(&mut self, winner: usize, target: f64) -> Result<Trace> {
        if winner >= self.players {
            return Err(SimError::invalid(format!(
                "winner {winner} out of range ({} players)",
                self.players
            )));
        }
        if !(target.is_finite() && target > 0.0) {
            return Err(SimError::invalid(format!("target score must be positive, got {target}")));
        }

        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            if let Some(trace) = self.run_attempt(winner, target) {
                log::info!(
                    "Player {winner} wins race on attempt {attempt} ({} frames, {} balls)",
                    trace.total_frames,
                    trace.paths.len()
                );
                return Ok(trace);
            }
            log::debug!("Race attempt {attempt} did not produce winner {winner}");
        }

        log::warn!("No race won by player {winner} after {max_attempts} attempts");
        Err(SimError::SearchExhausted {
            attempts: max_attempts,
        })
    }

    fn run_attempt(&mut self, winner: usize, target: f64) -> Option<Trace> {
        let Self {
            config,
            board,
            players,
            rng,
            ..
        } = self;
        let physics = &config.physics;
        let (width, height) = (board.width, board.height);
        let radius = physics.ball_radius;
        let ball_options = BodyOptions {
            collision_group: BALL_COLLISION_GROUP,
            ..BodyOptions::with_restitution(physics.ball_restitution)
        };
        let spawn = |world: &mut W, slot: usize, player: usize, x: f32| {
            world.add_dynamic_circle(
                Vec2::new(x, SPAWN_Y),
                radius,
                BodyLabel::Ball {
                    slot,
                    player: Some(player),
                    color: Some(BALL_COLORS[player % BALL_COLORS.len()]),
                },
                ball_options,
            )
        };

        let mut world: W = board.build_world(physics);
        let mut recorder = RaceRecorder::default();
        let mut ledger = RaceLedger::new(*players);
        let mut balls: Vec<Option<BodyHandle>> = Vec::with_capacity(*players);

        for player in 0..*players {
            let x = width / 2.0 + rng.range(-config.spawn_jitter, config.spawn_jitter);
            let slot = recorder.add_ball(player, x, 0);
            balls.push(Some(spawn(&mut world, slot, player, x)));
        }
        let mut dynamic = DynamicBuckets::init(board, rng, &mut recorder);

        let mut finished = None;
        for step in 0..config.max_steps {
            dynamic.advance(step, config.cycle_steps, &mut recorder);
            let hits: Vec<(usize, usize)> = world
                .step(physics.step_ms)
                .iter()
                .filter_map(bucket_hit)
                .collect();

            // Balls added mid-step are processed in the same step
            let mut slot = 0;
            while slot < balls.len() {
                let current = slot;
                slot += 1;

                let Some(handle) = balls[current] else {
                    recorder.record(current, Vec2::splat(KILLED_BALL_POS));
                    continue;
                };
                let Some(pos) = world.position(handle) else {
                    balls[current] = None;
                    recorder.record(current, Vec2::splat(KILLED_BALL_POS));
                    continue;
                };
                recorder.record(current, pos);

                let spawn_x = recorder.spawn_x[current];
                let respawn = |world: &mut W| {
                    world.set_position(handle, Vec2::new(spawn_x, SPAWN_Y));
                    world.set_velocity(handle, Vec2::ZERO);
                };

                if pos.x < 0.0 || pos.x > width || pos.y > height {
                    respawn(&mut world);
                    continue;
                }
                let Some(&(_, bucket)) = hits.iter().find(|(s, _)| *s == current) else {
                    continue;
                };

                let owner = recorder.path_owner[current];
                let effect = dynamic.resolve(
                    bucket,
                    board.effect(bucket).unwrap_or(BucketEffect::Blank),
                    config,
                );
                let kind = ledger.apply(owner, effect);
                recorder.push_event(step, Some(owner), Some(bucket), kind.clone());

                match kind {
                    EventKind::Kill => {
                        world.remove_body(handle);
                        balls[current] = None;
                    }
                    EventKind::ExtraBall => {
                        let jitter = config.extra_ball_jitter;
                        let x = (spawn_x + rng.range(-jitter, jitter))
                            .clamp(radius, width - radius);
                        let new_slot = recorder.add_ball(owner, x, step);
                        balls.push(Some(spawn(&mut world, new_slot, owner, x)));
                        respawn(&mut world);
                    }
                    _ => respawn(&mut world),
                }
            }

            match ledger.standing(winner, target) {
                Standing::Racing => {}
                Standing::Won => {
                    finished = Some(step + 1);
                    break;
                }
                Standing::Lost { player } => {
                    log::trace!("Player {player} reached {target} first at step {step}");
                    break;
                }
            }
        }
        world.destroy();

        let steps = finished?;
        Some(recorder.into_trace(
            steps,
            config.frame_multiplier,
            *players,
            height,
            Outcome::Race {
                winner_index: winner,
                scores: ledger.scores().to_vec(),
            },
        ))
    }
}

/// Record a default-configured race won by `winner`
///
/// `seed` makes the search reproducible; without one the race is seeded
/// from entropy.
pub fn run_race(players: usize, winner: usize, target: f64, seed: Option<&str>) -> Result<Trace> {
    let config = RaceConfig {
        seed: seed.map(str::to_owned),
        ..Default::default()
    };
    RaceEngine::new(config, players)?.run_race(winner, target)
}

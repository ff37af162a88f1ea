//! Trace playback
//!
//! Replays a recorded [`Trace`] at a fixed 60 fps without touching physics.
//! The host drives time: it calls [`ReplayDriver::tick`] with its clock and
//! receives frames and events through a [`ReplaySink`]. Race traces are
//! recorded at a quarter of the display rate; in-between frames are
//! interpolated unless a ball jumped (respawn), in which case it snaps.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::trace::{EventKind, Trace, TraceEvent};
use crate::consts::{REPLAY_FRAME_MS, REPLAY_MAX_ELAPSED_MS, SPAWN_Y, TELEPORT_FACTOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Finished,
    Cancelled,
}

/// Handle to one started replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplayToken {
    generation: u64,
}

/// A ball as drawn during playback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualBall {
    pub slot: usize,
    pub owner: usize,
    pub position: Vec2,
}

/// Receives playback output
pub trait ReplaySink {
    /// Called once per frame after positions are updated
    fn on_frame(&mut self, frame: u32, balls: &[VisualBall]);

    /// Called for each event as its frame is reached, before `on_frame`
    fn on_event(&mut self, _event: &TraceEvent) {}
}

/// Sink that only wants frame indices
pub struct FrameCallback<F: FnMut(u32)>(pub F);

impl<F: FnMut(u32)> ReplaySink for FrameCallback<F> {
    fn on_frame(&mut self, frame: u32, _balls: &[VisualBall]) {
        (self.0)(frame)
    }
}

/// Linear interpolation between two samples
pub fn interpolate(a: Vec2, b: Vec2, fraction: f32) -> Vec2 {
    a.lerp(b, fraction)
}

/// Position of `slot` at replay frame `frame`
fn ball_position(trace: &Trace, slot: usize, frame: u32) -> Option<Vec2> {
    let samples = trace.sample_count(slot);
    let last = samples.checked_sub(1)?;
    let multiplier = trace.frame_multiplier.max(1);

    let i = ((frame / multiplier) as usize).min(last);
    let j = (i + 1).min(last);
    let fraction = (frame % multiplier) as f32 / multiplier as f32;
    let a = trace.sample(slot, i)?;
    let b = trace.sample(slot, j)?;

    if (b.y - a.y).abs() > trace.board_height * TELEPORT_FACTOR {
        Some(if fraction == 0.0 { a } else { b })
    } else {
        Some(interpolate(a, b, fraction))
    }
}

/// Frame-by-frame cursor over one trace
#[derive(Debug, Clone)]
pub struct Playback {
    trace: Trace,
    frame: u32,
    event_cursor: usize,
    balls: Vec<VisualBall>,
}

impl Playback {
    pub fn new(trace: Trace) -> Self {
        let balls = (0..trace.initial_balls.min(trace.paths.len()))
            .map(|slot| spawned_ball(&trace, slot))
            .collect();
        Self {
            trace,
            frame: 0,
            event_cursor: 0,
            balls,
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Next frame to be emitted
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn balls(&self) -> &[VisualBall] {
        &self.balls
    }

    pub fn is_finished(&self) -> bool {
        self.frame >= self.trace.total_frames
    }

    /// Emit one frame; false once the trace is exhausted
    pub fn advance_frame(&mut self, sink: &mut dyn ReplaySink) -> bool {
        if self.is_finished() {
            return false;
        }
        let frame = self.frame;
        let trace = &self.trace;

        // Extra balls become visible on the frame they were granted
        let pending = trace.events[self.event_cursor..]
            .iter()
            .take_while(|e| e.frame <= frame)
            .filter(|e| e.kind == EventKind::ExtraBall)
            .count();
        for _ in 0..pending {
            let slot = self.balls.len();
            if slot < trace.paths.len() {
                self.balls.push(spawned_ball(trace, slot));
            }
        }

        for ball in &mut self.balls {
            if let Some(pos) = ball_position(trace, ball.slot, frame) {
                ball.position = pos;
            }
        }

        while let Some(event) = trace.events.get(self.event_cursor) {
            if event.frame > frame {
                break;
            }
            sink.on_event(event);
            self.event_cursor += 1;
        }

        sink.on_frame(frame, &self.balls);
        self.frame += 1;
        true
    }

    /// Emit every remaining frame; returns how many were emitted
    pub fn run_to_end(&mut self, sink: &mut dyn ReplaySink) -> u32 {
        let mut emitted = 0;
        while self.advance_frame(sink) {
            emitted += 1;
        }
        emitted
    }
}

fn spawned_ball(trace: &Trace, slot: usize) -> VisualBall {
    let x = trace.spawn_x.get(slot).copied().unwrap_or_default();
    VisualBall {
        slot,
        owner: trace.path_owner.get(slot).copied().unwrap_or_default(),
        position: Vec2::new(x, SPAWN_Y),
    }
}

struct ActiveReplay {
    token: ReplayToken,
    playback: Playback,
    last_ms: f64,
    accumulator: f64,
}

/// Host-clocked replay with cancellation
///
/// Starting a replay cancels the one in progress. Tokens of cancelled or
/// finished replays are stale and cancelling them is a no-op.
pub struct ReplayDriver {
    generation: u64,
    active: Option<ActiveReplay>,
    state: PlaybackState,
}

impl Default for ReplayDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayDriver {
    pub fn new() -> Self {
        Self {
            generation: 0,
            active: None,
            state: PlaybackState::Idle,
        }
    }

    pub fn start(&mut self, trace: Trace, now_ms: f64) -> ReplayToken {
        self.stop();
        self.generation += 1;
        let token = ReplayToken {
            generation: self.generation,
        };
        log::debug!(
            "Replay {} started ({} frames)",
            token.generation,
            trace.total_frames
        );
        self.active = Some(ActiveReplay {
            token,
            playback: Playback::new(trace),
            last_ms: now_ms,
            accumulator: 0.0,
        });
        self.state = PlaybackState::Playing;
        token
    }

    /// Advance to `now_ms`, emitting every frame that came due
    ///
    /// Elapsed time is clamped so a stalled host catches up gradually
    /// rather than flushing the whole replay at once.
    pub fn tick(&mut self, now_ms: f64, sink: &mut dyn ReplaySink) -> PlaybackState {
        let Some(active) = self.active.as_mut() else {
            return self.state;
        };

        let elapsed = (now_ms - active.last_ms).clamp(0.0, REPLAY_MAX_ELAPSED_MS);
        active.last_ms = now_ms;
        active.accumulator += elapsed;

        while active.accumulator >= REPLAY_FRAME_MS {
            if !active.playback.advance_frame(sink) {
                break;
            }
            active.accumulator -= REPLAY_FRAME_MS;
        }

        if active.playback.is_finished() {
            log::debug!("Replay {} finished", active.token.generation);
            self.active = None;
            self.state = PlaybackState::Finished;
        }
        self.state
    }

    /// Stop the replay `token` refers to; false if it is not current
    pub fn cancel(&mut self, token: ReplayToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.stop();
        true
    }

    /// Stop whatever is playing
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            self.cancel_logged(&active);
        }
    }

    fn cancel_logged(&mut self, active: &ActiveReplay) {
        log::debug!(
            "Replay {} cancelled at frame {}",
            active.token.generation,
            active.playback.frame()
        );
        self.state = PlaybackState::Cancelled;
    }

    pub fn is_current(&self, token: ReplayToken) -> bool {
        self.active.as_ref().is_some_and(|a| a.token == token)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.playback.frame())
    }

    pub fn balls(&self) -> &[VisualBall] {
        self.active.as_ref().map(|a| a.playback.balls()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::trace::Outcome;

    #[derive(Default)]
    struct Log {
        frames: Vec<u32>,
        events: Vec<u32>,
        positions: Vec<Vec<VisualBall>>,
    }

    impl ReplaySink for Log {
        fn on_frame(&mut self, frame: u32, balls: &[VisualBall]) {
            self.frames.push(frame);
            self.positions.push(balls.to_vec());
        }

        fn on_event(&mut self, event: &TraceEvent) {
            self.events.push(event.frame);
        }
    }

    fn race_trace() -> Trace {
        Trace {
            // Ball 0 falls, then respawns at the top on the third sample
            paths: vec![
                vec![350.0, -10.0, 350.0, 100.0, 350.0, 600.0, 350.0, -10.0],
                vec![340.0, -10.0, 340.0, -10.0, 340.0, -10.0, 345.0, 30.0],
            ],
            path_owner: vec![0, 0],
            spawn_x: vec![350.0, 340.0],
            initial_balls: 1,
            events: vec![
                TraceEvent {
                    frame: 8,
                    actor: Some(0),
                    bucket: Some(2),
                    kind: EventKind::ExtraBall,
                },
                TraceEvent {
                    frame: 12,
                    actor: Some(0),
                    bucket: Some(1),
                    kind: EventKind::Score { value: 10.0 },
                },
            ],
            total_frames: 16,
            frame_multiplier: 4,
            board_height: 700.0,
            outcome: Outcome::Race {
                winner_index: 0,
                scores: vec![10.0],
            },
        }
    }

    #[test]
    fn test_interpolation_and_snap() {
        let trace = race_trace();
        assert_eq!(ball_position(&trace, 0, 0), Some(Vec2::new(350.0, -10.0)));
        assert_eq!(ball_position(&trace, 0, 2), Some(Vec2::new(350.0, 45.0)));
        // 100 -> 600 is a 500 px jump: snap to the next sample mid-way
        assert_eq!(ball_position(&trace, 0, 5), Some(Vec2::new(350.0, 600.0)));
        assert_eq!(ball_position(&trace, 0, 4), Some(Vec2::new(350.0, 100.0)));
        // Past the end holds the last sample
        assert_eq!(ball_position(&trace, 0, 15), Some(Vec2::new(350.0, -10.0)));
        assert_eq!(ball_position(&trace, 7, 0), None);
    }

    #[test]
    fn test_playback_emits_every_frame() {
        let mut playback = Playback::new(race_trace());
        let mut log = Log::default();
        assert_eq!(playback.run_to_end(&mut log), 16);
        assert_eq!(log.frames, (0..16).collect::<Vec<_>>());
        assert_eq!(log.events, vec![8, 12]);
        assert!(!playback.advance_frame(&mut log));

        // Extra ball visible from its event frame onwards
        assert_eq!(log.positions[7].len(), 1);
        assert_eq!(log.positions[8].len(), 2);
        assert_eq!(log.positions[8][1].slot, 1);
    }

    #[test]
    fn test_driver_paces_frames() {
        let mut driver = ReplayDriver::new();
        let mut log = Log::default();
        let token = driver.start(race_trace(), 1000.0);
        assert_eq!(driver.state(), PlaybackState::Playing);

        // Nothing due yet
        driver.tick(1010.0, &mut log);
        assert!(log.frames.is_empty());

        driver.tick(1040.0, &mut log);
        assert_eq!(log.frames, vec![0, 1]);

        // A long stall is clamped to 100 ms (6 frames)
        driver.tick(5000.0, &mut log);
        assert_eq!(log.frames.len(), 8);

        let mut now = 5000.0;
        while driver.tick(now, &mut log) == PlaybackState::Playing {
            now += 20.0;
        }
        assert_eq!(driver.state(), PlaybackState::Finished);
        assert_eq!(log.frames, (0..16).collect::<Vec<_>>());
        assert!(!driver.cancel(token));
    }

    #[test]
    fn test_cancel_and_restart() {
        let mut driver = ReplayDriver::new();
        let mut log = Log::default();
        let first = driver.start(race_trace(), 0.0);
        driver.tick(50.0, &mut log);

        let second = driver.start(race_trace(), 50.0);
        assert!(!driver.is_current(first));
        assert!(!driver.cancel(first));
        assert!(driver.is_current(second));

        assert!(driver.cancel(second));
        assert!(!driver.cancel(second));
        assert_eq!(driver.state(), PlaybackState::Cancelled);

        let before = log.frames.len();
        driver.tick(500.0, &mut log);
        assert_eq!(log.frames.len(), before);
        assert!(driver.balls().is_empty());
    }

    #[test]
    fn test_frame_callback() {
        let mut frames = Vec::new();
        let mut trace = race_trace();
        trace.total_frames = 3;
        Playback::new(trace).run_to_end(&mut FrameCallback(|f| frames.push(f)));
        assert_eq!(frames, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_trace_finishes() {
        let mut trace = race_trace();
        trace.total_frames = 0;
        let mut driver = ReplayDriver::new();
        let mut log = Log::default();
        driver.start(trace, 0.0);
        assert_eq!(driver.tick(20.0, &mut log), PlaybackState::Finished);
        assert!(log.frames.is_empty());
    }
}

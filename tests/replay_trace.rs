//! Replaying recorded races through the host-clocked driver

use glam::Vec2;
use plinko_sim::consts::{KILLED_BALL_POS, REPLAY_FRAME_MS, SPAWN_Y};
use plinko_sim::sim::{
    BucketEffect, EventKind, PlaybackState, RaceEngine, ReplayDriver, ReplaySink, Trace,
    TraceEvent, VisualBall,
};
use plinko_sim::RaceConfig;

#[derive(Default)]
struct Recorder {
    frames: Vec<u32>,
    events: Vec<TraceEvent>,
    ball_counts: Vec<usize>,
    balls: Vec<Vec<VisualBall>>,
}

impl ReplaySink for Recorder {
    fn on_frame(&mut self, frame: u32, balls: &[VisualBall]) {
        self.frames.push(frame);
        self.ball_counts.push(balls.len());
        self.balls.push(balls.to_vec());
    }

    fn on_event(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}

fn race(seed: &str) -> Trace {
    RaceEngine::new(RaceConfig::default().with_seed(seed), 3)
        .unwrap()
        .run_race(1, 40.0)
        .unwrap()
}

fn play_out(driver: &mut ReplayDriver, sink: &mut Recorder, mut now: f64) {
    while driver.tick(now, sink) == PlaybackState::Playing {
        now += REPLAY_FRAME_MS;
    }
}

#[test]
fn test_every_frame_once_in_order() {
    let trace = race("replay-frames");
    let total = trace.total_frames;
    let expected_events = trace.events.clone();

    let mut driver = ReplayDriver::new();
    let mut sink = Recorder::default();
    driver.start(trace, 0.0);
    play_out(&mut driver, &mut sink, 0.0);

    assert_eq!(driver.state(), PlaybackState::Finished);
    assert_eq!(sink.frames, (0..total).collect::<Vec<_>>());
    assert_eq!(sink.events, expected_events);
}

#[test]
fn test_extra_balls_appear_with_their_event() {
    let trace = race("replay-frames");
    let initial = trace.initial_balls;
    let paths = trace.paths.len();
    let grants: Vec<&TraceEvent> = trace
        .events
        .iter()
        .filter(|e| e.kind == EventKind::ExtraBall)
        .collect();
    assert!(!grants.is_empty());
    assert_eq!(paths, initial + grants.len());

    // Extra balls take the next slots in grant order
    for (i, grant) in grants.iter().enumerate() {
        let slot = initial + i;
        assert_eq!(Some(trace.path_owner[slot]), grant.actor);
        let step = (grant.frame / trace.frame_multiplier) as usize;
        assert_eq!(
            trace.sample(slot, step),
            Some(Vec2::new(trace.spawn_x[slot], SPAWN_Y))
        );
    }
    let grant_frames: Vec<u32> = grants.iter().map(|e| e.frame).collect();

    let mut driver = ReplayDriver::new();
    let mut sink = Recorder::default();
    driver.start(trace, 0.0);
    play_out(&mut driver, &mut sink, 0.0);

    for (frame, &count) in sink.ball_counts.iter().enumerate() {
        let granted = grant_frames.iter().filter(|&&f| f <= frame as u32).count();
        assert_eq!(count, initial + granted);
    }
    assert_eq!(*sink.ball_counts.last().unwrap(), paths);
}

fn killing_race(seed: &str) -> Trace {
    let mut buckets = vec![BucketEffect::Score { value: 10.0 }; 13];
    for edge in [0, 3, 9, 12] {
        buckets[edge] = BucketEffect::Kill;
    }
    let config = RaceConfig {
        buckets,
        ..Default::default()
    }
    .with_seed(seed);
    RaceEngine::new(config, 3).unwrap().run_race(0, 30.0).unwrap()
}

#[test]
fn test_killed_ball_parks_off_board() {
    let stub = Vec2::splat(KILLED_BALL_POS);
    // A kill with at least one recorded step after it
    let (trace, kill) = ["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7"]
        .into_iter()
        .map(killing_race)
        .find_map(|trace| {
            let steps = trace.total_frames / trace.frame_multiplier;
            let kill = trace
                .events
                .iter()
                .find(|e| {
                    e.kind == EventKind::Kill && e.frame / trace.frame_multiplier + 1 < steps
                })?
                .clone();
            Some((trace, kill))
        })
        .expect("a race with a kill");

    let steps = (trace.total_frames / trace.frame_multiplier) as usize;
    // No extra-ball buckets, so slots are players
    assert_eq!(trace.paths.len(), 3);
    for path in &trace.paths {
        assert_eq!(path.len(), steps * 2);
    }

    let slot = kill.actor.unwrap();
    let kill_step = (kill.frame / trace.frame_multiplier) as usize;
    assert_ne!(trace.sample(slot, kill_step), Some(stub));
    for step in kill_step + 1..steps {
        assert_eq!(trace.sample(slot, step), Some(stub), "step {step}");
    }

    let total = trace.total_frames;
    let mut driver = ReplayDriver::new();
    let mut sink = Recorder::default();
    driver.start(trace, 0.0);
    play_out(&mut driver, &mut sink, 0.0);

    // Snaps straight to the stub instead of streaking across the board
    for frame in kill.frame + 1..total {
        let ball = sink.balls[frame as usize][slot];
        assert_eq!(ball.slot, slot);
        assert_eq!(ball.position, stub, "frame {frame}");
    }
}

#[test]
fn test_restart_cancels_previous_replay() {
    let first = race("replay-a");
    let second = race("replay-b");
    let second_total = second.total_frames;

    let mut driver = ReplayDriver::new();
    let mut sink = Recorder::default();
    let stale = driver.start(first, 0.0);
    driver.tick(100.0, &mut sink);
    assert!(!sink.frames.is_empty());

    let mut fresh = Recorder::default();
    let token = driver.start(second, 100.0);
    assert!(!driver.cancel(stale));
    assert!(driver.is_current(token));
    play_out(&mut driver, &mut fresh, 100.0);
    assert_eq!(fresh.frames, (0..second_total).collect::<Vec<_>>());
}

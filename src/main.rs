//! Plinko Sim entry point
//!
//! Native: `plinko-sim [game.json]` runs one search, replays it headlessly
//! and prints the trace JSON to stdout. Without a file it drops a ball into
//! the centre bucket of the default board.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::process::ExitCode;

    use plinko_sim::config::DropTarget;
    use plinko_sim::sim::{
        DropSimulator, EventKind, Playback, RaceEngine, ReplaySink, Trace, TraceEvent, VisualBall,
    };
    use plinko_sim::{GameConfig, PlinkoConfig, Result};

    /// Counts what a host would draw
    #[derive(Default)]
    struct Summary {
        frames: u32,
        events: u32,
        scores: u32,
        max_balls: usize,
    }

    impl ReplaySink for Summary {
        fn on_frame(&mut self, _frame: u32, balls: &[VisualBall]) {
            self.frames += 1;
            self.max_balls = self.max_balls.max(balls.len());
        }

        fn on_event(&mut self, event: &TraceEvent) {
            self.events += 1;
            if matches!(event.kind, EventKind::Score { .. }) {
                self.scores += 1;
            }
        }
    }

    fn default_game() -> GameConfig {
        let config = PlinkoConfig::default();
        let center = config.board.rows as usize / 2;
        GameConfig::Drop {
            config,
            target: DropTarget::Bucket(center),
        }
    }

    fn run_game(game: GameConfig) -> Result<Trace> {
        match game {
            GameConfig::Drop { config, target } => {
                let mut sim = DropSimulator::new(config)?;
                match target {
                    DropTarget::Bucket(bucket) => {
                        let attempts = sim.config().max_attempts;
                        sim.simulate_for_outcome(bucket, attempts)
                    }
                    DropTarget::Multiplier(multiplier) => sim.drop_for_multiplier(multiplier),
                }
            }
            GameConfig::Race {
                config,
                players,
                winner,
                target,
            } => {
                let target = target.unwrap_or(config.target_score);
                RaceEngine::new(config, players)?.run_race(winner, target)
            }
        }
    }

    fn run(path: Option<String>) -> Result<()> {
        let game = match path {
            Some(path) => GameConfig::load(path)?,
            None => default_game(),
        };
        let trace = run_game(game)?;

        let mut summary = Summary::default();
        Playback::new(trace.clone()).run_to_end(&mut summary);
        log::info!(
            "Replayed {} frames, {} events ({} scores), up to {} balls",
            summary.frames,
            summary.events,
            summary.scores,
            summary.max_balls
        );

        println!("{}", trace.to_json()?);
        Ok(())
    }

    pub fn main() -> ExitCode {
        env_logger::init();
        log::info!("Plinko Sim (native) starting...");

        match run(std::env::args().nth(1)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                log::error!("{err}");
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    cli::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is plinko_sim::wasm::init, this is just to satisfy the compiler
}

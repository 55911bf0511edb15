//! Headless level runner.
//!
//! Runs levels without graphics for CI, balance sweeps, and replay
//! verification.
//!
//! # Usage
//!
//! ```bash
//! # Run a level to completion, recording a replay
//! cargo run -p lemmings_headless -- run --level levels/crossing.ron --record out.replay
//!
//! # Verify a recorded replay against its level
//! cargo run -p lemmings_headless -- verify --level levels/crossing.ron --replay out.replay
//! ```
//!
//! Logs go to stderr; the summary line goes to stdout. `verify` exits
//! non-zero when the replay does not reproduce the recorded state.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use lemmings_core::error::EngineError;
use lemmings_core::level::LevelDescriptor;
use lemmings_core::replay::{Replay, ReplayPlayer};
use lemmings_core::session::SessionOutcome;
use lemmings_runtime::scheduler::{GameLoop, SchedulerState};

#[derive(Parser)]
#[command(name = "lemmings_headless")]
#[command(about = "Headless level runner for CI and replay verification")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a level to completion without input
    Run {
        /// Level description (RON)
        #[arg(long)]
        level: PathBuf,
        /// Write the recorded replay here
        #[arg(long)]
        record: Option<PathBuf>,
        /// Abort after this many ticks
        #[arg(long, default_value_t = 100_000)]
        max_ticks: u64,
    },
    /// Verify that a replay reproduces its recorded final state
    Verify {
        /// Level description (RON)
        #[arg(long)]
        level: PathBuf,
        /// Recorded replay
        #[arg(long)]
        replay: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse level {path}: {source}")]
    ParseLevel {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_level(path: &Path) -> Result<LevelDescriptor, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| CliError::ParseLevel {
        path: path.to_path_buf(),
        source,
    })
}

fn load_replay(path: &Path) -> Result<Replay, CliError> {
    let bytes = fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Replay::from_bytes(&bytes)?)
}

fn run(level_path: &Path, record: Option<&Path>, max_ticks: u64) -> Result<ExitCode, CliError> {
    let level = load_level(level_path)?;
    tracing::info!(level = %level.identity, max_ticks, "running headless");

    let mut game = GameLoop::new(level)?;
    if record.is_some() {
        game = game.with_recording();
    }
    game.start();
    while game.state() != SchedulerState::Ended && game.session().tick_count() < max_ticks {
        game.step_frame();
    }

    let counters = game.session().counters();
    let outcome = game.session().outcome();
    let tick = game.session().tick_count();
    println!(
        "tick {tick}: {}/{} rescued, {} dead, outcome {outcome:?}",
        counters.exited, counters.required, counters.dead
    );

    if let Some(path) = record {
        let replay = game
            .finish_recording()
            .ok_or_else(|| EngineError::InvalidState("recording was not enabled".into()))?;
        fs::write(path, replay.to_bytes()?).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "replay written");
    }

    let success = matches!(outcome, SessionOutcome::Ended { success: true });
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn verify(level_path: &Path, replay_path: &Path) -> Result<ExitCode, CliError> {
    let level = load_level(level_path)?;
    let replay = load_replay(replay_path)?;
    tracing::info!(
        level = %level.identity,
        actions = replay.actions.len(),
        final_tick = replay.final_tick,
        "verifying replay"
    );

    let mut player = ReplayPlayer::new(level, replay)?;
    match player.verify() {
        Ok(outcome) => {
            let counters = player.session().counters();
            println!(
                "replay verified: tick {}, {}/{} rescued, outcome {outcome:?}",
                player.session().tick_count(),
                counters.exited,
                counters.required
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ EngineError::ReplayDiverged { .. }) => {
            eprintln!("verification failed: {err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            level,
            record,
            max_ticks,
        } => run(&level, record.as_deref(), max_ticks),
        Commands::Verify { level, replay } => verify(&level, &replay),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

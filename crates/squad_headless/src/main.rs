//! Headless battle runner.
//!
//! This binary runs battles without a front end, controlled via JSON on
//! stdin/stdout. Designed for AI controllers, CI testing, and replay
//! verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p squad_headless
//!
//! # Play a scenario from a script, recording a replay
//! cargo run -p squad_headless -- run --scenario scenarios/ford.ron \
//!     --script scenarios/ford.jsonl --record ford.replay
//!
//! # Check that a script always ends the same way
//! cargo run -p squad_headless -- verify --scenario scenarios/ford.ron \
//!     --script scenarios/ford.jsonl --runs 5
//!
//! # Re-run a replay and compare its end state
//! cargo run -p squad_headless -- replay --file ford.replay --verify
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use squad_core::replay::{Replay, ReplayPlayer};
use squad_core::simulation::Simulation;
use squad_headless::{
    load_content, load_scenario, load_script,
    protocol::Response,
    runner::{write_response, HeadlessConfig, HeadlessRunner},
    verify_script, Result,
};

#[derive(Parser)]
#[command(name = "squad_headless")]
#[command(about = "Headless squad battle runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single game, interactively or from a script
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Content file replacing the builtin units and weapons
        #[arg(long)]
        content: Option<PathBuf>,

        /// Script of commands to play instead of reading stdin
        #[arg(long)]
        script: Option<PathBuf>,

        /// Write a replay of the session to this file
        #[arg(long)]
        record: Option<PathBuf>,

        /// Seed for an empty battlefield when no scenario is given
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Output state after every turn
        #[arg(long)]
        auto_state: bool,
    },

    /// Verify determinism by running the same script multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long)]
        scenario: PathBuf,

        /// Script to play
        #[arg(long)]
        script: PathBuf,

        /// Content file replacing the builtin units and weapons
        #[arg(long)]
        content: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "3")]
        runs: usize,
    },

    /// Replay a recorded game
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },

    /// Check that a scenario loads against its content
    Check {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: PathBuf,

        /// Content file replacing the builtin units and weapons
        #[arg(long)]
        content: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            content,
            script,
            record,
            seed,
            auto_state,
        }) => cmd_run(
            scenario.as_deref(),
            content.as_deref(),
            script.as_deref(),
            record.as_deref(),
            seed,
            auto_state,
        ),
        Some(Commands::Verify {
            scenario,
            script,
            content,
            runs,
        }) => cmd_verify(&scenario, &script, content.as_deref(), runs),
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify),
        Some(Commands::Check { scenario, content }) => cmd_check(&scenario, content.as_deref()),
        None => {
            // Default: interactive mode on an empty battlefield
            cmd_run(None, None, None, None, 0, false)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Run a single game.
fn cmd_run(
    scenario: Option<&Path>,
    content: Option<&Path>,
    script: Option<&Path>,
    record: Option<&Path>,
    seed: u64,
    auto_state: bool,
) -> Result<()> {
    let registry = load_content(content)?;
    let config = HeadlessConfig {
        auto_state_output: auto_state,
    };
    let mut runner = match scenario {
        Some(path) => HeadlessRunner::from_scenario(&load_scenario(path)?, registry, config)?,
        None => {
            tracing::info!(seed, "Starting on an empty battlefield");
            HeadlessRunner::new(Simulation::new(seed), registry, config)?
        }
    };
    if record.is_some() {
        runner.start_recording()?;
    }

    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());
    match script {
        Some(path) => {
            let commands = load_script(path)?;
            tracing::info!(commands = commands.len(), "Playing script");
            write_response(&mut output, &runner.ready())?;
            for response in runner.run_script(&commands) {
                write_response(&mut output, &response)?;
            }
        }
        None => {
            tracing::info!("Starting interactive session");
            runner.run(io::stdin().lock(), &mut output)?;
        }
    }

    if let (Some(path), Some(replay)) = (record, runner.take_recording()) {
        std::fs::write(path, replay.to_bytes()?)?;
        eprintln!(
            "Replay saved to {} ({} turns, {} orders)",
            path.display(),
            replay.duration(),
            replay.order_count()
        );
    }
    Ok(())
}

/// Run the same script several times and compare the outcomes.
fn cmd_verify(scenario: &Path, script: &Path, content: Option<&Path>, runs: usize) -> Result<()> {
    let registry = load_content(content)?;
    let scenario = load_scenario(scenario)?;
    let commands = load_script(script)?;

    eprintln!(
        "Verifying determinism: scenario={}, seed={}, runs={}",
        scenario.id, scenario.seed, runs
    );
    let report = verify_script(&scenario, &registry, &commands, runs)?;

    eprintln!("\n=== Determinism Check ===");
    eprintln!("Runs:            {}", report.runs);
    eprintln!("Final turn:      {}", report.final_turn);
    eprintln!("Final hash:      {:#018x}", report.final_hash);
    eprintln!("Events logged:   {}", report.events);
    eprintln!("Rejected lines:  {}", report.rejected_commands);
    eprintln!("\n✓ All runs produced identical results");
    Ok(())
}

/// Replay a recorded game, either checking it or printing its events.
fn cmd_replay(file: &Path, verify: bool) -> Result<()> {
    let replay = Replay::from_bytes(&std::fs::read(file)?)?;
    eprintln!(
        "Replay: scenario={}, seed={}, turns={}, orders={}",
        replay.scenario_id,
        replay.seed,
        replay.duration(),
        replay.order_count()
    );

    if verify {
        if replay.verify()? {
            eprintln!("✓ Replay reproduces hash {:#018x}", replay.final_hash);
            return Ok(());
        }
        return Err(squad_headless::RunnerError::ReplayMismatch);
    }

    let sim = replay.replay()?;
    let mut player = ReplayPlayer::from_log(sim.log());
    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());
    while let Some(turn) = player.advance() {
        let response = Response::Events {
            turn: turn.turn,
            events: turn.events.clone(),
        };
        write_response(&mut output, &response)?;
    }
    Ok(())
}

/// Load a scenario and report what it sets up.
fn cmd_check(scenario: &Path, content: Option<&Path>) -> Result<()> {
    let registry = load_content(content)?;
    let scenario = load_scenario(scenario)?;
    let sim = Simulation::from_scenario(&scenario, &registry)?;
    let roster = sim.roster();

    eprintln!("Scenario:  {} ({})", scenario.name, scenario.id);
    eprintln!("Map:       {} x {}", scenario.map_size.0, scenario.map_size.1);
    eprintln!("Player:    {} units", roster.player.len());
    eprintln!("Enemy:     {} units", roster.enemy.len());
    eprintln!("Obstacles: {}", scenario.obstacles.len());
    eprintln!("Off map:   {}", scenario.units_off_map().count());
    eprintln!("Hash:      {:#018x}", sim.state_hash());
    Ok(())
}

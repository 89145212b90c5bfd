//! Determinism checks for CI: run one script several times and compare.

use serde::{Deserialize, Serialize};
use squad_core::data::ContentRegistry;
use squad_core::scenario::Scenario;
use squad_core::simulation::Simulation;
use squad_core::snapshot::Snapshot;
use tracing::{debug, info};

use crate::error::{Result, RunnerError};
use crate::protocol::{Command, Response};
use crate::runner::{HeadlessConfig, HeadlessRunner};

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Runs compared.
    pub runs: usize,
    /// Turn every run ended on.
    pub final_turn: u32,
    /// State hash every run ended on.
    pub final_hash: u64,
    /// Events logged per run.
    pub events: usize,
    /// Commands the runner answered with `error`.
    pub rejected_commands: usize,
}

struct RunOutcome {
    hash: u64,
    turn: u32,
    log: String,
    rejected: usize,
}

fn play(
    scenario: &Scenario,
    registry: &ContentRegistry,
    script: &[Command],
) -> Result<(HeadlessRunner, RunOutcome)> {
    let mut runner = HeadlessRunner::from_scenario(scenario, registry.clone(), HeadlessConfig::default())?;
    runner.start_recording()?;
    let responses = runner.run_script(script);
    let sim = runner.simulation();
    let outcome = RunOutcome {
        hash: sim.state_hash(),
        turn: sim.turn(),
        log: serde_json::to_string(sim.log().events())?,
        rejected: responses
            .iter()
            .filter(|r| matches!(r, Response::Error { .. }))
            .count(),
    };
    Ok((runner, outcome))
}

/// Play `script` against `scenario` `runs` times (at least once).
///
/// Every run must end on the same hash and the same event log. The last
/// run is also saved and restored, and its recording re-run, and both
/// must land on the same state.
///
/// # Errors
///
/// Fails with the first mismatch found, or if the scenario cannot load.
pub fn verify_script(
    scenario: &Scenario,
    registry: &ContentRegistry,
    script: &[Command],
    runs: usize,
) -> Result<VerifyReport> {
    let (mut runner, first) = play(scenario, registry, script)?;
    for run in 1..runs.max(1) {
        let (next_runner, outcome) = play(scenario, registry, script)?;
        if outcome.hash != first.hash {
            return Err(RunnerError::Diverged {
                run,
                expected: first.hash,
                actual: outcome.hash,
            });
        }
        if outcome.log != first.log {
            return Err(RunnerError::LogMismatch { run });
        }
        debug!(run, hash = outcome.hash, "run matched");
        runner = next_runner;
    }

    let sim = runner.simulation();
    let restored = Simulation::restore(Snapshot::from_bytes(&sim.snapshot().to_bytes()?)?, Some(registry))?;
    if restored.state_hash() != sim.state_hash() {
        return Err(RunnerError::SnapshotMismatch);
    }

    if let Some(replay) = runner.take_recording() {
        if !replay.verify()? {
            return Err(RunnerError::ReplayMismatch);
        }
    }

    let report = VerifyReport {
        runs: runs.max(1),
        final_turn: first.turn,
        final_hash: first.hash,
        events: runner.simulation().log().len(),
        rejected_commands: first.rejected,
    };
    info!(
        runs = report.runs,
        turn = report.final_turn,
        hash = report.final_hash,
        "verification passed"
    );
    Ok(report)
}

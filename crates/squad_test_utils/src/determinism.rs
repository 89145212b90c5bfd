//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the rules engine
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Saves, replays and desync checks all assume that the same start state
//! and the same orders always resolve to the same outcome. Sources of
//! non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The entity store is a `BTreeMap` and everything iterates in id order.
//!
//! - **System randomness**: every roll comes from the session's seeded
//!   counter-based RNG, whose cursor is part of the saved state.
//!
//! - **Hidden state**: anything the snapshot does not carry (subscribers,
//!   caches) must not influence resolution.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual rules (movement, combat, morale)
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: running N sessions on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use squad_core::error::Result;
use squad_core::simulation::Simulation;
use tracing::debug;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns played.
    pub turns: u32,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each session.
    pub hashes: Vec<u64>,
    /// Number of turns each session played.
    pub turns: u32,
    /// Number of sessions run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all sessions produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all sessions matched.
    ///
    /// # Panics
    ///
    /// Panics if sessions produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Turns: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run any stepped process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `turns` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    turns: u32,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..turns {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    }
}

/// Plan with `plan`, then resolve, `turns` times.
///
/// # Panics
///
/// Panics if planning or resolution fails.
pub fn play_turns<P>(sim: &mut Simulation, plan: &P, turns: u32)
where
    P: Fn(&mut Simulation) -> Result<()>,
{
    for _ in 0..turns {
        plan(sim).expect("planning should succeed");
        sim.advance().expect("resolution should succeed");
    }
}

/// Play the same scripted game twice and compare the final state hashes.
///
/// # Arguments
///
/// * `setup_fn` - Function that creates a session
/// * `plan` - Order script run at the start of every planning phase
/// * `turns` - Number of turns to play
pub fn verify_simulation_determinism<F, P>(setup_fn: F, plan: P, turns: u32) -> bool
where
    F: Fn() -> Simulation,
    P: Fn(&mut Simulation) -> Result<()>,
{
    let result = verify_determinism(
        2,
        turns,
        &setup_fn,
        |sim| play_turns(sim, &plan, 1),
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N sessions on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// variations or memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_simulations_scoped<F, P>(
    setup_fn: F,
    plan: P,
    num_sims: usize,
    turns: u32,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
    P: Fn(&mut Simulation) -> Result<()> + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    play_turns(&mut sim, &plan, turns);
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        turns,
        num_sims,
    }
}

/// Compare two runs turn by turn, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(turn)` for the first turn
/// after which the hashes differ (0 means the setups already differ).
pub fn find_first_divergence<F, P>(setup_fn: F, plan: P, turns: u32) -> Option<u32>
where
    F: Fn() -> Simulation,
    P: Fn(&mut Simulation) -> Result<()>,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for turn in 1..=turns {
        play_turns(&mut sim1, &plan, 1);
        play_turns(&mut sim2, &plan, 1);

        if sim1.state_hash() != sim2.state_hash() {
            debug!(turn, "runs diverged");
            return Some(turn);
        }
    }

    None
}

/// Verify that saving and restoring preserves the session exactly.
///
/// Plays `before` turns, round-trips the session through the binary
/// snapshot, then plays `after` more turns on both the original and the
/// restored copy and compares hashes at both points.
pub fn verify_snapshot_roundtrip<F, P>(setup_fn: F, plan: P, before: u32, after: u32) -> bool
where
    F: Fn() -> Simulation,
    P: Fn(&mut Simulation) -> Result<()>,
{
    let mut sim = setup_fn();
    play_turns(&mut sim, &plan, before);

    let Ok(bytes) = sim.snapshot().to_bytes() else {
        return false;
    };
    let restored = squad_core::snapshot::Snapshot::from_bytes(&bytes)
        .and_then(|snapshot| Simulation::restore(snapshot, None));
    let Ok(mut restored) = restored else {
        return false;
    };

    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    play_turns(&mut sim, &plan, after);
    play_turns(&mut restored, &plan, after);

    restored.state_hash() == sim.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

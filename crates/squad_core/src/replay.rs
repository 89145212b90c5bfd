//! Replays: recorded orders for re-running a battle, and turn-by-turn
//! playback of a finished event log.
//!
//! A [`Replay`] stores the encoded starting state and the orders queued
//! before each resolution. Because resolution is deterministic, re-running
//! those orders reproduces the battle exactly; [`Replay::verify`] checks
//! that by comparing the final state hash.
//!
//! [`ReplayPlayer`] never resolves anything. It steps through a log that
//! was already produced, one turn at a time, the way a replay viewer does.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commands::QueuedCommand;
use crate::components::EntityId;
use crate::error::{GameError, Result};
use crate::events::{EventLog, GameEvent};
use crate::simulation::Simulation;
use crate::snapshot::Snapshot;

/// Replay layout version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Events of one turn, in log order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTurn {
    /// Turn number.
    pub turn: u32,
    /// Events stamped with that turn.
    pub events: Vec<GameEvent>,
}

/// Partition `events` by turn. Turns come out ascending; events keep their
/// log order within a turn.
#[must_use]
pub fn group_by_turn(events: &[GameEvent]) -> Vec<ReplayTurn> {
    let mut turns: BTreeMap<u32, Vec<GameEvent>> = BTreeMap::new();
    for event in events {
        turns.entry(event.turn).or_default().push(event.clone());
    }
    turns
        .into_iter()
        .map(|(turn, events)| ReplayTurn { turn, events })
        .collect()
}

/// Orders resolved in one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOrders {
    /// Turn the orders were resolved in.
    pub turn: u32,
    /// Owners and costed commands, in declaration order.
    pub orders: Vec<(EntityId, QueuedCommand)>,
}

/// A recorded battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay layout version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Seed the battle ran with.
    pub seed: u64,
    /// Encoded starting snapshot.
    pub initial_state: Vec<u8>,
    /// Orders per resolved turn, oldest first.
    pub turns: Vec<TurnOrders>,
    /// Turn counter when recording stopped.
    pub final_turn: u32,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// Start recording from `initial_state`.
    pub fn new(scenario_id: impl Into<String>, seed: u64, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed,
            initial_state: initial_state.snapshot().to_bytes()?,
            turns: Vec::new(),
            final_turn: initial_state.turn(),
            final_hash: initial_state.state_hash(),
        })
    }

    /// Record the orders about to be resolved in `turn`.
    pub fn record_turn(&mut self, turn: u32, orders: Vec<(EntityId, QueuedCommand)>) {
        self.turns.push(TurnOrders { turn, orders });
    }

    /// Stamp the end state.
    pub fn finalize(&mut self, final_turn: u32, final_hash: u64) {
        self.final_turn = final_turn;
        self.final_hash = final_hash;
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("failed to encode replay: {e}")))
    }

    /// Decode and check the layout version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::Serialization(format!("failed to decode replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Session at the recorded start.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        let mut sim = Simulation::restore(Snapshot::from_bytes(&self.initial_state)?, None)?;
        sim.initial_state = Some(self.initial_state.clone());
        Ok(sim)
    }

    /// Orders recorded for `turn`.
    #[must_use]
    pub fn orders_for_turn(&self, turn: u32) -> Option<&TurnOrders> {
        self.turns.iter().find(|t| t.turn == turn)
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn duration(&self) -> usize {
        self.turns.len()
    }

    /// Number of recorded orders over all turns.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.turns.iter().map(|t| t.orders.len()).sum()
    }

    /// Re-run every recorded turn from the start.
    pub fn replay(&self) -> Result<Simulation> {
        let mut sim = self.restore_initial_state()?;
        for recorded in &self.turns {
            if recorded.turn != sim.turn() {
                return Err(GameError::InvalidState(format!(
                    "replay expected turn {}, session is on turn {}",
                    recorded.turn,
                    sim.turn()
                )));
            }
            sim.load_orders(&recorded.orders)?;
            sim.advance()?;
        }
        Ok(sim)
    }

    /// True if re-running the recording ends on the recorded hash.
    pub fn verify(&self) -> Result<bool> {
        let sim = self.replay()?;
        let actual = sim.state_hash();
        debug!(
            expected = self.final_hash,
            actual,
            turns = self.turns.len(),
            "replay verified"
        );
        Ok(sim.turn() == self.final_turn && actual == self.final_hash)
    }
}

/// Turn-by-turn playback of an existing event log.
#[derive(Debug, Clone)]
pub struct ReplayPlayer {
    turns: Vec<ReplayTurn>,
    /// Index of the next turn to play.
    cursor: usize,
    /// Playback speed multiplier (1.0 = normal).
    pub playback_speed: f64,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Player over pre-grouped turns.
    #[must_use]
    pub fn new(turns: Vec<ReplayTurn>) -> Self {
        Self {
            turns,
            cursor: 0,
            playback_speed: 1.0,
            paused: false,
        }
    }

    /// Player over a session's log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        Self::new(group_by_turn(log.events()))
    }

    /// Play the next turn. `None` when paused or finished.
    pub fn advance(&mut self) -> Option<&ReplayTurn> {
        if self.paused {
            return None;
        }
        let turn = self.turns.get(self.cursor)?;
        self.cursor += 1;
        Some(turn)
    }

    /// Jump so that the next [`advance`](Self::advance) plays the first
    /// turn numbered `turn` or later.
    pub fn seek(&mut self, turn: u32) {
        self.cursor = self.turns.partition_point(|t| t.turn < turn);
    }

    /// Number of the next turn to play.
    #[must_use]
    pub fn current_turn(&self) -> Option<u32> {
        self.turns.get(self.cursor).map(|t| t.turn)
    }

    /// Every turn played so far.
    #[must_use]
    pub fn played(&self) -> &[ReplayTurn] {
        &self.turns[..self.cursor]
    }

    /// True once every turn has been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.turns.len()
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Set playback speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.playback_speed = speed.clamp(0.1, 10.0);
    }

    /// Progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.turns.is_empty() {
            100.0
        } else {
            (self.cursor as f64 / self.turns.len() as f64) * 100.0
        }
    }
}

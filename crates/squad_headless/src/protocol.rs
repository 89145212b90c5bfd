//! JSON protocol for driving a battle without a front end.
//!
//! The runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Orders and turn control from a controller
//! **Output (stdout):** Responses, resolved events and state
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready",...}`
//! 2. Controller queues orders with `enqueue`
//! 3. `end_turn` resolves the turn and outputs its events
//! 4. `query` and `hash` inspect the state at any time
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","turn":1,"scenario":"ford"}
//! -> {"cmd":"enqueue","unit":1,"order":{"kind":{"attack":{"target":2,"aimed_location":null}}}}
//! <- {"type":"queued","unit":1,"accepted":true,"ap_queued":2}
//! -> {"cmd":"end_turn"}
//! <- {"type":"events","turn":1,"events":[...]}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","turn":2,"hash":1234567890}
//! ```

use serde::{Deserialize, Serialize};
use squad_core::commands::Command as Order;
use squad_core::components::{EntityId, MoraleStatus, WoundState};
use squad_core::events::GameEvent;
use squad_core::factions::Faction;
use squad_core::simulation::Phase;
use squad_core::world::Entity;

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Queue an order for a unit.
    Enqueue { unit: EntityId, order: Order },

    /// Drop the order at `index` from a unit's queue.
    Remove { unit: EntityId, index: usize },

    /// Empty a unit's queue.
    Clear { unit: EntityId },

    /// Resolve the queued orders, then `count - 1` empty turns.
    EndTurn {
        #[serde(default = "default_turn_count")]
        count: u32,
    },

    /// Report the current state without resolving anything.
    Query,

    /// Report logged events, all of them or one turn's.
    Log {
        #[serde(default)]
        turn: Option<u32>,
    },

    /// Report the state hash.
    Hash,

    /// Write a JSON snapshot to `path`.
    Save { path: String },

    /// Replace the session with the snapshot at `path`.
    Load { path: String },

    /// Return to the scenario's starting state.
    Reset,

    /// Quit the runner.
    Quit,
}

fn default_turn_count() -> u32 {
    1
}

impl Command {
    /// Wire name, as used in the `cmd` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Enqueue { .. } => "enqueue",
            Self::Remove { .. } => "remove",
            Self::Clear { .. } => "clear",
            Self::EndTurn { .. } => "end_turn",
            Self::Query => "query",
            Self::Log { .. } => "log",
            Self::Hash => "hash",
            Self::Save { .. } => "save",
            Self::Load { .. } => "load",
            Self::Reset => "reset",
            Self::Quit => "quit",
        }
    }

    /// Parse from a JSON string.
    ///
    /// # Errors
    ///
    /// Fails if the line is not a known command.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        version: String,
        turn: u32,
        scenario: Option<String>,
    },

    /// Acknowledgment of a command.
    Ack { cmd: String },

    /// Result of an `enqueue`.
    Queued {
        unit: EntityId,
        accepted: bool,
        ap_queued: u32,
    },

    /// Events resolved in, or logged for, one turn.
    Events { turn: u32, events: Vec<GameEvent> },

    /// Current session state.
    State {
        turn: u32,
        phase: Phase,
        units: Vec<UnitState>,
        hash: u64,
    },

    /// State hash for determinism verification.
    StateHash { turn: u32, hash: u64 },

    /// Error processing a command.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Goodbye message before shutdown.
    Bye,
}

impl Response {
    /// Serialize to a JSON line (with trailing newline).
    ///
    /// # Errors
    ///
    /// Fails only if an event payload cannot be encoded.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse from a JSON string.
    ///
    /// # Errors
    ///
    /// Fails if the line is not a known response.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Error response for a failed `cmd`.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(str::to_string),
        }
    }
}

// ============================================================================
// State Types
// ============================================================================

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: EntityId,
    pub template: String,
    pub faction: Faction,
    pub x: f64,
    pub y: f64,
    pub facing: f64,
    pub health: HealthState,
    pub wound_state: WoundState,
    pub ap: u32,
    pub ap_max: u32,
    pub stamina: u32,
    pub morale: MoraleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ammo: Option<u32>,
    pub queued: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engaged_with: Option<Vec<EntityId>>,
}

/// Health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    pub current: i32,
    pub max: i32,
}

impl UnitState {
    /// Summarize `entity`, or `None` if it is not a unit.
    #[must_use]
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        let info = entity.unit.as_ref()?;
        let position = entity.position?;
        let health = entity.health?;
        let ap = entity.action_points?;
        let engaged_with = entity
            .engagement
            .as_ref()
            .map(|e| e.engaged_with.iter().copied().collect::<Vec<_>>())
            .filter(|ids| !ids.is_empty());
        Some(Self {
            id: entity.id,
            template: info.template.clone(),
            faction: entity.faction?,
            x: position.value.x,
            y: position.value.y,
            facing: position.facing,
            health: HealthState {
                current: health.current(),
                max: health.max(),
            },
            wound_state: health.wound_state(),
            ap: ap.current,
            ap_max: ap.max,
            stamina: entity.stamina.map_or(0, |s| s.current),
            morale: entity
                .morale
                .as_ref()
                .map_or(MoraleStatus::Steady, |m| m.status),
            ammo: entity.ammo.as_ref().map(squad_core::components::Ammo::total_rounds),
            queued: entity.command_queue.as_ref().map_or(0, |q| q.len()),
            engaged_with,
        })
    }
}

//! # Squad Core
//!
//! Deterministic rules engine for turn-based squad tactics.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness or wall-clock time
//! - No ambient state: every session owns its rules, store and RNG
//!
//! This separation enables:
//! - Save games that continue identically after a reload
//! - Replays rebuilt from an initial state plus recorded orders
//! - Headless batch runs and determinism testing
//!
//! ## Crate Structure
//!
//! - [`components`] - Unit and obstacle component definitions
//! - [`world`] - Entity store
//! - [`commands`] - Orders, preconditions and per-unit queues
//! - [`movement`] / [`pathfinding`] - Move planning over obstacles
//! - [`combat`] / [`morale`] - Attack pipeline and morale checks
//! - [`simulation`] - Session object, scheduler and turn resolution
//! - [`snapshot`] / [`replay`] - Persistence and playback
//! - [`data`] / [`scenario`] - Content tables and battle setups

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod commands;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod factions;
pub mod geometry;
pub mod math;
pub mod morale;
pub mod movement;
pub mod pathfinding;
pub mod replay;
pub mod rng;
pub mod scenario;
pub mod simulation;
pub mod snapshot;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{Command, CommandKind, CommandQueue, Precondition, QueuedCommand};
    pub use crate::components::*;
    pub use crate::config::RulesConfig;
    pub use crate::data::{ContentRegistry, UnitData, WeaponData};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventBus, EventLog, GameEvent, GameEventKind, GameEventType};
    pub use crate::factions::Faction;
    pub use crate::math::Vec2;
    pub use crate::movement::AttackArc;
    pub use crate::replay::{Replay, ReplayPlayer, ReplayTurn};
    pub use crate::rng::{DeterministicRng, RandomState};
    pub use crate::scenario::Scenario;
    pub use crate::simulation::{Phase, Roster, Simulation};
    pub use crate::snapshot::Snapshot;
    pub use crate::world::{Entity, EntityStorage};
}

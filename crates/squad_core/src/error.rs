//! Error types for the rules engine.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all rules engine errors.
///
/// Only hard failures live here. Skipped commands, insufficient resources
/// and unreachable destinations are not errors: they are absorbed by the
/// resolver and show up only as missing events.
#[derive(Debug, Error)]
pub enum GameError {
    /// Turn control called in the wrong phase.
    #[error("Invalid phase transition: expected {expected}, currently {actual}")]
    InvalidPhase {
        /// Phase the operation requires.
        expected: String,
        /// Phase the session is actually in.
        actual: String,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity exists but is not a unit (has no health/AP/queue).
    #[error("Entity {0} is not a unit")]
    NotAUnit(EntityId),

    /// Unit template missing from the content registry.
    #[error("Unknown unit template: {0}")]
    UnknownTemplate(String),

    /// Weapon missing from the content registry.
    #[error("Unknown weapon: {0}")]
    UnknownWeapon(String),

    /// Obstacle type missing from the obstacle table.
    #[error("Unknown obstacle type: {0}")]
    UnknownObstacleType(String),

    /// Snapshot content failed validation.
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Snapshot written by an incompatible version.
    #[error("Snapshot version mismatch: expected {expected}, found {found}")]
    SnapshotVersion {
        /// Version this build reads.
        expected: u32,
        /// Version stored in the document.
        found: u32,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or logical name) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
